//! Structured model of a single file's unified diff.
//!
//! A [`DiffModel`] is built fresh from raw diff text by [`parse_diff`] every
//! time a file is viewed. Nothing in here is mutated after parsing; a new
//! selection or a refreshed index always means a new parse.

pub mod format;
pub mod parse;

pub use parse::parse_diff;

/// Stable identity of a line inside a [`DiffModel`].
///
/// Diff lines frequently repeat (blank lines, closing braces), so selection
/// is keyed on position rather than content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineKey {
    /// Index of the owning hunk within the model
    pub hunk: usize,
    /// Index of the line within its hunk
    pub line: usize,
}

impl LineKey {
    pub fn new(hunk: usize, line: usize) -> Self {
        Self { hunk, line }
    }
}

/// Classification of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Context,
    Addition,
    Deletion,
    /// Synthetic row produced by [`DiffModel::rows`] for display
    HunkHeader,
}

impl LineKind {
    /// Whether the line is an addition or deletion
    pub fn is_change(self) -> bool {
        matches!(self, LineKind::Addition | LineKind::Deletion)
    }
}

/// One line of a diff, without its marker character.
///
/// Context lines carry both line numbers, additions only the new-file number
/// and deletions only the old-file number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub key: LineKey,
    /// Followed by `\ No newline at end of file`
    pub no_newline: bool,
}

/// A contiguous change region bounded by a `@@ ... @@` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub index: usize,
    /// Header text exactly as it appeared in the diff
    pub header: String,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Number of addition and deletion lines
    pub fn change_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind.is_change()).count()
    }

    /// Lines on the old side (context + deletions)
    pub fn old_side_len(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Deletion))
            .count()
    }

    /// Lines on the new side (context + additions)
    pub fn new_side_len(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Addition))
            .count()
    }

    /// Display row standing in for the header itself
    pub fn header_row(&self) -> DiffLine {
        DiffLine {
            kind: LineKind::HunkHeader,
            content: self.header.clone(),
            old_line: None,
            new_line: None,
            key: LineKey::new(self.index, usize::MAX),
            no_newline: false,
        }
    }
}

/// One file's full diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffModel {
    pub path: String,
    pub hunks: Vec<DiffHunk>,
}

impl DiffModel {
    /// Every line of every hunk, in order.
    ///
    /// Restartable: each call is a fresh traversal.
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> + '_ {
        self.hunks.iter().flat_map(|h| h.lines.iter())
    }

    /// Like [`lines`](Self::lines) but with a header row in front of each hunk
    pub fn rows(&self) -> impl Iterator<Item = DiffLine> + '_ {
        self.hunks
            .iter()
            .flat_map(|h| std::iter::once(h.header_row()).chain(h.lines.iter().cloned()))
    }

    /// Look up a line by key
    pub fn line(&self, key: LineKey) -> Option<&DiffLine> {
        self.hunks.get(key.hunk)?.lines.get(key.line)
    }

    pub fn change_count(&self) -> usize {
        self.hunks.iter().map(DiffHunk::change_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}
