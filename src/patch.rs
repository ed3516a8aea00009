//! Partial patch synthesis.
//!
//! The index has no notion of "half a hunk"; the only lever is applying a
//! patch to it. To move an arbitrary subset of lines, every hunk touched by
//! the selection is rewritten so that selected changes stay real changes and
//! every unselected change describes the index exactly as it is.
//!
//! What "as it is" means depends on the direction:
//!
//! | line                  | [`Direction::Stage`] | [`Direction::Unstage`] |
//! |-----------------------|----------------------|------------------------|
//! | context               | context              | context                |
//! | selected addition     | `+`                  | `+`                    |
//! | unselected addition   | dropped              | context                |
//! | selected deletion     | `-`                  | `-`                    |
//! | unselected deletion   | context              | dropped                |
//!
//! When staging, the index still holds the old side, so an unselected
//! deletion is a line that is there and stays there, and an unselected
//! addition does not exist yet. When unstaging the patch describes HEAD →
//! index and is applied in reverse, so the index holds the new side and the
//! roles swap.

use crate::diff::{DiffHunk, DiffLine, LineKind};
use crate::selection::LineSelection;
use std::fmt;

/// Which way the selected lines move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Worktree → index
    Stage,
    /// Index → worktree (patch applied in reverse)
    Unstage,
}

/// Marker of an emitted patch line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Context,
    Add,
    Delete,
}

impl Marker {
    fn as_char(self) -> char {
        match self {
            Marker::Context => ' ',
            Marker::Add => '+',
            Marker::Delete => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLine {
    pub marker: Marker,
    pub content: String,
    pub no_newline: bool,
}

/// One synthesized hunk.
///
/// `old_count` always equals the number of context + deletion lines and
/// `new_count` the number of context + addition lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<PatchLine>,
}

impl PatchHunk {
    fn push(&mut self, marker: Marker, content: &str, no_newline: bool) {
        match marker {
            Marker::Context => {
                self.old_count += 1;
                self.new_count += 1;
            }
            Marker::Add => self.new_count += 1,
            Marker::Delete => self.old_count += 1,
        }
        self.lines.push(PatchLine {
            marker,
            content: content.to_string(),
            no_newline,
        });
    }
}

impl fmt::Display for PatchHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )?;
        for line in &self.lines {
            writeln!(f, "{}{}", line.marker.as_char(), line.content)?;
            if line.no_newline {
                writeln!(f, "\\ No newline at end of file")?;
            }
        }
        Ok(())
    }
}

/// A synthesized single-file patch, rendered through [`Display`](fmt::Display)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub path: String,
    pub hunks: Vec<PatchHunk>,
}

impl Patch {
    /// True when the selection touched no change lines; applying would be a no-op
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "diff --git a/{} b/{}", self.path, self.path)?;
        writeln!(f, "--- a/{}", self.path)?;
        writeln!(f, "+++ b/{}", self.path)?;
        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }
        Ok(())
    }
}

/// Build a patch carrying only the effect of the selected lines.
///
/// Hunks with no selected addition or deletion are left out entirely. The
/// result is meant for `git apply --cached`, plus `--reverse` when
/// `direction` is [`Direction::Unstage`].
pub fn synthesize(
    path: &str,
    hunks: &[DiffHunk],
    selection: &LineSelection,
    direction: Direction,
) -> Patch {
    let hunks = hunks
        .iter()
        .filter_map(|hunk| synthesize_hunk(hunk, selection, direction))
        .collect();

    Patch {
        path: path.to_string(),
        hunks,
    }
}

fn synthesize_hunk(
    hunk: &DiffHunk,
    selection: &LineSelection,
    direction: Direction,
) -> Option<PatchHunk> {
    let touched = hunk
        .lines
        .iter()
        .any(|l| l.kind.is_change() && selection.contains(l.key));
    if !touched {
        return None;
    }

    let mut out = PatchHunk {
        old_start: hunk.old_start,
        old_count: 0,
        new_start: hunk.new_start,
        new_count: 0,
        lines: Vec::with_capacity(hunk.lines.len()),
    };

    let emitted: Vec<(Marker, &DiffLine)> = hunk
        .lines
        .iter()
        .filter_map(|line| {
            let selected = selection.contains(line.key);
            let marker = match (line.kind, selected, direction) {
                (LineKind::Context, _, _) => Marker::Context,
                (LineKind::Addition, true, _) => Marker::Add,
                (LineKind::Addition, false, Direction::Stage) => return None,
                (LineKind::Addition, false, Direction::Unstage) => Marker::Context,
                (LineKind::Deletion, true, _) => Marker::Delete,
                (LineKind::Deletion, false, Direction::Stage) => Marker::Context,
                (LineKind::Deletion, false, Direction::Unstage) => return None,
                (LineKind::HunkHeader, _, _) => return None,
            };
            Some((marker, line))
        })
        .collect();

    let last = emitted.len().saturating_sub(1);
    for (i, (marker, line)) in emitted.into_iter().enumerate() {
        // A neutralised change line that lacks its newline cannot be context
        // in the middle of a hunk: the lines after it force a newline onto it,
        // so it is emitted as a replacement of itself on the side it ends.
        if marker == Marker::Context && line.no_newline && line.kind.is_change() && i < last {
            let old_side = line.kind == LineKind::Deletion;
            out.push(Marker::Delete, &line.content, old_side);
            out.push(Marker::Add, &line.content, !old_side);
            continue;
        }
        out.push(marker, &line.content, line.no_newline);
    }

    (!out.lines.is_empty()).then_some(out)
}
