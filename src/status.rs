//! Per-file status flags and their staged/unstaged classification.

use nom::{
    IResult, Parser,
    bytes::complete::take_till,
    character::complete::{anychar, char},
    combinator::{all_consuming, opt},
    multi::many0,
    sequence::terminated,
};
use std::fmt;
use std::ops::BitOr;

/// Fixed set of per-file change flags.
///
/// Bit positions are stable; index flags occupy the low bits and worktree
/// flags the next group, mirroring how git reports the two comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusFlags(u16);

impl StatusFlags {
    pub const NEW_IN_INDEX: Self = Self(1 << 0);
    pub const MODIFIED_IN_INDEX: Self = Self(1 << 1);
    pub const DELETED_FROM_INDEX: Self = Self(1 << 2);
    pub const RENAMED_IN_INDEX: Self = Self(1 << 3);
    pub const TYPE_CHANGE_IN_INDEX: Self = Self(1 << 4);
    pub const NEW_IN_WORKDIR: Self = Self(1 << 7);
    pub const MODIFIED_IN_WORKDIR: Self = Self(1 << 8);
    pub const DELETED_FROM_WORKDIR: Self = Self(1 << 9);
    pub const TYPE_CHANGE_IN_WORKDIR: Self = Self(1 << 10);
    pub const RENAMED_IN_WORKDIR: Self = Self(1 << 11);
    pub const UNREADABLE: Self = Self(1 << 12);
    pub const IGNORED: Self = Self(1 << 14);
    pub const CONFLICTED: Self = Self(1 << 15);

    const IN_INDEX: Self = Self(0b1_1111);
    const IN_WORKDIR: Self = Self(0b1111_1000_0000);

    const NAMES: [(Self, &'static str); 13] = [
        (Self::NEW_IN_INDEX, "new-in-index"),
        (Self::MODIFIED_IN_INDEX, "modified-in-index"),
        (Self::DELETED_FROM_INDEX, "deleted-from-index"),
        (Self::RENAMED_IN_INDEX, "renamed-in-index"),
        (Self::TYPE_CHANGE_IN_INDEX, "typechange-in-index"),
        (Self::NEW_IN_WORKDIR, "new-in-workdir"),
        (Self::MODIFIED_IN_WORKDIR, "modified-in-workdir"),
        (Self::DELETED_FROM_WORKDIR, "deleted-from-workdir"),
        (Self::TYPE_CHANGE_IN_WORKDIR, "typechange-in-workdir"),
        (Self::RENAMED_IN_WORKDIR, "renamed-in-workdir"),
        (Self::UNREADABLE, "unreadable"),
        (Self::IGNORED, "ignored"),
        (Self::CONFLICTED, "conflicted"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Any HEAD → index change
    pub const fn in_index(self) -> bool {
        self.intersects(Self::IN_INDEX)
    }

    /// Any index → worktree change
    pub const fn in_workdir(self) -> bool {
        self.intersects(Self::IN_WORKDIR)
    }

    /// Present only in the worktree, with no index entry at all
    pub const fn is_untracked(self) -> bool {
        self.0 == Self::NEW_IN_WORKDIR.0
    }

    /// Names of the set flags, in bit order
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }

    /// Flags for a two-letter `git status --porcelain` code
    pub fn from_porcelain(x: char, y: char) -> Self {
        match (x, y) {
            ('?', '?') => Self::NEW_IN_WORKDIR,
            ('!', '!') => Self::IGNORED,
            ('D', 'D') | ('A', 'U') | ('U', 'D') | ('U', 'A') | ('D', 'U') | ('A', 'A')
            | ('U', 'U') => Self::CONFLICTED,
            _ => {
                let index = match x {
                    'A' | 'C' => Self::NEW_IN_INDEX,
                    'M' => Self::MODIFIED_IN_INDEX,
                    'D' => Self::DELETED_FROM_INDEX,
                    'R' => Self::RENAMED_IN_INDEX,
                    'T' => Self::TYPE_CHANGE_IN_INDEX,
                    _ => Self::empty(),
                };
                let workdir = match y {
                    'A' => Self::NEW_IN_WORKDIR,
                    'M' => Self::MODIFIED_IN_WORKDIR,
                    'D' => Self::DELETED_FROM_WORKDIR,
                    'T' => Self::TYPE_CHANGE_IN_WORKDIR,
                    'R' => Self::RENAMED_IN_WORKDIR,
                    _ => Self::empty(),
                };
                index | workdir
            }
        }
    }
}

impl BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "unaltered");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{name}")?;
        }
        Ok(())
    }
}

/// Raw per-file status as reported by git
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    /// Source path of a rename or copy
    pub orig_path: Option<String>,
    pub flags: StatusFlags,
}

/// One row of the staged or unstaged file list.
///
/// A partially staged file yields two rows with the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitFileStatus {
    pub path: String,
    pub is_staged: bool,
    pub flags: StatusFlags,
}

/// Rows split by bucket, each in the order git reported them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLists {
    pub staged: Vec<GitFileStatus>,
    pub unstaged: Vec<GitFileStatus>,
}

impl StatusLists {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }
}

impl FromIterator<GitFileStatus> for StatusLists {
    fn from_iter<T: IntoIterator<Item = GitFileStatus>>(iter: T) -> Self {
        let (staged, unstaged) = iter.into_iter().partition(|row| row.is_staged);
        Self { staged, unstaged }
    }
}

/// Map raw entries to zero, one or two rows each.
///
/// Ignored files are dropped. A file with index changes gets a staged row,
/// one with worktree changes an unstaged row; a file matching neither (for
/// instance a conflict) still gets an unstaged row so it is never lost.
pub fn classify(entries: &[StatusEntry]) -> Vec<GitFileStatus> {
    let mut rows = Vec::with_capacity(entries.len());

    for entry in entries {
        if entry.flags.contains(StatusFlags::IGNORED) {
            continue;
        }

        let staged = entry.flags.in_index();
        let unstaged = entry.flags.in_workdir();

        if staged {
            rows.push(GitFileStatus {
                path: entry.path.clone(),
                is_staged: true,
                flags: entry.flags,
            });
        }
        if unstaged || !staged {
            rows.push(GitFileStatus {
                path: entry.path.clone(),
                is_staged: false,
                flags: entry.flags,
            });
        }
    }

    rows
}

/// One NUL-terminated field; the terminator is optional on the last field
fn field(input: &str) -> IResult<&str, &str> {
    terminated(take_till(|c| c == '\0'), opt(char('\0'))).parse(input)
}

fn record(input: &str) -> IResult<&str, StatusEntry> {
    let (rest, (x, y, _, path)) = (anychar, anychar, char(' '), field).parse(input)?;

    let (rest, orig_path) = if matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C') {
        let (rest, orig) = field(rest)?;
        (rest, Some(orig.to_string()))
    } else {
        (rest, None)
    };

    Ok((
        rest,
        StatusEntry {
            path: path.to_string(),
            orig_path,
            flags: StatusFlags::from_porcelain(x, y),
        },
    ))
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Returns the unparsed remainder on failure.
pub fn parse_porcelain(input: &str) -> Result<Vec<StatusEntry>, String> {
    all_consuming(many0(record))
        .parse(input)
        .map(|(_, entries)| entries)
        .map_err(|e| match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => e.input.to_string(),
            nom::Err::Incomplete(_) => input.to_string(),
        })
}
