//! `file:refs` selection syntax used by the command line.
//!
//! `FILE:REFS` where `REFS` is a comma-separated list of:
//!
//! - `N` - addition at new line N
//! - `-N` - deletion at old line N
//! - `N..M` - range of additions (inclusive)
//! - `-N..-M` - range of deletions (inclusive)
//!
//! ```
//! use line_stager::refs::{parse_file_refs, LineRef};
//! use std::num::NonZeroU32;
//!
//! let refs = parse_file_refs("gtk.nix:-10,12..13").unwrap();
//! assert_eq!(refs.file, "gtk.nix");
//! assert_eq!(refs.refs, vec![
//!     LineRef::Delete(NonZeroU32::new(10).unwrap()),
//!     LineRef::AddRange(NonZeroU32::new(12).unwrap(), NonZeroU32::new(13).unwrap()),
//! ]);
//! ```

use error_set::error_set;
use nom::{
    IResult, Parser,
    character::complete::{char, u32 as number},
    combinator::{all_consuming, opt},
};
use std::num::NonZeroU32;

error_set! {
    /// Errors from parsing file:refs syntax
    RefParseError := {
        /// Input string does not contain a colon separator
        #[display("Invalid format '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid format '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// No line references provided after the colon
        #[display("No line references provided")]
        EmptyRefs,
        /// Line number could not be parsed as a valid non-zero u32
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// Range mixes an addition endpoint with a deletion endpoint
        #[display("Range '{value}' mixes additions and deletions")]
        MixedRange { value: String },
    }
}

/// A reference to diff lines by line number.
///
/// Additions are addressed by new line number, deletions by old line number.
#[derive(Debug, Clone, PartialEq)]
pub enum LineRef {
    Add(NonZeroU32),
    AddRange(NonZeroU32, NonZeroU32),
    Delete(NonZeroU32),
    DeleteRange(NonZeroU32, NonZeroU32),
}

impl LineRef {
    /// Whether an addition at new line `n` is referenced
    pub fn matches_addition(&self, n: u32) -> bool {
        match self {
            LineRef::Add(a) => a.get() == n,
            LineRef::AddRange(a, b) => (a.get()..=b.get()).contains(&n),
            _ => false,
        }
    }

    /// Whether a deletion at old line `n` is referenced
    pub fn matches_deletion(&self, n: u32) -> bool {
        match self {
            LineRef::Delete(d) => d.get() == n,
            LineRef::DeleteRange(a, b) => (a.get()..=b.get()).contains(&n),
            _ => false,
        }
    }
}

/// Parsed `file:refs` argument
#[derive(Debug, Clone, PartialEq)]
pub struct FileLineRefs {
    pub file: String,
    pub refs: Vec<LineRef>,
}

/// Parse a `file:refs` string.
///
/// The file is split off at the last colon so that paths containing colons
/// still work.
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, RefParseError> {
    let Some((file, refs)) = input.rsplit_once(':') else {
        return Err(RefParseError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let file = file.trim();
    if file.is_empty() {
        return Err(RefParseError::EmptyFileName {
            input: input.to_string(),
        });
    }

    let refs = refs
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single_ref)
        .collect::<Result<Vec<_>, _>>()?;

    if refs.is_empty() {
        return Err(RefParseError::EmptyRefs);
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs,
    })
}

/// `[-]N`, returning whether the deletion sign was present
fn endpoint(input: &str) -> IResult<&str, (bool, u32)> {
    all_consuming((opt(char('-')), number))
        .map(|(sign, n)| (sign.is_some(), n))
        .parse(input)
}

fn parse_endpoint(input: &str) -> Result<(bool, NonZeroU32), RefParseError> {
    let invalid = || RefParseError::InvalidLineNumber {
        value: input.to_string(),
    };
    let (_, (deletion, n)) = endpoint(input).map_err(|_| invalid())?;
    Ok((deletion, NonZeroU32::new(n).ok_or_else(invalid)?))
}

fn parse_single_ref(input: &str) -> Result<LineRef, RefParseError> {
    let Some((start, end)) = input.split_once("..") else {
        let (deletion, n) = parse_endpoint(input)?;
        return Ok(if deletion {
            LineRef::Delete(n)
        } else {
            LineRef::Add(n)
        });
    };

    let (start_del, start) = parse_endpoint(start)?;
    let (end_del, end) = parse_endpoint(end)?;

    if start_del != end_del {
        return Err(RefParseError::MixedRange {
            value: input.to_string(),
        });
    }
    if start > end {
        return Err(RefParseError::InvalidRange {
            start: start.get(),
            end: end.get(),
        });
    }

    Ok(if start_del {
        LineRef::DeleteRange(start, end)
    } else {
        LineRef::AddRange(start, end)
    })
}
