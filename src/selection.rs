//! The user's chosen subset of changed lines within one file's diff.

use crate::diff::{DiffModel, LineKey, LineKind};
use crate::refs::LineRef;
use error_set::error_set;
use std::collections::BTreeSet;

error_set! {
    /// Errors from building a selection out of line references
    SelectionError := {
        #[display("No lines in {file} matched the selection")]
        NoMatchingLines { file: String },
    }
}

/// A set of selected lines, keyed by position rather than content.
///
/// Keys pointing at context lines may be present but never have an effect:
/// only additions and deletions can be staged or unstaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSelection {
    keys: BTreeSet<LineKey>,
}

impl LineSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, key: LineKey) {
        self.keys.insert(key);
    }

    pub fn deselect(&mut self, key: LineKey) {
        self.keys.remove(&key);
    }

    /// Flip the selection state of a line, returning whether it is now selected
    pub fn toggle(&mut self, key: LineKey) -> bool {
        if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        }
    }

    /// Select every change line of one hunk
    pub fn select_hunk(&mut self, model: &DiffModel, hunk: usize) {
        if let Some(hunk) = model.hunks.get(hunk) {
            self.keys.extend(
                hunk.lines
                    .iter()
                    .filter(|l| l.kind.is_change())
                    .map(|l| l.key),
            );
        }
    }

    /// Select every change line in the model
    pub fn select_all(&mut self, model: &DiffModel) {
        self.keys
            .extend(model.lines().filter(|l| l.kind.is_change()).map(|l| l.key));
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn contains(&self, key: LineKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = LineKey> + '_ {
        self.keys.iter().copied()
    }

    /// Selected keys that address an addition or deletion in `model`
    pub fn changes_in(&self, model: &DiffModel) -> Vec<LineKey> {
        self.keys
            .iter()
            .copied()
            .filter(|k| model.line(*k).is_some_and(|l| l.kind.is_change()))
            .collect()
    }

    /// Build a selection from line-number references.
    ///
    /// Additions match on their new line number, deletions on their old one.
    pub fn from_refs(model: &DiffModel, refs: &[LineRef]) -> Result<Self, SelectionError> {
        let keys: BTreeSet<LineKey> = model
            .lines()
            .filter(|line| match (line.kind, line.old_line, line.new_line) {
                (LineKind::Addition, _, Some(n)) => refs.iter().any(|r| r.matches_addition(n)),
                (LineKind::Deletion, Some(o), _) => refs.iter().any(|r| r.matches_deletion(o)),
                _ => false,
            })
            .map(|line| line.key)
            .collect();

        if keys.is_empty() {
            return Err(SelectionError::NoMatchingLines {
                file: model.path.clone(),
            });
        }

        Ok(Self { keys })
    }
}

impl FromIterator<LineKey> for LineSelection {
    fn from_iter<T: IntoIterator<Item = LineKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
