//! The stage/unstage workflow tying diff, selection, synthesis and apply
//! together.

use crate::StagerError;
use crate::apply::ApplyMode;
use crate::diff::{DiffModel, parse_diff};
use crate::git::{DiffTarget, GitPort};
use crate::patch::{Direction, Patch, synthesize};
use crate::selection::LineSelection;
use crate::status::{StatusFlags, StatusLists, classify};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Where an operation on one path currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Viewing,
    Synthesizing,
    Applying,
    Refreshing,
    Failed,
}

/// Result of a line-level stage or unstage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The selection held no additions or deletions; git was not invoked
    NoChanges,
    /// The patch applied and the status was re-read afterwards
    Applied { patch: Patch, status: StatusLists },
}

type PhaseObserver = Box<dyn Fn(&str, Phase) + Send + Sync>;

/// Line-level staging over a [`GitPort`].
///
/// Models and selections are never carried across an apply: callers re-read
/// the diff after every [`Outcome::Applied`].
///
/// Phases are tracked per path, so operations on different files do not
/// overwrite each other's progress.
pub struct Stager<P> {
    port: P,
    phases: Mutex<HashMap<String, Phase>>,
    observer: Option<PhaseObserver>,
}

impl<P: GitPort> Stager<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            phases: Mutex::default(),
            observer: None,
        }
    }

    /// Call `observer` on every phase change, including the transient
    /// [`Phase::Failed`] that polling would miss
    pub fn with_observer(
        mut self,
        observer: impl Fn(&str, Phase) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Current phase of `path`; paths with nothing in progress are viewing
    pub fn phase(&self, path: &str) -> Phase {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(Phase::Viewing)
    }

    fn set_phase(&self, path: &str, phase: Phase) {
        debug!(path, ?phase, "phase");
        {
            let mut phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
            if phase == Phase::Viewing {
                phases.remove(path);
            } else {
                phases.insert(path.to_string(), phase);
            }
        }
        if let Some(observer) = &self.observer {
            observer(path, phase);
        }
    }

    /// Staged and unstaged file lists
    pub fn status(&self) -> Result<StatusLists, StagerError> {
        let entries = self.port.status_entries()?;
        Ok(classify(&entries).into_iter().collect())
    }

    fn flags_for(&self, path: &str) -> Result<StatusFlags, StagerError> {
        Ok(self
            .port
            .status_entries()?
            .into_iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.flags)
            .unwrap_or_default())
    }

    /// Parsed diff of `path`: HEAD → index when `staged`, otherwise
    /// index → worktree.
    ///
    /// Untracked files are diffed against an empty file so every line shows
    /// up as an addition.
    pub fn diff_model(&self, path: &str, staged: bool) -> Result<DiffModel, StagerError> {
        let target = if staged {
            DiffTarget::Index
        } else if self.flags_for(path)?.is_untracked() {
            DiffTarget::Untracked
        } else {
            DiffTarget::Worktree
        };

        let raw = self.port.raw_diff(path, target)?;
        let model = parse_diff(path, &raw);
        debug!(path, ?target, hunks = model.hunks.len(), "parsed diff");
        Ok(model)
    }

    /// Move the selected worktree changes of `model` into the index
    pub fn stage_lines(
        &self,
        model: &DiffModel,
        selection: &LineSelection,
    ) -> Result<Outcome, StagerError> {
        self.move_lines(model, selection, Direction::Stage)
    }

    /// Move the selected index changes of `model` back out to the worktree
    pub fn unstage_lines(
        &self,
        model: &DiffModel,
        selection: &LineSelection,
    ) -> Result<Outcome, StagerError> {
        self.move_lines(model, selection, Direction::Unstage)
    }

    fn move_lines(
        &self,
        model: &DiffModel,
        selection: &LineSelection,
        direction: Direction,
    ) -> Result<Outcome, StagerError> {
        let path = model.path.as_str();
        self.set_phase(path, Phase::Synthesizing);
        let patch = synthesize(path, &model.hunks, selection, direction);
        if patch.is_empty() {
            debug!(path, "selection has no changes");
            self.set_phase(path, Phase::Viewing);
            return Ok(Outcome::NoChanges);
        }

        self.set_phase(path, Phase::Applying);
        if let Err(e) = self.apply(&patch, direction) {
            warn!(path, error = %e, "apply failed");
            self.set_phase(path, Phase::Failed);
            self.set_phase(path, Phase::Viewing);
            return Err(e);
        }
        info!(path, hunks = patch.hunks.len(), ?direction, "applied patch");

        let status = self.refresh(path)?;
        Ok(Outcome::Applied { patch, status })
    }

    fn apply(&self, patch: &Patch, direction: Direction) -> Result<(), StagerError> {
        let mode = match direction {
            Direction::Stage => {
                // The index needs an entry to patch against
                if self.flags_for(&patch.path)?.is_untracked() {
                    debug!(path = %patch.path, "marking intent to add");
                    self.port.mark_intent_to_add(&patch.path)?;
                }
                ApplyMode::STAGE
            }
            Direction::Unstage => ApplyMode::UNSTAGE,
        };

        Ok(self.port.apply_patch(&patch.to_string(), mode)?)
    }

    fn refresh(&self, path: &str) -> Result<StatusLists, StagerError> {
        self.set_phase(path, Phase::Refreshing);
        let status = self.status();
        self.set_phase(path, Phase::Viewing);
        status
    }

    /// Stage every change in `path`
    pub fn stage_file(&self, path: &str) -> Result<StatusLists, StagerError> {
        self.set_phase(path, Phase::Applying);
        if let Err(e) = self.port.stage_path(path) {
            self.set_phase(path, Phase::Viewing);
            return Err(e.into());
        }
        info!(path, "staged file");
        self.refresh(path)
    }

    /// Reset the index entry of `path` to HEAD
    pub fn unstage_file(&self, path: &str) -> Result<StatusLists, StagerError> {
        self.set_phase(path, Phase::Applying);
        if let Err(e) = self.port.unstage_path(path) {
            self.set_phase(path, Phase::Viewing);
            return Err(e.into());
        }
        info!(path, "unstaged file");
        self.refresh(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::GitError;
    use crate::diff::LineKey;
    use crate::status::StatusEntry;
    use similar_asserts::assert_eq;
    use std::sync::Arc;

    /// In-memory port recording every mutating call
    #[derive(Default)]
    pub(crate) struct FakePort {
        pub entries: Vec<StatusEntry>,
        pub diff: String,
        pub reject: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakePort {
        pub fn with(path: &str, flags: StatusFlags, diff: &str) -> Self {
            Self {
                entries: vec![StatusEntry {
                    path: path.to_string(),
                    orig_path: None,
                    flags,
                }],
                diff: diff.to_string(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl GitPort for FakePort {
        fn raw_diff(&self, path: &str, target: DiffTarget) -> Result<String, GitError> {
            self.record(format!("diff {target:?} {path}"));
            Ok(self.diff.clone())
        }

        fn status_entries(&self) -> Result<Vec<StatusEntry>, GitError> {
            Ok(self.entries.clone())
        }

        fn apply_patch(&self, patch: &str, mode: ApplyMode) -> Result<(), GitError> {
            self.record(format!("apply {mode:?}"));
            if self.reject {
                return Err(GitError::ApplyFailed {
                    stderr: "error: patch does not apply".to_string(),
                    patch: patch.to_string(),
                });
            }
            Ok(())
        }

        fn mark_intent_to_add(&self, path: &str) -> Result<(), GitError> {
            self.record(format!("intent-to-add {path}"));
            Ok(())
        }

        fn stage_path(&self, path: &str) -> Result<(), GitError> {
            self.record(format!("add {path}"));
            Ok(())
        }

        fn unstage_path(&self, path: &str) -> Result<(), GitError> {
            self.record(format!("reset {path}"));
            Ok(())
        }
    }

    const DIFF: &str = "diff --git a/f.txt b/f.txt
--- a/f.txt
+++ b/f.txt
@@ -1,3 +1,3 @@
 a
-b
+c
 d
";

    const NEW_FILE: &str = "@@ -0,0 +1,2 @@
+one
+two
";

    fn stager(flags: StatusFlags, diff: &str) -> Stager<FakePort> {
        Stager::new(FakePort::with("f.txt", flags, diff))
    }

    #[test]
    fn diff_model_picks_target() {
        let s = stager(StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        s.diff_model("f.txt", false).unwrap();
        s.diff_model("f.txt", true).unwrap();

        let s2 = stager(StatusFlags::NEW_IN_WORKDIR, NEW_FILE);
        let model = s2.diff_model("f.txt", false).unwrap();
        assert_eq!(model.change_count(), 2);

        assert_eq!(
            s.port().calls(),
            vec!["diff Worktree f.txt", "diff Index f.txt"]
        );
        assert_eq!(s2.port().calls(), vec!["diff Untracked f.txt"]);
    }

    #[test]
    fn stage_selected_addition() {
        let s = stager(StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        let model = s.diff_model("f.txt", false).unwrap();
        let selection: LineSelection = [LineKey::new(0, 2)].into_iter().collect();

        let Outcome::Applied { patch, status } = s.stage_lines(&model, &selection).unwrap() else {
            panic!("expected an applied patch");
        };
        assert_eq!(
            patch.to_string(),
            "diff --git a/f.txt b/f.txt\n--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,4 @@\n a\n b\n+c\n d\n"
        );
        assert_eq!(status.unstaged.len(), 1);
        assert_eq!(s.phase("f.txt"), Phase::Viewing);
        assert_eq!(
            s.port().calls(),
            vec![
                "diff Worktree f.txt",
                "apply ApplyMode { cached: true, reverse: false, unidiff_zero: false }",
            ]
        );
    }

    #[test]
    fn unstage_applies_in_reverse() {
        let s = stager(StatusFlags::MODIFIED_IN_INDEX, DIFF);
        let model = s.diff_model("f.txt", true).unwrap();
        let selection: LineSelection = [LineKey::new(0, 1)].into_iter().collect();

        let outcome = s.unstage_lines(&model, &selection).unwrap();
        assert!(matches!(outcome, Outcome::Applied { .. }));
        assert_eq!(
            s.port().calls().last().map(String::as_str),
            Some("apply ApplyMode { cached: true, reverse: true, unidiff_zero: false }")
        );
    }

    #[test]
    fn empty_selection_skips_git() {
        let s = stager(StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        let model = s.diff_model("f.txt", false).unwrap();
        // Context line only
        let selection: LineSelection = [LineKey::new(0, 0)].into_iter().collect();

        assert_eq!(s.stage_lines(&model, &selection).unwrap(), Outcome::NoChanges);
        assert_eq!(s.port().calls(), vec!["diff Worktree f.txt"]);
        assert_eq!(s.phase("f.txt"), Phase::Viewing);
    }

    #[test]
    fn untracked_file_marked_before_apply() {
        let s = stager(StatusFlags::NEW_IN_WORKDIR, NEW_FILE);
        let model = s.diff_model("f.txt", false).unwrap();
        let selection: LineSelection = [LineKey::new(0, 0)].into_iter().collect();

        let Outcome::Applied { patch, .. } = s.stage_lines(&model, &selection).unwrap() else {
            panic!("expected an applied patch");
        };
        assert!(patch.to_string().ends_with("@@ -0,0 +1,1 @@\n+one\n"));
        assert_eq!(
            s.port().calls(),
            vec![
                "diff Untracked f.txt",
                "intent-to-add f.txt",
                "apply ApplyMode { cached: true, reverse: false, unidiff_zero: false }",
            ]
        );
    }

    #[test]
    fn apply_failure_returns_to_viewing() {
        let mut port = FakePort::with("f.txt", StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        port.reject = true;
        let s = Stager::new(port);
        let model = s.diff_model("f.txt", false).unwrap();
        let mut selection = LineSelection::new();
        selection.select_all(&model);

        let err = s.stage_lines(&model, &selection).unwrap_err();
        assert!(matches!(err, StagerError::ApplyFailed { .. }));
        assert!(err.to_string().contains("Patch Content:"));
        assert_eq!(s.phase("f.txt"), Phase::Viewing);
    }

    fn observed(port: FakePort) -> (Stager<FakePort>, Arc<Mutex<Vec<(String, Phase)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let s = Stager::new(port).with_observer(move |path, phase| {
            sink.lock().unwrap().push((path.to_string(), phase));
        });
        (s, seen)
    }

    #[test]
    fn failed_apply_passes_through_failed_phase() {
        let mut port = FakePort::with("f.txt", StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        port.reject = true;
        let (s, seen) = observed(port);
        let model = s.diff_model("f.txt", false).unwrap();
        let selection: LineSelection = [LineKey::new(0, 2)].into_iter().collect();

        s.stage_lines(&model, &selection).unwrap_err();
        let phases: Vec<Phase> = seen.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(
            phases,
            vec![Phase::Synthesizing, Phase::Applying, Phase::Failed, Phase::Viewing]
        );
    }

    #[test]
    fn successful_apply_refreshes() {
        let port = FakePort::with("f.txt", StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        let (s, seen) = observed(port);
        let model = s.diff_model("f.txt", false).unwrap();
        let selection: LineSelection = [LineKey::new(0, 1)].into_iter().collect();

        s.stage_lines(&model, &selection).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("f.txt".to_string(), Phase::Synthesizing),
                ("f.txt".to_string(), Phase::Applying),
                ("f.txt".to_string(), Phase::Refreshing),
                ("f.txt".to_string(), Phase::Viewing),
            ]
        );
    }

    #[test]
    fn phases_are_tracked_per_path() {
        let s = stager(StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        s.set_phase("f.txt", Phase::Applying);

        s.stage_file("g.txt").unwrap();
        assert_eq!(s.phase("f.txt"), Phase::Applying);
        assert_eq!(s.phase("g.txt"), Phase::Viewing);

        s.set_phase("f.txt", Phase::Viewing);
        assert_eq!(s.phase("f.txt"), Phase::Viewing);
        assert!(s.phases.lock().unwrap().is_empty());
    }

    #[test]
    fn whole_file_operations() {
        let s = stager(StatusFlags::MODIFIED_IN_WORKDIR, DIFF);
        s.stage_file("f.txt").unwrap();
        s.unstage_file("f.txt").unwrap();
        assert_eq!(s.port().calls(), vec!["add f.txt", "reset f.txt"]);
        assert_eq!(s.phase("f.txt"), Phase::Viewing);
    }
}
