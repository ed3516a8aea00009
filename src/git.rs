//! The boundary between the staging workflow and a git repository.

use crate::GitError;
use crate::apply::{self, ApplyMode};
use crate::config::Config;
use crate::status::{StatusEntry, parse_porcelain};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Which comparison a raw diff is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTarget {
    /// HEAD against the index
    Index,
    /// Index against the worktree
    Worktree,
    /// An empty file against the worktree, for paths git does not track yet
    Untracked,
}

/// Repository operations the workflow depends on.
///
/// Implementations must be usable from worker threads.
pub trait GitPort: Send + Sync {
    /// Unified diff text for a single path
    fn raw_diff(&self, path: &str, target: DiffTarget) -> Result<String, GitError>;

    /// Every changed, untracked or ignored path, in git's order
    fn status_entries(&self) -> Result<Vec<StatusEntry>, GitError>;

    fn apply_patch(&self, patch: &str, mode: ApplyMode) -> Result<(), GitError>;

    /// Record an untracked path in the index with no content yet
    fn mark_intent_to_add(&self, path: &str) -> Result<(), GitError>;

    fn stage_path(&self, path: &str) -> Result<(), GitError>;

    fn unstage_path(&self, path: &str) -> Result<(), GitError>;
}

/// [`GitPort`] backed by the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    repo: PathBuf,
    context_lines: u32,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            program: config.git.program.clone(),
            repo: repo.into(),
            context_lines: config.diff.context_lines,
        }
    }

    fn diff_args(&self, path: &str, target: DiffTarget) -> Vec<String> {
        let mut args = vec![
            "diff".to_string(),
            "--no-ext-diff".to_string(),
            "--no-color".to_string(),
            format!("-U{}", self.context_lines),
        ];
        match target {
            DiffTarget::Index => args.extend(["--cached".into(), "--".into(), path.into()]),
            DiffTarget::Worktree => args.extend(["--".into(), path.into()]),
            DiffTarget::Untracked => args.extend([
                "--no-index".into(),
                "--".into(),
                "/dev/null".into(),
                path.into(),
            ]),
        }
        args
    }

    /// Hunks read at `-U0` carry no context, which `git apply` refuses
    /// unless told otherwise
    fn apply_mode(&self, mode: ApplyMode) -> ApplyMode {
        mode.with_unidiff_zero(self.context_lines == 0)
    }

    /// Run git and return stdout, treating any exit code in `accepted` as
    /// success
    fn run(&self, args: &[String], accepted: &[i32]) -> Result<String, GitError> {
        debug!(?args, repo = %self.repo.display(), "running git");

        let output = Command::new(&self.program)
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .map_err(|e| GitError::LaunchFailed {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let ok = output
            .status
            .code()
            .is_some_and(|code| accepted.contains(&code));
        if !ok {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: stderr.trim_end().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    fn run_ok(&self, args: &[&str]) -> Result<(), GitError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.run(&args, &[0]).map(|_| ())
    }
}

impl GitPort for GitCli {
    fn raw_diff(&self, path: &str, target: DiffTarget) -> Result<String, GitError> {
        let args = self.diff_args(path, target);
        // `--no-index` exits 1 whenever the files differ
        let accepted: &[i32] = match target {
            DiffTarget::Untracked => &[0, 1],
            _ => &[0],
        };
        self.run(&args, accepted)
    }

    fn status_entries(&self) -> Result<Vec<StatusEntry>, GitError> {
        let args = [
            "status".to_string(),
            "--porcelain=v1".to_string(),
            "-z".to_string(),
            "--untracked-files=all".to_string(),
        ];
        let raw = self.run(&args, &[0])?;
        parse_porcelain(&raw).map_err(|remainder| GitError::StatusParse { remainder })
    }

    fn apply_patch(&self, patch: &str, mode: ApplyMode) -> Result<(), GitError> {
        apply::apply_patch(&self.program, &self.repo, patch, self.apply_mode(mode))
    }

    fn mark_intent_to_add(&self, path: &str) -> Result<(), GitError> {
        self.run_ok(&["add", "-N", "--", path])
    }

    fn stage_path(&self, path: &str) -> Result<(), GitError> {
        self.run_ok(&["add", "--", path])
    }

    fn unstage_path(&self, path: &str) -> Result<(), GitError> {
        self.run_ok(&["reset", "-q", "--", path])
    }
}
