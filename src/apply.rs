//! Feeding synthesized patches to `git apply`.

use crate::GitError;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Which side of the repository a patch is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyMode {
    /// Apply to the index only, leaving the worktree alone
    pub cached: bool,
    /// Apply the patch in reverse
    pub reverse: bool,
    /// Accept hunks without surrounding context, as produced by `-U0` diffs
    pub unidiff_zero: bool,
}

impl ApplyMode {
    pub const STAGE: Self = Self {
        cached: true,
        reverse: false,
        unidiff_zero: false,
    };

    pub const UNSTAGE: Self = Self {
        cached: true,
        reverse: true,
        unidiff_zero: false,
    };

    pub const fn with_unidiff_zero(self, unidiff_zero: bool) -> Self {
        Self {
            unidiff_zero,
            ..self
        }
    }

    /// Arguments after `git -C <repo>`; the patch is read from stdin
    pub fn args(self) -> Vec<&'static str> {
        let mut args = vec![
            "apply",
            "--whitespace=nowarn",
            "--ignore-space-change",
            "--ignore-whitespace",
            "--recount",
        ];
        if self.cached {
            args.push("--cached");
        }
        if self.reverse {
            args.push("--reverse");
        }
        if self.unidiff_zero {
            args.push("--unidiff-zero");
        }
        args.push("-");
        args
    }
}

/// Run `git apply` in `repo` with `patch` on stdin.
///
/// A nonzero exit carries both git's stderr and the rejected patch text.
pub fn apply_patch(
    program: &str,
    repo: &Path,
    patch: &str,
    mode: ApplyMode,
) -> Result<(), GitError> {
    let args = mode.args();
    debug!(?args, repo = %repo.display(), "running git apply");

    let mut child = Command::new(program)
        .arg("-C")
        .arg(repo)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GitError::LaunchFailed {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    // Dropping the handle closes stdin so git sees end of input
    child
        .stdin
        .take()
        .ok_or(GitError::StdinUnavailable)?
        .write_all(patch.as_bytes())
        .map_err(|e| GitError::WriteFailed {
            message: e.to_string(),
        })?;

    let output = child
        .wait_with_output()
        .map_err(|e| GitError::WaitFailed {
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        warn!(%stderr, "git apply rejected patch");
        return Err(GitError::ApplyFailed {
            stderr,
            patch: patch.to_string(),
        });
    }

    Ok(())
}
