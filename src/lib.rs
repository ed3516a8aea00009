use error_set::error_set;

pub mod apply;
pub mod config;
pub mod diff;
pub mod git;
pub mod patch;
pub mod refs;
pub mod selection;
pub mod stager;
pub mod status;
pub mod worker;

pub use apply::ApplyMode;
pub use config::{Config, ConfigError};
pub use diff::{DiffHunk, DiffLine, DiffModel, LineKey, LineKind, format::format_model, parse_diff};
pub use git::{DiffTarget, GitCli, GitPort};
pub use patch::{Direction, Patch, synthesize};
pub use refs::{FileLineRefs, LineRef, RefParseError, parse_file_refs};
pub use selection::{LineSelection, SelectionError};
pub use stager::{Outcome, Phase, Stager};
pub use status::{GitFileStatus, StatusEntry, StatusFlags, StatusLists, classify};
pub use worker::AsyncStager;

error_set! {
    /// Top-level error for staging operations
    StagerError := {
        #[display("{file} already has an operation in progress")]
        Busy { file: String },
        #[display("Background task failed: {message}")]
        WorkerFailed { message: String },
    } || GitError

    /// Errors from running git
    GitError := {
        #[display("Failed to run {program}: {message}")]
        LaunchFailed { program: String, message: String },
        #[display("Failed to get stdin handle for git apply")]
        StdinUnavailable,
        #[display("Failed to write patch to git apply: {message}")]
        WriteFailed { message: String },
        #[display("Failed to wait for git apply: {message}")]
        WaitFailed { message: String },
        #[display("git {command} failed: {stderr}")]
        CommandFailed { command: String, stderr: String },
        #[display("git apply failed: {stderr}\nPatch Content:\n{patch}")]
        ApplyFailed { stderr: String, patch: String },
        #[display("Invalid UTF-8 in git output: {message}")]
        InvalidUtf8 { message: String },
        #[display("Unparseable git status output near '{remainder}'")]
        StatusParse { remainder: String },
    }
}
