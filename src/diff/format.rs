use super::{DiffModel, LineKind};
use std::fmt::Write;

/// Render a diff with explicit line numbers so lines can be referenced
/// for staging.
///
/// Additions are shown with their new line number, deletions with their old
/// line number; these are the numbers accepted by `file:refs` selections.
///
/// Example output:
/// ```text
/// flake.nix:
///    136:	  inputs = {
///   +137:	      debug = true;
///
///   -15:	      enableAutosuggestions = true;
/// ```
pub fn format_model(model: &DiffModel) -> String {
    if model.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}:", model.path);

    for (i, hunk) in model.hunks.iter().enumerate() {
        // Blank line between non-contiguous hunks
        if i > 0 {
            out.push('\n');
        }

        for line in &hunk.lines {
            let _ = match line.kind {
                LineKind::Addition => writeln!(
                    out,
                    "  +{}:\t{}",
                    line.new_line.unwrap_or_default(),
                    line.content
                ),
                LineKind::Deletion => writeln!(
                    out,
                    "  -{}:\t{}",
                    line.old_line.unwrap_or_default(),
                    line.content
                ),
                LineKind::Context => writeln!(
                    out,
                    "   {}:\t{}",
                    line.new_line.unwrap_or_default(),
                    line.content
                ),
                LineKind::HunkHeader => Ok(()),
            };
        }
    }

    out
}
