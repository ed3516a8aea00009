//! Unified diff text → [`DiffModel`].
//!
//! The parser is lenient: the text comes straight from git, so anything it
//! does not recognise (index lines, mode lines, malformed headers) is skipped
//! rather than reported.

use super::{DiffHunk, DiffLine, DiffModel, LineKey, LineKind};
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::opt,
    sequence::preceded,
};

/// Placeholder some git front-ends print instead of an empty diff
pub const NO_CHANGES: &str = "No changes.";

/// One side of a hunk header (`-O,oc` or `+N,nc`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub start: u32,
    pub count: u32,
}

/// Parse `start[,count]`; an omitted count means 1.
fn range(input: &str) -> IResult<&str, HunkRange> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| HunkRange {
            start,
            count: count.unwrap_or(1),
        })
        .parse(input)
}

/// Parse `@@ -O[,oc] +N[,nc] @@`, leaving any trailing section text unparsed.
pub fn hunk_header(input: &str) -> IResult<&str, (HunkRange, HunkRange)> {
    (tag("@@ -"), range, tag(" +"), range, tag(" @@"))
        .map(|(_, old, _, new, _)| (old, new))
        .parse(input)
}

/// Running line numbers and remaining declared counts for the open hunk
struct Cursor {
    old_line: u32,
    new_line: u32,
    old_left: u32,
    new_left: u32,
}

/// Parse the raw diff of a single file.
///
/// `path` is recorded as given; the `diff --git`/`---`/`+++` header lines are
/// not consulted. Blank input or [`NO_CHANGES`] yields a model with no hunks.
pub fn parse_diff(path: &str, raw: &str) -> DiffModel {
    let mut model = DiffModel {
        path: path.to_string(),
        hunks: Vec::new(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NO_CHANGES {
        return model;
    }

    let mut cursor: Option<Cursor> = None;

    for raw_line in raw.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Ok((_, (old, new))) = hunk_header(line) {
            model.hunks.push(DiffHunk {
                index: model.hunks.len(),
                header: line.to_string(),
                old_start: old.start,
                old_count: old.count,
                new_start: new.start,
                new_count: new.count,
                lines: Vec::new(),
            });
            cursor = Some(Cursor {
                old_line: old.start,
                new_line: new.start,
                old_left: old.count,
                new_left: new.count,
            });
            continue;
        }

        // Anything before the first header is file header noise
        let (Some(hunk), Some(cur)) = (model.hunks.last_mut(), cursor.as_mut()) else {
            continue;
        };

        if line.starts_with('\\') {
            if let Some(last) = hunk.lines.last_mut() {
                last.no_newline = true;
            }
            continue;
        }

        let key = LineKey::new(hunk.index, hunk.lines.len());
        let Some(marker) = line.chars().next() else {
            continue;
        };
        let content = line[marker.len_utf8()..].to_string();

        // `+++`/`---` are file headers only once the hunk has no room left
        let parsed = match marker {
            '+' if cur.new_left > 0 || !line.starts_with("+++") => {
                let n = cur.new_line;
                cur.new_line = cur.new_line.saturating_add(1);
                cur.new_left = cur.new_left.saturating_sub(1);
                Some((LineKind::Addition, None, Some(n)))
            }
            '-' if cur.old_left > 0 || !line.starts_with("---") => {
                let o = cur.old_line;
                cur.old_line = cur.old_line.saturating_add(1);
                cur.old_left = cur.old_left.saturating_sub(1);
                Some((LineKind::Deletion, Some(o), None))
            }
            ' ' => {
                let (o, n) = (cur.old_line, cur.new_line);
                cur.old_line = cur.old_line.saturating_add(1);
                cur.new_line = cur.new_line.saturating_add(1);
                cur.old_left = cur.old_left.saturating_sub(1);
                cur.new_left = cur.new_left.saturating_sub(1);
                Some((LineKind::Context, Some(o), Some(n)))
            }
            _ => None,
        };

        if let Some((kind, old_line, new_line)) = parsed {
            hunk.lines.push(DiffLine {
                kind,
                content,
                old_line,
                new_line,
                key,
                no_newline: false,
            });
        }
    }

    model
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn kinds(model: &DiffModel) -> Vec<LineKind> {
        model.lines().map(|l| l.kind).collect()
    }

    #[test]
    fn header_with_counts() {
        let (rest, (old, new)) = hunk_header("@@ -10,3 +10,4 @@ fn main()").unwrap();
        assert_eq!(old, HunkRange { start: 10, count: 3 });
        assert_eq!(new, HunkRange { start: 10, count: 4 });
        assert_eq!(rest, " fn main()");
    }

    #[test]
    fn header_counts_default_to_one() {
        let (_, (old, new)) = hunk_header("@@ -15 +14,0 @@").unwrap();
        assert_eq!(old, HunkRange { start: 15, count: 1 });
        assert_eq!(new, HunkRange { start: 14, count: 0 });

        let (_, (old, new)) = hunk_header("@@ -7 +7 @@").unwrap();
        assert_eq!(old.count, 1);
        assert_eq!(new.count, 1);
    }

    #[test]
    fn malformed_headers_do_not_match() {
        assert!(hunk_header("@@ -a,1 +1 @@").is_err());
        assert!(hunk_header("@@ 10,1 +10 @@").is_err());
        assert!(hunk_header("@@ -10,1 +10").is_err());
        assert!(hunk_header(" @@ -1 +1 @@").is_err());
    }

    #[test]
    fn no_changes_yields_empty_model() {
        let model = parse_diff("a.txt", NO_CHANGES);
        assert_eq!(model.path, "a.txt");
        assert!(model.hunks.is_empty());
        assert_eq!(model.lines().count(), 0);

        assert!(parse_diff("a.txt", "").is_empty());
        assert!(parse_diff("a.txt", "\n  \n").is_empty());
    }

    #[test]
    fn classifies_and_numbers_lines() {
        let diff = "diff --git a/f.txt b/f.txt
index 1111111..2222222 100644
--- a/f.txt
+++ b/f.txt
@@ -10,3 +10,4 @@
 a
-b
+c
+d
 e
";
        let model = parse_diff("f.txt", diff);
        assert_eq!(model.hunks.len(), 1);

        let hunk = &model.hunks[0];
        assert_eq!(hunk.header, "@@ -10,3 +10,4 @@");
        assert_eq!(
            (hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count),
            (10, 3, 10, 4)
        );
        assert_eq!(
            kinds(&model),
            vec![
                LineKind::Context,
                LineKind::Deletion,
                LineKind::Addition,
                LineKind::Addition,
                LineKind::Context,
            ]
        );

        let numbers: Vec<_> = hunk.lines.iter().map(|l| (l.old_line, l.new_line)).collect();
        assert_eq!(
            numbers,
            vec![
                (Some(10), Some(10)),
                (Some(11), None),
                (None, Some(11)),
                (None, Some(12)),
                (Some(12), Some(13)),
            ]
        );

        let keys: Vec<_> = hunk.lines.iter().map(|l| l.key).collect();
        assert_eq!(keys, (0..5).map(|i| LineKey::new(0, i)).collect::<Vec<_>>());

        assert_eq!(hunk.old_side_len(), hunk.old_count as usize);
        assert_eq!(hunk.new_side_len(), hunk.new_count as usize);
    }

    #[test]
    fn multiple_hunks_reset_counters() {
        let diff = "@@ -1,2 +1,2 @@
-x
+y
 z
@@ -40,2 +40,3 @@
 p
+q
 r
";
        let model = parse_diff("m.txt", diff);
        assert_eq!(model.hunks.len(), 2);
        assert_eq!(model.hunks[1].index, 1);
        assert_eq!(model.hunks[1].lines[0].old_line, Some(40));
        assert_eq!(model.hunks[1].lines[1].new_line, Some(41));
        assert_eq!(model.hunks[1].lines[1].key, LineKey::new(1, 1));
        assert_eq!(model.hunks[1].lines[2].new_line, Some(42));
    }

    #[test]
    fn lines_before_first_header_are_discarded() {
        let diff = "+stray addition
-stray deletion
 stray context
@@ -1 +1 @@
-old
+new
";
        let model = parse_diff("s.txt", diff);
        assert_eq!(model.lines().count(), 2);
    }

    #[test]
    fn malformed_header_line_is_skipped() {
        let diff = "@@ -1,2 +1,2 @@
 keep
-gone
+here
@@ -x +y @@
 tail
";
        let model = parse_diff("bad.txt", diff);
        assert_eq!(model.hunks.len(), 1);
        // The broken header is not context; the line after it still belongs
        // to the first hunk.
        assert_eq!(
            model.lines().map(|l| l.content.as_str()).collect::<Vec<_>>(),
            vec!["keep", "gone", "here", "tail"]
        );
    }

    #[test]
    fn header_like_content_inside_hunk() {
        let diff = "diff --git a/m.md b/m.md
--- a/m.md
+++ b/m.md
@@ -1,2 +1,2 @@
---- old rule
++++ new rule
 body
";
        let model = parse_diff("m.md", diff);
        assert_eq!(
            kinds(&model),
            vec![LineKind::Deletion, LineKind::Addition, LineKind::Context]
        );
        assert_eq!(model.hunks[0].lines[0].content, "--- old rule");
        assert_eq!(model.hunks[0].lines[1].content, "+++ new rule");
    }

    #[test]
    fn file_headers_after_exhausted_hunk_are_ignored() {
        let diff = "@@ -1 +1 @@
-a
+b
diff --git a/next b/next
--- a/next
+++ b/next
";
        let model = parse_diff("f", diff);
        assert_eq!(model.lines().count(), 2);
    }

    #[test]
    fn no_newline_marker_attaches_to_previous_line() {
        let diff = "@@ -3 +3,2 @@
-last line
\\ No newline at end of file
+last line
+new final line
\\ No newline at end of file
";
        let model = parse_diff("n.txt", diff);
        let flags: Vec<_> = model.lines().map(|l| l.no_newline).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn crlf_is_trimmed() {
        let diff = "@@ -1 +1 @@\r\n-old\r\n+new\r\n";
        let model = parse_diff("w.txt", diff);
        let contents: Vec<_> = model.lines().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["old", "new"]);
    }

    #[test]
    fn empty_content_lines() {
        let diff = "@@ -0,0 +1,3 @@\n+first\n+\n+third\n";
        let model = parse_diff("e.txt", diff);
        let contents: Vec<_> = model.lines().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "", "third"]);
        assert_eq!(model.hunks[0].lines[2].new_line, Some(3));
    }

    #[test]
    fn line_numbers_saturate_at_u32_max() {
        let diff = "@@ -4294967295,3 +4294967295,3 @@\n a\n-b\n+c\n d\n";
        let model = parse_diff("big.txt", diff);
        let numbers: Vec<_> = model.lines().map(|l| (l.old_line, l.new_line)).collect();
        assert_eq!(
            numbers,
            vec![
                (Some(u32::MAX), Some(u32::MAX)),
                (Some(u32::MAX), None),
                (None, Some(u32::MAX)),
                (Some(u32::MAX), Some(u32::MAX)),
            ]
        );
    }
}
