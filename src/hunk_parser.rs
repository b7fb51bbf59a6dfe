//! HunkParser (spec §4.2): turns one hunk's raw body plus a drift-corrected
//! starting line into an ordered list of [`Segment`]s.
//!
//! The state machine (`last_op`/`replace_active`/`cursor`) is carried over
//! structurally from `original_source/patch_importer.py::_parse_patch_hunk`,
//! restated as a typed match over line prefixes instead of string comparison
//! against `'+'`/`'-'`.
use crate::error::HunkParseError;
use crate::model::Segment;

#[derive(Clone, Copy, PartialEq, Eq)]
enum LastOp {
    None,
    Plus,
    Minus,
}

/// Parses one hunk's raw body (may include the leading `@@ ... @@` header
/// line; it is skipped) into an ordered, non-overlapping list of segments.
///
/// `start_line_in_current_file` must already be drift-corrected by
/// [`crate::drift::DriftTracker`] — it is not the value from the hunk's
/// `@@` header.
///
/// # Errors
///
/// Returns [`HunkParseError::InputMalformed`] if a `-` line follows a `+`
/// line within the same hunk without intervening context (spec §4.2, §7).
pub fn parse(hunk_body: &str, start_line_in_current_file: usize) -> Result<Vec<Segment>, HunkParseError> {
    let mut cursor = start_line_in_current_file;
    let mut last_op = LastOp::None;
    let mut replace_active = false;
    let mut segments: Vec<Segment> = Vec::new();

    for line in hunk_body.lines() {
        if line.starts_with("@@") {
            continue;
        }

        if line.starts_with('+') {
            match last_op {
                LastOp::Minus => {
                    if let Some(Segment::Remove { start, count }) = segments.pop() {
                        segments.push(Segment::Replace {
                            start,
                            removed_count: count,
                            added_count: 1,
                        });
                    }
                    replace_active = true;
                }
                LastOp::Plus => {
                    if replace_active {
                        if let Some(Segment::Replace { added_count, .. }) = segments.last_mut() {
                            *added_count += 1;
                        }
                    } else if let Some(Segment::Add { count, .. }) = segments.last_mut() {
                        *count += 1;
                    }
                }
                LastOp::None => {
                    segments.push(Segment::Add {
                        start: cursor,
                        count: 1,
                    });
                }
            }
            last_op = LastOp::Plus;
            // Added lines don't exist in the current file's coordinate
            // system; the cursor does not advance.
        } else if line.starts_with('-') {
            if last_op == LastOp::Plus {
                return Err(HunkParseError::InputMalformed);
            }
            if last_op == LastOp::Minus {
                if let Some(Segment::Remove { count, .. }) = segments.last_mut() {
                    *count += 1;
                }
            } else {
                segments.push(Segment::Remove {
                    start: cursor,
                    count: 1,
                });
            }
            last_op = LastOp::Minus;
            replace_active = false;
            cursor += 1;
        } else {
            // Context line (leading space, or anything else that isn't a
            // recognized hunk-body prefix).
            last_op = LastOp::None;
            replace_active = false;
            cursor += 1;
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn single_add() {
        let body = indoc! {"
            @@ -10,2 +10,3 @@
             ctx1
            +NEW
             ctx2"};
        let segments = parse(body, 10).unwrap();
        assert_eq!(segments, vec![Segment::Add { start: 11, count: 1 }]);
    }

    #[test]
    fn single_remove() {
        let body = indoc! {"
            @@ -10,3 +10,2 @@
             ctx1
            -OLD
             ctx2"};
        let segments = parse(body, 10).unwrap();
        assert_eq!(segments, vec![Segment::Remove { start: 11, count: 1 }]);
    }

    #[test]
    fn replace() {
        let body = indoc! {"
            @@ -10,3 +10,3 @@
             ctx1
            -OLD
            +NEW
             ctx2"};
        let segments = parse(body, 10).unwrap();
        assert_eq!(
            segments,
            vec![Segment::Replace {
                start: 11,
                removed_count: 1,
                added_count: 1
            }]
        );
    }

    #[test]
    fn malformed_remove_after_add_is_rejected() {
        let body = indoc! {"
            @@ -1,2 +1,2 @@
            +added
            -removed"};
        let err = parse(body, 1).unwrap_err();
        assert!(matches!(err, HunkParseError::InputMalformed));
    }

    #[test]
    fn multi_line_add_and_remove_runs_merge_into_one_replace() {
        let body = indoc! {"
            @@ -5,3 +5,3 @@
             ctx
            -a
            -b
            -c
            +x
            +y
             ctx2"};
        let segments = parse(body, 5).unwrap();
        assert_eq!(
            segments,
            vec![Segment::Replace {
                start: 6,
                removed_count: 3,
                added_count: 2
            }]
        );
    }

    #[test]
    fn end_of_file_hunk_with_no_trailing_context() {
        let body = indoc! {"
            @@ -8,2 +8,1 @@
             ctx
            -last"};
        let segments = parse(body, 8).unwrap();
        assert_eq!(segments, vec![Segment::Remove { start: 9, count: 1 }]);
    }

    #[test]
    fn segments_are_sorted_and_non_overlapping() {
        let body = indoc! {"
            @@ -1,6 +1,6 @@
             a
            -b
            +c
             d
            -e
            +f
             g"};
        let segments = parse(body, 1).unwrap();
        let mut prev_end = 0;
        for seg in &segments {
            assert!(seg.start() >= prev_end);
            prev_end = seg.start() + 1;
        }
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn add_only_hunk_never_advances_cursor() {
        let body = "@@ -1,0 +1,3 @@\n+a\n+b\n+c";
        let segments = parse(body, 1).unwrap();
        assert_eq!(segments, vec![Segment::Add { start: 1, count: 3 }]);
    }
}
