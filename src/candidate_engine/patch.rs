//! Unified-diff hunk-header parsing into a set of changed line numbers.
//! SPEC_FULL §4.8.1.

use std::collections::BTreeSet;

const CONTEXT: i64 = 2;

/// Parses every `@@ -a,b +c,d @@` hunk header in `patch` and returns the set
/// of post-image line numbers touched, padded by `CONTEXT` lines on each
/// side. A bare `+c` (no comma, implying count 1) is tolerated. Lines `<= 0`
/// after padding are dropped.
pub fn changed_lines(patch: &str) -> BTreeSet<i64> {
    let mut lines = BTreeSet::new();

    for line in patch.lines() {
        let Some(hunk) = parse_hunk_header(line) else {
            continue;
        };
        let start = (hunk.new_start - CONTEXT).max(1);
        let end = hunk.new_start + hunk.new_count + CONTEXT;
        for n in start..end {
            if n > 0 {
                lines.insert(n);
            }
        }
    }

    lines
}

/// Raw (unpadded) post-image line numbers touched by `patch`'s hunks — the
/// lines actually changed, with no context buffer. Used for the *current*
/// PR's side of an overlap comparison (SPEC_FULL §4.8.2): we know exactly
/// which lines we changed, so no padding is needed there; padding only
/// matters for deciding whether a *historical* hunk's footprint is close
/// enough to count.
pub fn core_lines(patch: &str) -> BTreeSet<i64> {
    let mut lines = BTreeSet::new();
    for line in patch.lines() {
        let Some(hunk) = parse_hunk_header(line) else {
            continue;
        };
        if hunk.new_count <= 0 {
            continue;
        }
        for n in hunk.new_start..(hunk.new_start + hunk.new_count) {
            if n > 0 {
                lines.insert(n);
            }
        }
    }
    lines
}

struct HunkHeader {
    new_start: i64,
    new_count: i64,
}

fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let line = line.trim();
    if !line.starts_with("@@") {
        return None;
    }
    let body = line.strip_prefix("@@")?;
    let end = body.find("@@")?;
    let body = &body[..end];

    let mut parts = body.split_whitespace();
    let _old = parts.next()?; // "-a,b", unused
    let new = parts.next()?; // "+c,d" or "+c"
    let new = new.strip_prefix('+')?;

    let (start_str, count_str) = match new.split_once(',') {
        Some((s, c)) => (s, c),
        None => (new, "1"),
    };

    let new_start: i64 = start_str.parse().ok()?;
    let new_count: i64 = count_str.parse().ok()?;
    Some(HunkHeader { new_start, new_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_standard_hunk_header_when_parsing_then_lines_padded_by_context() {
        let patch = "@@ -10,0 +10,3 @@ fn foo() {\n+a\n+b\n+c\n";
        let lines = changed_lines(patch);
        let expected: BTreeSet<i64> = [8, 9, 10, 11, 12, 13, 14].into_iter().collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn given_bare_plus_count_when_parsing_then_count_defaults_to_one() {
        let patch = "@@ -5 +5 @@\n-old\n+new\n";
        let lines = changed_lines(patch);
        assert!(lines.contains(&5));
    }

    #[test]
    fn given_hunk_near_file_start_when_parsing_then_non_positive_lines_dropped() {
        let patch = "@@ -1,0 +1,2 @@\n+a\n+b\n";
        let lines = changed_lines(patch);
        assert!(lines.iter().all(|&n| n > 0));
        assert!(lines.contains(&1));
    }

    #[test]
    fn given_no_hunk_headers_when_parsing_then_empty_set() {
        assert!(changed_lines("not a patch").is_empty());
    }

    #[test]
    fn given_hunk_when_computing_core_lines_then_no_context_padding() {
        let patch = "@@ -10,0 +10,3 @@\n+a\n+b\n+c\n";
        let expected: BTreeSet<i64> = [10, 11, 12].into_iter().collect();
        assert_eq!(core_lines(patch), expected);
    }

    #[test]
    fn given_pure_deletion_hunk_when_computing_core_lines_then_empty() {
        let patch = "@@ -10,3 +10,0 @@\n-a\n-b\n-c\n";
        assert!(core_lines(patch).is_empty());
    }
}
