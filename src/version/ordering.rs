//! Natural version ordering
//!
//! Registries disagree on what a version looks like ("1.2.3", "v4.0.0-rc1",
//! "2.32.0.post1", "1.0-SNAPSHOT"), so ordering never assumes semantic
//! versioning. A version is split into maximal runs of digits and non-digits;
//! digit runs compare numerically and everything else compares as text.
//!
//! The ordering is ascending: `compare_versions("0.0.4", "0.0.10")` is
//! [`Ordering::Less`], and the newest version of a sorted list is its last
//! element.

use std::cmp::Ordering;

use indexmap::IndexSet;

/// Split a version string into alternating digit / non-digit runs.
///
/// The split is lossless: concatenating the tokens reproduces `version`.
/// An empty string yields a single empty token.
pub fn parse(version: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut run_is_digit: Option<bool> = None;

    for (i, c) in version.char_indices() {
        let is_digit = c.is_ascii_digit();
        match run_is_digit {
            Some(current) if current != is_digit => {
                tokens.push(&version[start..i]);
                start = i;
                run_is_digit = Some(is_digit);
            }
            Some(_) => {}
            None => run_is_digit = Some(is_digit),
        }
    }
    tokens.push(&version[start..]);

    tokens
}

/// Compare two token sequences produced by [`parse`].
///
/// Tokens are compared pairwise up to the shorter length. When every compared
/// pair ties, the sequence with more tokens is the greater one, so "1.0" sorts
/// before "1.0.0".
pub fn compare(a: &[&str], b: &[&str]) -> Ordering {
    for (left, right) in a.iter().zip(b.iter()) {
        let ordering = compare_tokens(left, right);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

/// Compare two raw version strings
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    compare(&parse(a), &parse(b))
}

/// De-duplicate versions and sort them oldest first, newest last
pub fn sort_versions<I>(versions: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let unique: IndexSet<String> = versions.into_iter().collect();
    let mut sorted: Vec<String> = unique.into_iter().collect();
    sorted.sort_by(|a, b| compare_versions(a, b));
    sorted
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn compare_tokens(left: &str, right: &str) -> Ordering {
    if is_numeric(left) && is_numeric(right) {
        compare_numeric(left, right)
    } else {
        left.cmp(right)
    }
}

// Digit runs can exceed u64 (date-stamped snapshots), so compare them as
// decimal strings instead of parsing.
fn compare_numeric(left: &str, right: &str) -> Ordering {
    let left = left.trim_start_matches('0');
    let right = right.trim_start_matches('0');
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}
