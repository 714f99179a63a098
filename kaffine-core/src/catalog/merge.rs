//! Sorted two-list reconciliation
//!
//! Walks two sequences that are sorted by the same key with one cursor each
//! and reports every key as present in both, only on the left, or only on
//! the right. Both inputs MUST already be sorted; unsorted input produces
//! spurious left-only/right-only pairs for keys that exist on both sides.

use std::cmp::Ordering;

/// Walk `left` and `right` in key order
///
/// `compare` orders a left item against a right item. The first callback
/// error stops the walk and is returned.
pub fn merge_diff<L, R, E>(
    left: &[L],
    right: &[R],
    mut compare: impl FnMut(&L, &R) -> Ordering,
    mut on_match: impl FnMut(&L, &R) -> Result<(), E>,
    mut on_left_only: impl FnMut(&L) -> Result<(), E>,
    mut on_right_only: impl FnMut(&R) -> Result<(), E>,
) -> Result<(), E> {
    let mut i = 0usize;
    let mut j = 0usize;

    while i < left.len() && j < right.len() {
        let (a, b) = (&left[i], &right[j]);
        match compare(a, b) {
            Ordering::Equal => {
                on_match(a, b)?;
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                on_left_only(a)?;
                i += 1;
            }
            Ordering::Greater => {
                on_right_only(b)?;
                j += 1;
            }
        }
    }

    for a in &left[i..] {
        on_left_only(a)?;
    }
    for b in &right[j..] {
        on_right_only(b)?;
    }

    Ok(())
}

#[cfg(test)]
mod merge_tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Debug, Default, PartialEq)]
    struct Outcome {
        both: Vec<String>,
        left: Vec<String>,
        right: Vec<String>,
    }

    fn run(left: &[&str], right: &[&str]) -> Outcome {
        let mut both = Vec::new();
        let mut left_only = Vec::new();
        let mut right_only = Vec::new();

        merge_diff::<_, _, Infallible>(
            left,
            right,
            |a, b| a.cmp(b),
            |a, _| {
                both.push(a.to_string());
                Ok(())
            },
            |a| {
                left_only.push(a.to_string());
                Ok(())
            },
            |b| {
                right_only.push(b.to_string());
                Ok(())
            },
        )
        .unwrap();

        Outcome {
            both,
            left: left_only,
            right: right_only,
        }
    }

    #[test]
    fn test_interleaved_lists() {
        let outcome = run(&["a", "c", "d", "f"], &["b", "c", "e", "f", "g"]);
        assert_eq!(outcome.both, vec!["c", "f"]);
        assert_eq!(outcome.left, vec!["a", "d"]);
        assert_eq!(outcome.right, vec!["b", "e", "g"]);
    }

    #[test]
    fn test_empty_sides_flush_tails() {
        let outcome = run(&[], &["x", "y"]);
        assert!(outcome.both.is_empty());
        assert!(outcome.left.is_empty());
        assert_eq!(outcome.right, vec!["x", "y"]);

        let outcome = run(&["x", "y"], &[]);
        assert_eq!(outcome.left, vec!["x", "y"]);
        assert!(outcome.right.is_empty());

        assert_eq!(run(&[], &[]), Outcome::default());
    }

    #[test]
    fn test_heterogeneous_items() {
        let desired = [("aa", "uri-1"), ("cc", "uri-2")];
        let cached = ["aa".to_string(), "bb".to_string()];
        let mut fetched = Vec::new();
        let mut stale = Vec::new();

        merge_diff::<_, _, Infallible>(
            &desired,
            &cached,
            |(id, _), file| (*id).cmp(file.as_str()),
            |_, _| Ok(()),
            |(_, uri)| {
                fetched.push(*uri);
                Ok(())
            },
            |file| {
                stale.push(file.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(fetched, vec!["uri-2"]);
        assert_eq!(stale, vec!["bb"]);
    }

    #[test]
    fn test_callback_error_stops_walk() {
        let mut visited = Vec::new();
        let result = merge_diff(
            &[1, 2, 3],
            &[] as &[i32],
            |a, b| a.cmp(b),
            |_, _| Ok(()),
            |a| {
                visited.push(*a);
                if *a == 2 {
                    Err("boom")
                } else {
                    Ok(())
                }
            },
            |_| Ok(()),
        );

        assert_eq!(result, Err("boom"));
        assert_eq!(visited, vec![1, 2]);
    }
}
