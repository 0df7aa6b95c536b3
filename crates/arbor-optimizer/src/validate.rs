//! Candidate validation against the reconstructed label sequence.

use arbor_pathdb::{Axis, Path, PathNodeKey, PathSummaryReader};
use roaring::RoaringBitmap;

/// Does the concrete `path` (whose terminal label already matched) carry
/// the `expected` labels, leaf first, on its way to the root?
///
/// The walk starts one step above the leaf. Child steps with the next
/// expected label consume it; other steps are passed over. Once every label
/// is consumed the walk only continues through array steps.
pub fn path_matches(path: &Path, expected: &[String]) -> bool {
    let Some((_, above_leaf)) = path.steps().split_last() else {
        return false;
    };

    let mut matched = 0;
    for step in above_leaf.iter().rev() {
        if matched == expected.len() {
            if step.axis == Axis::ChildArray {
                continue;
            }
            break;
        }
        if step.is_child_named(&expected[matched]) {
            matched += 1;
        }
    }
    matched == expected.len()
}

/// Remove every candidate whose path does not carry `expected`.
///
/// Rejections are collected in a first pass and removed in a second one.
/// Candidates the summary cannot resolve are rejected too.
pub fn retain_matching(
    summary: &mut dyn PathSummaryReader,
    candidates: &RoaringBitmap,
    expected: &[String],
) -> Vec<PathNodeKey> {
    let mut rejected = RoaringBitmap::new();
    for key in candidates {
        let accepted = summary.move_to(key)
            && summary
                .path()
                .is_some_and(|path| path_matches(&path, expected));
        if !accepted {
            rejected.insert(key);
        }
    }

    let mut survivors = candidates.clone();
    survivors -= rejected;
    survivors.iter().collect()
}

/// Depth (steps from the root) of the node a predicate is evaluated
/// against: the resolved path minus the steps its own labels occupy.
///
/// Array steps directly above the predicate's first label stay part of the
/// level, since the filter applies to the array's members.
pub fn predicate_level(path: &Path, predicate_labels: &[String]) -> u32 {
    let steps = path.steps();
    let mut consumed = 0;
    let mut level = steps.len();
    for step in steps.iter().rev() {
        if consumed == predicate_labels.len() {
            break;
        }
        if step.is_child_named(&predicate_labels[consumed]) {
            consumed += 1;
        }
        level -= 1;
    }
    level as u32
}
