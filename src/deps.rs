//! Dependency comparator - decides whether an effect reruns.
//!
//! Compares the dependency list an effect declared on the previous pass
//! against the one it declares now:
//!
//! 1. No list this pass (`None`): always rerun (no memoization)
//! 2. No previous list (first pass for the slot): rerun once
//! 3. Otherwise: rerun if the lengths differ, or if any pairwise element
//!    fails the identity check ([`DepValue`] equality)
//!
//! A length difference between two present lists is a usage violation -
//! the caller flags it, but the comparator still answers "rerun" so the
//! effect is not silently starved.

use crate::types::DepValue;

/// Element-wise identity comparison of two dependency lists.
///
/// Lists of different lengths are never equal.
pub fn deps_equal(prev: &[DepValue], next: &[DepValue]) -> bool {
    prev.len() == next.len() && prev.iter().zip(next).all(|(a, b)| a == b)
}

/// Should the effect rerun this pass?
///
/// `prev` is the list stored on the slot from the previous pass (`None`
/// means the slot has never run). `next` is the list declared this pass
/// (`None` means "no dependency list" - run every pass).
pub fn should_rerun(prev: Option<&[DepValue]>, next: Option<&[DepValue]>) -> bool {
    match (prev, next) {
        // No dependency list: runs every pass
        (_, None) => true,
        // First pass for this slot: must run once
        (None, Some(_)) => true,
        (Some(prev), Some(next)) => !deps_equal(prev, next),
    }
}

// =============================================================================
// Tests
// =============================================================================
