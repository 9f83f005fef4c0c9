//! Error taxonomy for the scheduler.
//!
//! Three tiers, three treatments:
//!
//! - Usage violations (unstable effect count, dependency-list length
//!   changes, duplicate keys) are NOT errors - they are reported through
//!   the [diagnostics](crate::diagnostics) hook and execution continues
//!   best-effort.
//! - [`EffectFailure`] is fatal to one effect activation. It aborts the
//!   remaining slots of its scope and the branch rooted at the scope's
//!   parent, and is collected on the pass outcome.
//! - [`SchedulerError`] is fatal to the pass: an identity-management bug
//!   in the caller that the scheduler refuses to paper over.

use thiserror::Error;

use crate::types::EffectError;

/// A single effect run failed.
///
/// Carries enough to locate the slot: the owning scope's path and the
/// slot's declaration-order index.
#[derive(Debug, Error)]
#[error("effect {slot} in scope `{scope}` failed: {cause}")]
pub struct EffectFailure {
    /// Path of the owning scope, e.g. `/app/sidebar`.
    pub scope: String,
    /// Declaration-order index of the failing slot.
    pub slot: usize,
    /// The error returned by the effect body.
    pub cause: EffectError,
}

/// Invariant violations that indicate a caller bug.
///
/// These always surface - never swallowed, never recovered.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A torn-down scope was reconciled again. Once unmounted, a scope is
    /// terminal; reintroducing its key must create a fresh node instead.
    #[error("scope `{0}` was torn down and cannot be reconciled again")]
    RevivedScope(String),

    /// `teardown_tree` was called on an already-unmounted scope.
    #[error("scope `{0}` was already torn down")]
    DoubleTeardown(String),

    /// A flush ran this many passes without the mailbox settling - an
    /// effect is unconditionally retriggering itself.
    #[error("flush ran {0} passes without settling; an effect is retriggering itself")]
    UnsettledFlush(usize),
}
