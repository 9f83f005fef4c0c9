//! Effect slot - one effect's persistent cell across passes.
//!
//! A slot keeps the two things that outlive a pass: the dependency list
//! the effect last ran with, and the cleanup it installed. Each pass the
//! owning scope hands the slot a fresh descriptor and the slot decides,
//! via the [comparator](crate::deps), whether to activate.
//!
//! # Activation contract
//!
//! 1. Compare stored deps against the descriptor's deps
//! 2. If unchanged: do nothing
//! 3. Otherwise: run the previous cleanup (if any), THEN the new body
//! 4. Store the returned cleanup and the new deps
//!
//! The cleanup-before-run ordering is the cancellation idiom this model
//! provides: an in-flight operation's effect sets an "aborted" flag in
//! its own cleanup, which the next activation fires before rerunning.

use crate::deps::should_rerun;
use crate::diagnostics::{self, UsageViolation};
use crate::error::EffectFailure;
use crate::types::{Cleanup, DepValue, EffectCtx, EffectDescriptor};

/// Persistent state for one effect call site.
///
/// The same logical effect must occupy the same index in its scope on
/// every pass - conditional registration breaks this and is surfaced by
/// the owning scope as a usage violation.
pub struct EffectSlot {
    index: usize,
    last_deps: Option<Vec<DepValue>>,
    cleanup: Option<Cleanup>,
}

impl EffectSlot {
    /// Create an inactive slot at the given declaration-order index.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            last_deps: None,
            cleanup: None,
        }
    }

    /// Declaration-order index within the owning scope.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the slot currently holds a cleanup.
    pub fn is_active(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Dependency list from the last successful run.
    pub fn last_deps(&self) -> Option<&[DepValue]> {
        self.last_deps.as_deref()
    }

    /// Activate the slot for one pass.
    ///
    /// Runs nothing if the dependencies are unchanged. Otherwise runs the
    /// stored cleanup, then the descriptor body, and stores the results.
    ///
    /// On failure the slot holds no cleanup (the previous one was already
    /// consumed, the failed run installed none) and keeps its previous
    /// deps, so the next pass retries the run.
    pub fn activate(
        &mut self,
        scope: &str,
        ctx: &EffectCtx<'_>,
        mut descriptor: EffectDescriptor,
    ) -> Result<(), EffectFailure> {
        if let (Some(prev), Some(next)) = (self.last_deps.as_ref(), descriptor.deps.as_ref()) {
            if prev.len() != next.len() {
                diagnostics::emit(UsageViolation::DepsLengthChanged {
                    scope: scope.to_string(),
                    slot: self.index,
                    prev_len: prev.len(),
                    next_len: next.len(),
                });
                // Fall through: a length mismatch always reruns
            }
        }

        if !should_rerun(self.last_deps.as_deref(), descriptor.deps.as_deref()) {
            return Ok(());
        }

        // Cleanup before next effect
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }

        match descriptor.invoke(ctx) {
            Ok(next_cleanup) => {
                self.cleanup = next_cleanup;
                self.last_deps = descriptor.deps.take();
                Ok(())
            }
            Err(cause) => Err(EffectFailure {
                scope: scope.to_string(),
                slot: self.index,
                cause,
            }),
        }
    }

    /// Run the stored cleanup, if any. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
