//! Scheduler - drives the render→commit→effect pipeline.
//!
//! One pass is one discrete cycle: the host's (external) render step
//! produces a keyed [`ScopeSpec`] tree, and the scheduler applies it to
//! its scope tree in two walks:
//!
//! 1. **Sweep** - removed subtrees tear down first, deepest descendants
//!    before their parents, before any effect of the pass runs
//! 2. **Reconcile** - children before parents, each scope's full
//!    cleanup-then-run sequence completing before its parent's
//!
//! # Passes and coalescing
//!
//! Passes are triggered by external stimuli through a [`Trigger`] handle.
//! The mailbox keeps only the latest spec: several near-simultaneous
//! stimuli fold into one pass that reflects the final state, so the
//! number of effect phases shrinks but no update is lost. A trigger sent
//! from inside an effect (the fire-and-forget idiom for async results)
//! lands in the mailbox and runs as a follow-up pass in the same flush -
//! effect phases never interleave.
//!
//! # Example
//!
//! ```ignore
//! use spark_effects::{Scheduler, ScopeSpec, EffectDescriptor};
//!
//! let mut scheduler = Scheduler::new();
//!
//! let mut spec = ScopeSpec::new("app");
//! spec.effects.push(EffectDescriptor::once(|_| {
//!     println!("mounted");
//!     Some(Box::new(|| println!("unmounted")))
//! }));
//!
//! let outcome = scheduler.run_pass(spec)?;
//! assert!(outcome.failures.is_empty());
//! scheduler.unmount()?;
//! # Ok::<(), spark_effects::SchedulerError>(())
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{EffectFailure, SchedulerError};
use crate::scope::ScopeNode;
use crate::types::ScopeSpec;

/// Upper bound on follow-up passes in one flush. An effect that keeps
/// retriggering itself would otherwise never settle.
const MAX_FLUSH_PASSES: usize = 64;

// =============================================================================
// Pass Outcome
// =============================================================================

/// What one `run_pass`/`flush` call did.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Effect runs that failed, in the order they were encountered. Each
    /// was contained at its scope's parent boundary; the rest of the tree
    /// reconciled normally.
    pub failures: Vec<EffectFailure>,
    /// Passes executed (a flush may run follow-up passes).
    pub passes_run: usize,
    /// Triggers that were folded away by coalescing.
    pub coalesced_triggers: usize,
}

impl PassOutcome {
    fn absorb(&mut self, other: PassOutcome) {
        self.failures.extend(other.failures);
        self.passes_run += other.passes_run;
        self.coalesced_triggers += other.coalesced_triggers;
    }
}

// =============================================================================
// Trigger Mailbox
// =============================================================================

struct Inbox {
    pending: Option<ScopeSpec>,
    coalesced: usize,
}

/// Cloneable handle for requesting passes.
///
/// `send` replaces any pending spec - the mailbox holds only the latest
/// state. Hand clones to timers, input handlers, or effects that need to
/// schedule a follow-up pass when async work lands.
#[derive(Clone)]
pub struct Trigger {
    inbox: Rc<RefCell<Inbox>>,
}

impl Trigger {
    /// Request a pass with this spec. Coalesces with any pending request.
    pub fn send(&self, spec: ScopeSpec) {
        let mut inbox = self.inbox.borrow_mut();
        if inbox.pending.replace(spec).is_some() {
            inbox.coalesced += 1;
        }
    }

    /// Whether a pass request is waiting.
    pub fn has_pending(&self) -> bool {
        self.inbox.borrow().pending.is_some()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Owns the root scope tree and executes passes against it.
///
/// Single-threaded and synchronous: a pass runs to completion on the
/// calling thread before the next one starts. Slot state is only ever
/// touched by the pass that owns it, so no locking exists anywhere.
pub struct Scheduler {
    root: Option<ScopeNode>,
    inbox: Rc<RefCell<Inbox>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            root: None,
            inbox: Rc::new(RefCell::new(Inbox {
                pending: None,
                coalesced: 0,
            })),
        }
    }

    /// A handle for requesting passes from outside (or from effects).
    pub fn trigger(&self) -> Trigger {
        Trigger {
            inbox: self.inbox.clone(),
        }
    }

    /// Request a pass without running it. Equivalent to `trigger().send`.
    pub fn schedule(&self, spec: ScopeSpec) {
        self.trigger().send(spec);
    }

    /// Whether a scheduled pass is waiting for [`flush`](Self::flush).
    pub fn has_pending(&self) -> bool {
        self.inbox.borrow().pending.is_some()
    }

    /// The root scope, if a pass has run.
    pub fn root(&self) -> Option<&ScopeNode> {
        self.root.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.root.as_ref().is_some_and(|r| r.is_mounted())
    }

    /// Execute one pass with the given root spec.
    ///
    /// Sweeps removed subtrees first (all removal cleanups fire before
    /// any effect), then reconciles children-before-parents. Effect
    /// failures are contained per branch and reported on the outcome;
    /// only invariant violations surface as `Err`.
    pub fn run_pass(&mut self, spec: ScopeSpec) -> Result<PassOutcome, SchedulerError> {
        let mut outcome = PassOutcome {
            passes_run: 1,
            ..PassOutcome::default()
        };

        // A changed root key replaces the whole tree
        if let Some(root) = &mut self.root {
            if root.key() == spec.key {
                root.sweep(&spec);
            } else {
                log::trace!(
                    "root key changed `{}` -> `{}`, replacing tree",
                    root.key(),
                    spec.key
                );
                root.teardown_in_tree();
                self.root = None;
            }
        }

        let root = self
            .root
            .get_or_insert_with(|| ScopeNode::root(spec.key.clone()));

        // ScopeRun at the root needs no containment: its failure is
        // already on the outcome.
        let _ = root.reconcile(spec, &[], &mut outcome.failures)?;

        log::trace!(
            "pass complete: {} failure(s)",
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Run every pending pass to completion.
    ///
    /// Drains the mailbox: the latest pending spec runs as one pass, and
    /// triggers sent during that pass (by effects) run as follow-up
    /// passes, serialized - no two effect phases ever interleave. Returns
    /// the merged outcome; `passes_run` is zero if nothing was pending.
    pub fn flush(&mut self) -> Result<PassOutcome, SchedulerError> {
        let mut total = PassOutcome::default();
        loop {
            let next = {
                let mut inbox = self.inbox.borrow_mut();
                let coalesced = std::mem::take(&mut inbox.coalesced);
                inbox.pending.take().map(|spec| (spec, coalesced))
            };
            let Some((spec, coalesced)) = next else {
                return Ok(total);
            };
            total.coalesced_triggers += coalesced;

            if total.passes_run >= MAX_FLUSH_PASSES {
                return Err(SchedulerError::UnsettledFlush(MAX_FLUSH_PASSES));
            }
            total.absorb(self.run_pass(spec)?);
        }
    }

    /// Tear down the root tree: child cleanups before parents.
    ///
    /// Pending triggers are discarded - there is no tree left for them.
    pub fn unmount(&mut self) -> Result<(), SchedulerError> {
        {
            let mut inbox = self.inbox.borrow_mut();
            inbox.pending = None;
            inbox.coalesced = 0;
        }
        match self.root.take() {
            Some(mut root) => root.teardown_tree(),
            None => Ok(()),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
