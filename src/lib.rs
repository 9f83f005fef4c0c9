//! # spark-effects
//!
//! Effect lifecycle scheduler for reactive component trees.
//!
//! Models how a unit of side-effecting logic tied to a dependency list is
//! mounted, re-evaluated, and torn down across render passes, over a tree
//! of keyed scopes. Rendering itself is a black box: the host's render
//! step hands the scheduler a descriptor tree per pass, and the scheduler
//! owns the ordering/lifecycle contract - nothing else.
//!
//! ## Architecture
//!
//! ```text
//! host render step → ScopeSpec tree → sweep (removals) → reconcile (effects)
//!                                       children first      children first
//! ```
//!
//! Per pass:
//! - Removed subtrees tear down first, deepest descendants before parents
//! - Retained/added scopes reconcile children-before-parents, so a
//!   child's effects settle before its parent's
//! - Within a scope, slots activate in declaration order, each running
//!   its previous cleanup strictly before its new body
//!
//! Passes are synchronous and serialized; rapid external triggers
//! coalesce into one pass reflecting only the latest state.
//!
//! ## Modules
//!
//! - [`types`] - Core types (DepValue, EffectDescriptor, ScopeSpec, ...)
//! - [`deps`] - Dependency comparator (identity semantics, no deep equality)
//! - [`slot`] - Effect slot (cleanup-before-run contract)
//! - [`scope`] - Scope node (keyed reconciliation, teardown ordering)
//! - [`scheduler`] - Pass driver (sweep/reconcile, trigger coalescing)
//! - [`compose`] / [`lifecycle`] - Hooks-style and class-style front-ends
//!   producing the same descriptor stream
//! - [`diagnostics`] - Usage-violation hook (the lint-adjacent warnings)
//! - [`error`] - Effect failures vs. fatal invariant errors

pub mod compose;
pub mod deps;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod scope;
pub mod slot;
pub mod types;

// Re-export commonly used items
pub use types::{
    Cleanup, ContextEntry, DepValue, EffectCtx, EffectDescriptor, EffectError, EffectFn,
    EffectResult, ScopeSpec,
};

pub use deps::{deps_equal, should_rerun};

pub use slot::EffectSlot;

pub use scope::{ScopeNode, ScopePhase};

pub use scheduler::{PassOutcome, Scheduler, Trigger};

pub use compose::ScopeBuilder;

pub use lifecycle::{Lifecycle, LifecycleHost};

pub use diagnostics::{
    diagnostic_filter, reset_diagnostics_hook, set_diagnostic_filter, set_diagnostics_hook,
    DiagnosticFilter, UsageViolation,
};

pub use error::{EffectFailure, SchedulerError};
