//! Diagnostics channel for usage violations.
//!
//! Usage violations are caller mistakes the scheduler detects but
//! recovers from: unstable effect counts, dependency-list length changes,
//! duplicate child keys. They mirror the class of mistakes a hooks linter
//! catches, so hosts usually want to surface them as developer warnings.
//!
//! A host can install a hook to receive them; without a hook they go to
//! `log::warn!`. Categories can be silenced with a [`DiagnosticFilter`]
//! mask, like lint rule toggles.
//!
//! # Example
//!
//! ```ignore
//! use spark_effects::diagnostics::{set_diagnostics_hook, UsageViolation};
//!
//! set_diagnostics_hook(|violation| {
//!     eprintln!("dev warning: {violation}");
//! });
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Mask of violation categories that are reported.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DiagnosticFilter: u8 {
        /// A slot's dependency list changed length between passes.
        const DEPS_LENGTH = 1 << 0;
        /// A live scope declared a different number of effects.
        const EFFECT_COUNT = 1 << 1;
        /// Two sibling scopes declared the same key.
        const DUPLICATE_KEY = 1 << 2;
    }
}

/// A detected caller mistake. Non-fatal: execution continues with
/// best-effort semantics after reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageViolation {
    /// The same slot declared dependency lists of different lengths on
    /// consecutive passes. Best effort: the effect reruns.
    DepsLengthChanged {
        scope: String,
        slot: usize,
        prev_len: usize,
        next_len: usize,
    },
    /// A scope declared a different effect count than it mounted with.
    /// Stable call order is a precondition, not a variable. Best effort:
    /// extra slots are created fresh, surplus slots are torn down.
    UnstableEffectCount {
        scope: String,
        mounted: usize,
        declared: usize,
    },
    /// Two sibling scopes used the same key. The later spec is skipped.
    DuplicateChildKey { scope: String, key: String },
}

impl UsageViolation {
    fn category(&self) -> DiagnosticFilter {
        match self {
            Self::DepsLengthChanged { .. } => DiagnosticFilter::DEPS_LENGTH,
            Self::UnstableEffectCount { .. } => DiagnosticFilter::EFFECT_COUNT,
            Self::DuplicateChildKey { .. } => DiagnosticFilter::DUPLICATE_KEY,
        }
    }
}

impl fmt::Display for UsageViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepsLengthChanged {
                scope,
                slot,
                prev_len,
                next_len,
            } => write!(
                f,
                "effect {slot} in scope `{scope}` changed dependency list length \
                 ({prev_len} -> {next_len}); dependency lists must keep a stable length"
            ),
            Self::UnstableEffectCount {
                scope,
                mounted,
                declared,
            } => write!(
                f,
                "scope `{scope}` declared {declared} effects but mounted with {mounted}; \
                 effects must be registered unconditionally, in a stable order"
            ),
            Self::DuplicateChildKey { scope, key } => write!(
                f,
                "scope `{scope}` has duplicate child key `{key}`; keys must be unique"
            ),
        }
    }
}

// =============================================================================
// Hook Registry
// =============================================================================

thread_local! {
    static HOOK: RefCell<Option<Box<dyn Fn(&UsageViolation)>>> = const { RefCell::new(None) };

    static FILTER: Cell<DiagnosticFilter> = const { Cell::new(DiagnosticFilter::all()) };
}

/// Install a hook that receives every reported violation.
///
/// Replaces any previously installed hook.
pub fn set_diagnostics_hook(hook: impl Fn(&UsageViolation) + 'static) {
    HOOK.with(|cell| {
        *cell.borrow_mut() = Some(Box::new(hook));
    });
}

/// Remove the installed hook. Violations fall back to `log::warn!`.
pub fn reset_diagnostics_hook() {
    HOOK.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Set which violation categories are reported.
pub fn set_diagnostic_filter(filter: DiagnosticFilter) {
    FILTER.with(|cell| cell.set(filter));
}

/// Current violation category mask.
pub fn diagnostic_filter() -> DiagnosticFilter {
    FILTER.with(|cell| cell.get())
}

/// Report a violation to the hook, or `log::warn!` if none is installed.
pub(crate) fn emit(violation: UsageViolation) {
    if !diagnostic_filter().contains(violation.category()) {
        return;
    }
    let handled = HOOK.with(|cell| {
        if let Some(hook) = cell.borrow().as_ref() {
            hook(&violation);
            true
        } else {
            false
        }
    });
    if !handled {
        log::warn!("{violation}");
    }
}

// =============================================================================
// Tests
// =============================================================================
