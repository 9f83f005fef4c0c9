//! Scope node - one component instance in the tree.
//!
//! A scope owns its effect slots (declaration-order indexed) and its
//! child scopes (matched by explicit stable key, not position). The
//! scheduler drives it through two walks per pass:
//!
//! 1. [`sweep`](ScopeNode::sweep) - tear down subtrees whose keys vanished
//!    from this pass's spec, deepest descendants first, before any effect
//!    of the pass runs
//! 2. [`reconcile`](ScopeNode::reconcile) - children before parents, so a
//!    child's effects settle before its parent's effect for the same pass
//!
//! # Lifecycle
//!
//! ```text
//! Fresh → Mounted → (updates)* → Unmounted (terminal)
//! ```
//!
//! Unmounted is terminal: a torn-down node is never reused, even if a
//! later pass reintroduces its key - captured state from a dead instance
//! must not resurrect. The scheduler creates a fresh node instead.

use std::rc::Rc;

use crate::diagnostics::{self, UsageViolation};
use crate::error::{EffectFailure, SchedulerError};
use crate::slot::EffectSlot;
use crate::types::{ContextEntry, DepValue, EffectCtx, ScopeSpec};

/// Where a scope is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    /// Created; its own effect phase has not been reached yet. A pass
    /// that aborts before this scope's slots allocate leaves it fresh.
    Fresh,
    /// Reached its own effect phase at least once.
    Mounted,
    /// Torn down. Terminal.
    Unmounted,
}

/// Outcome of reconciling one scope for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeRun {
    /// The scope's effect phase completed (failures deeper in the subtree
    /// were already contained at their own ancestor boundary).
    Completed,
    /// One of this scope's own slots failed. The caller aborts its
    /// remaining work for the pass and absorbs the failure.
    Aborted,
}

/// One component instance: effect slots plus keyed children.
pub struct ScopeNode {
    key: String,
    path: String,
    phase: ScopePhase,
    effects: Vec<EffectSlot>,
    children: Vec<ScopeNode>,
    context: Vec<ContextEntry>,
}

impl ScopeNode {
    /// Create a fresh root scope.
    pub fn root(key: impl Into<String>) -> Self {
        let key = key.into();
        let path = format!("/{key}");
        Self::with_path(key, path)
    }

    fn with_path(key: String, path: String) -> Self {
        Self {
            key,
            path,
            phase: ScopePhase::Fresh,
            effects: Vec::new(),
            children: Vec::new(),
            context: Vec::new(),
        }
    }

    fn child_of(parent_path: &str, key: &str) -> Self {
        Self::with_path(key.to_string(), format!("{parent_path}/{key}"))
    }

    /// Stable identity key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Slash-separated key path from the root, e.g. `/app/list/item-2`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn phase(&self) -> ScopePhase {
        self.phase
    }

    pub fn is_mounted(&self) -> bool {
        self.phase == ScopePhase::Mounted
    }

    /// Number of effect slots this scope mounted with.
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Child scope by key.
    pub fn child(&self, key: &str) -> Option<&ScopeNode> {
        self.children.iter().find(|c| c.key == key)
    }

    /// Child scopes in last-reconciled order.
    pub fn children(&self) -> impl Iterator<Item = &ScopeNode> {
        self.children.iter()
    }

    /// Context value this scope itself provides.
    pub fn context_value(&self, name: &str) -> Option<DepValue> {
        self.context
            .iter()
            .rev()
            .find(|(entry, _)| entry.as_ref() == name)
            .map(|(_, value)| value.clone())
    }

    // =========================================================================
    // Sweep - pre-effect removal walk
    // =========================================================================

    /// Tear down every subtree whose key is absent from `spec`.
    ///
    /// Runs before any effect of the pass: all removal cleanups fire
    /// first, deepest descendants before their parents. Retained children
    /// are swept recursively against their matching child spec.
    pub(crate) fn sweep(&mut self, spec: &ScopeSpec) {
        for child in &mut self.children {
            let retained = spec.children.iter().find(|s| s.key == child.key);
            match retained {
                Some(child_spec) => child.sweep(child_spec),
                None => child.teardown_in_tree(),
            }
        }
        self.children.retain(|c| c.phase != ScopePhase::Unmounted);
    }

    // =========================================================================
    // Reconcile - children before parents
    // =========================================================================

    /// Apply one pass's spec to this scope and its subtree.
    ///
    /// Children reconcile first (new keys create fresh nodes, retained
    /// keys recurse), then this scope's own slots activate in ascending
    /// index order. Effect failures are collected into `failures` and
    /// contained at the failing scope's grandparent: the parent of a
    /// failed scope abandons its remaining work for the pass, its own
    /// siblings continue normally.
    pub(crate) fn reconcile(
        &mut self,
        spec: ScopeSpec,
        inherited: &[ContextEntry],
        failures: &mut Vec<EffectFailure>,
    ) -> Result<ScopeRun, SchedulerError> {
        if self.phase == ScopePhase::Unmounted {
            return Err(SchedulerError::RevivedScope(self.path.clone()));
        }
        debug_assert_eq!(self.key, spec.key, "reconcile matched by key");

        let was_fresh = self.phase == ScopePhase::Fresh;

        let ScopeSpec {
            key: _,
            effects: descriptors,
            context,
            children: child_specs,
        } = spec;

        self.context = context;
        let mut chain: Vec<ContextEntry> = inherited.to_vec();
        chain.extend(self.context.iter().cloned());

        // --- children first (bottom-up effect ordering) ---
        let mut previous = std::mem::take(&mut self.children);
        let mut next_children: Vec<ScopeNode> = Vec::with_capacity(child_specs.len());
        let mut aborted = false;

        for child_spec in child_specs {
            if next_children.iter().any(|c| c.key == child_spec.key) {
                diagnostics::emit(UsageViolation::DuplicateChildKey {
                    scope: self.path.clone(),
                    key: child_spec.key,
                });
                continue;
            }

            let taken = match previous.iter().position(|c| c.key == child_spec.key) {
                Some(pos) => Some(previous.remove(pos)),
                None => None,
            };

            if aborted {
                // Branch already failed this pass: retained siblings stay
                // alive but are not processed. New keys wait for the next
                // pass to mount.
                if let Some(child) = taken {
                    next_children.push(child);
                }
                continue;
            }

            let mut child =
                taken.unwrap_or_else(|| ScopeNode::child_of(&self.path, &child_spec.key));

            let run = match child.reconcile(child_spec, &chain, failures) {
                Ok(run) => run,
                Err(err) => {
                    next_children.push(child);
                    next_children.extend(previous);
                    self.children = next_children;
                    return Err(err);
                }
            };
            next_children.push(child);

            if run == ScopeRun::Aborted {
                // Failure contained here: skip our remaining children and
                // our own effects, but report Completed so our parent and
                // its other branches proceed normally.
                log::debug!(
                    "scope `{}` aborted for this pass: a child effect failed",
                    self.path
                );
                aborted = true;
            }
        }
        next_children.extend(previous);
        self.children = next_children;

        if aborted {
            return Ok(ScopeRun::Completed);
        }

        // --- own effects, ascending index ---
        // The scope counts as mounted only once its effect phase is
        // reached. An aborted first pass (a child failed before our slots
        // were allocated) leaves it fresh, so the next pass mounts it
        // rather than reading "zero slots" as an unstable effect count.
        let declared = descriptors.len();
        if was_fresh {
            self.phase = ScopePhase::Mounted;
            log::trace!("mount scope `{}`", self.path);
            self.effects = (0..declared).map(EffectSlot::new).collect();
        } else {
            log::trace!("update scope `{}`", self.path);
            if declared != self.effects.len() {
                diagnostics::emit(UsageViolation::UnstableEffectCount {
                    scope: self.path.clone(),
                    mounted: self.effects.len(),
                    declared,
                });
                if declared > self.effects.len() {
                    for index in self.effects.len()..declared {
                        self.effects.push(EffectSlot::new(index));
                    }
                } else {
                    // Flagged above; surplus slots release their cleanups
                    // rather than leaking them.
                    for mut slot in self.effects.drain(declared..) {
                        slot.teardown();
                    }
                }
            }
        }

        let ctx = EffectCtx::new(&self.path, &chain);
        for (slot, descriptor) in self.effects.iter_mut().zip(descriptors) {
            if let Err(failure) = slot.activate(&self.path, &ctx, descriptor) {
                log::debug!("{failure}");
                failures.push(failure);
                // Remaining slots in this scope are not processed
                return Ok(ScopeRun::Aborted);
            }
        }

        Ok(ScopeRun::Completed)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tear down this scope and every descendant.
    ///
    /// Child cleanups run before the parent's, matching mount/update
    /// ordering. Tearing down an already-unmounted scope is a caller bug.
    pub fn teardown_tree(&mut self) -> Result<(), SchedulerError> {
        if self.phase == ScopePhase::Unmounted {
            return Err(SchedulerError::DoubleTeardown(self.path.clone()));
        }
        self.teardown_in_tree();
        Ok(())
    }

    /// Recursive teardown: children in declaration order (each deepest
    /// first), then own slots in ascending index order.
    pub(crate) fn teardown_in_tree(&mut self) {
        for child in &mut self.children {
            if child.phase != ScopePhase::Unmounted {
                child.teardown_in_tree();
            }
        }
        self.children.clear();
        for slot in &mut self.effects {
            slot.teardown();
        }
        self.effects.clear();
        self.context.clear();
        self.phase = ScopePhase::Unmounted;
        log::trace!("unmount scope `{}`", self.path);
    }

    /// Build a context entry, for hosts assembling specs by hand.
    pub fn context_entry(name: impl Into<Rc<str>>, value: impl Into<DepValue>) -> ContextEntry {
        (name.into(), value.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cleanup, EffectDescriptor};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging_effect(deps: Option<Vec<DepValue>>, log: Log, name: &'static str) -> EffectDescriptor {
        EffectDescriptor::new(deps, move |_| {
            log.borrow_mut().push(name.to_string());
            let log = log.clone();
            Ok(Some(Box::new(move || {
                log.borrow_mut().push(format!("{name}-cleanup"));
            }) as Cleanup))
        })
    }

    fn spec_with_effect(key: &str, log: &Log, name: &'static str) -> ScopeSpec {
        let mut spec = ScopeSpec::new(key);
        spec.effects.push(logging_effect(Some(vec![]), log.clone(), name));
        spec
    }

    #[test]
    fn test_mount_creates_slots_and_runs_effects() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let spec = spec_with_effect("app", &log, "a");
        root.reconcile(spec, &[], &mut failures).unwrap();

        assert!(root.is_mounted());
        assert_eq!(root.effect_count(), 1);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_children_run_before_parent() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("p");
        let mut failures = Vec::new();

        let mut spec = spec_with_effect("p", &log, "P");
        spec.children.push(spec_with_effect("c", &log, "C"));
        root.reconcile(spec, &[], &mut failures).unwrap();

        assert_eq!(*log.borrow(), vec!["C", "P"]);
    }

    #[test]
    fn test_unmount_child_cleanup_before_parent() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("p");
        let mut failures = Vec::new();

        let mut spec = spec_with_effect("p", &log, "P");
        spec.children.push(spec_with_effect("c", &log, "C"));
        root.reconcile(spec, &[], &mut failures).unwrap();

        log.borrow_mut().clear();
        root.teardown_tree().unwrap();
        assert_eq!(*log.borrow(), vec!["C-cleanup", "P-cleanup"]);
        assert_eq!(root.phase(), ScopePhase::Unmounted);
    }

    #[test]
    fn test_double_teardown_is_an_invariant_error() {
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();
        root.reconcile(ScopeSpec::new("app"), &[], &mut failures)
            .unwrap();

        root.teardown_tree().unwrap();
        assert!(matches!(
            root.teardown_tree(),
            Err(SchedulerError::DoubleTeardown(_))
        ));
    }

    #[test]
    fn test_unmounted_scope_cannot_be_revived() {
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();
        root.reconcile(ScopeSpec::new("app"), &[], &mut failures)
            .unwrap();
        root.teardown_tree().unwrap();

        assert!(matches!(
            root.reconcile(ScopeSpec::new("app"), &[], &mut failures),
            Err(SchedulerError::RevivedScope(_))
        ));
    }

    #[test]
    fn test_sweep_removes_missing_keys_deepest_first() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut inner = spec_with_effect("inner", &log, "I");
        inner.children.push(spec_with_effect("leaf", &log, "L"));
        let mut spec = spec_with_effect("app", &log, "A");
        spec.children.push(inner);
        root.reconcile(spec, &[], &mut failures).unwrap();
        assert_eq!(*log.borrow(), vec!["L", "I", "A"]);

        // Next pass drops `inner` and its subtree
        log.borrow_mut().clear();
        let next = spec_with_effect("app", &log, "A");
        root.sweep(&next);
        assert_eq!(*log.borrow(), vec!["L-cleanup", "I-cleanup"]);
        assert!(root.child("inner").is_none());
    }

    #[test]
    fn test_reintroduced_key_gets_a_fresh_node() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut spec = ScopeSpec::new("app");
        spec.children.push(spec_with_effect("modal", &log, "M"));
        root.reconcile(spec, &[], &mut failures).unwrap();

        // Remove it
        let without = ScopeSpec::new("app");
        root.sweep(&without);
        root.reconcile(without, &[], &mut failures).unwrap();

        // Reintroduce the same key: the effect mounts again (fresh slots)
        let mut again = ScopeSpec::new("app");
        again.children.push(spec_with_effect("modal", &log, "M"));
        root.sweep(&again);
        root.reconcile(again, &[], &mut failures).unwrap();

        assert_eq!(*log.borrow(), vec!["M", "M-cleanup", "M"]);
        assert!(root.child("modal").unwrap().is_mounted());
    }

    #[test]
    fn test_duplicate_child_key_is_flagged_and_skipped() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        diagnostics::set_diagnostics_hook(move |v| seen_clone.borrow_mut().push(v.clone()));

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut spec = ScopeSpec::new("app");
        spec.children.push(spec_with_effect("item", &log, "first"));
        spec.children.push(spec_with_effect("item", &log, "second"));
        root.reconcile(spec, &[], &mut failures).unwrap();

        // Only the first occurrence mounted
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(
            *seen.borrow(),
            vec![UsageViolation::DuplicateChildKey {
                scope: "/app".into(),
                key: "item".into(),
            }]
        );

        diagnostics::reset_diagnostics_hook();
    }

    #[test]
    fn test_unstable_effect_count_shrink_releases_surplus() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        diagnostics::set_diagnostics_hook(move |v| seen_clone.borrow_mut().push(v.clone()));

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut spec = ScopeSpec::new("app");
        spec.effects.push(logging_effect(Some(vec![]), log.clone(), "a"));
        spec.effects.push(logging_effect(Some(vec![]), log.clone(), "b"));
        root.reconcile(spec, &[], &mut failures).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        // Conditional registration dropped the second effect
        let mut shrunk = ScopeSpec::new("app");
        shrunk.effects.push(logging_effect(Some(vec![]), log.clone(), "a"));
        root.reconcile(shrunk, &[], &mut failures).unwrap();

        assert_eq!(root.effect_count(), 1);
        // The surplus slot's cleanup ran instead of leaking
        assert_eq!(*log.borrow(), vec!["a", "b", "b-cleanup"]);
        assert_eq!(
            *seen.borrow(),
            vec![UsageViolation::UnstableEffectCount {
                scope: "/app".into(),
                mounted: 2,
                declared: 1,
            }]
        );

        diagnostics::reset_diagnostics_hook();
    }

    #[test]
    fn test_failing_child_aborts_parent_but_not_uncle() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        // app
        // ├── left            (effect "L", skipped: its child failed)
        // │   └── bad         (fails)
        // └── right           (effect "R", unaffected sibling branch)
        let mut bad = ScopeSpec::new("bad");
        bad.effects
            .push(EffectDescriptor::new(None, |_| Err("boom".into())));

        let mut left = spec_with_effect("left", &log, "L");
        left.children.push(bad);

        let mut spec = spec_with_effect("app", &log, "A");
        spec.children.push(left);
        spec.children.push(spec_with_effect("right", &log, "R"));

        root.reconcile(spec, &[], &mut failures).unwrap();

        // `left` (the failing scope's parent) never ran its effect; the
        // failure was contained there, so `right` and `app` proceeded.
        assert_eq!(*log.borrow(), vec!["R", "A"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].scope, "/app/left/bad");
        assert_eq!(failures[0].slot, 0);
    }

    #[test]
    fn test_failing_slot_aborts_remaining_slots_in_scope() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut spec = ScopeSpec::new("app");
        spec.effects.push(logging_effect(None, log.clone(), "first"));
        spec.effects
            .push(EffectDescriptor::new(None, |_| Err("boom".into())));
        spec.effects.push(logging_effect(None, log.clone(), "never"));

        root.reconcile(spec, &[], &mut failures).unwrap();

        // Slot 0 already committed and ran; slot 2 was never processed
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].slot, 1);
    }

    #[test]
    fn test_aborted_first_pass_mounts_cleanly_on_the_next() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        diagnostics::set_diagnostics_hook(move |v| seen_clone.borrow_mut().push(v.clone()));

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        // Compliant caller: same one parent effect and one child effect
        // every pass; only the child's run fails on the first pass.
        let pass = |fail: bool, log: &Log| {
            let mut child = ScopeSpec::new("child");
            if fail {
                child
                    .effects
                    .push(EffectDescriptor::new(Some(vec![]), |_| Err("boom".into())));
            } else {
                child.effects.push(logging_effect(Some(vec![]), log.clone(), "C"));
            }
            let mut spec = spec_with_effect("app", log, "A");
            spec.children.push(child);
            spec
        };

        root.reconcile(pass(true, &log), &[], &mut failures).unwrap();
        assert_eq!(failures.len(), 1);
        // The parent never reached its effect phase, so it is not mounted
        assert_eq!(root.phase(), ScopePhase::Fresh);
        assert!(log.borrow().is_empty());

        // Child recovered: everything mounts, and the diagnostics channel
        // stays quiet - the caller broke no rule
        root.reconcile(pass(false, &log), &[], &mut failures).unwrap();
        assert_eq!(*log.borrow(), vec!["C", "A"]);
        assert!(root.is_mounted());
        assert_eq!(failures.len(), 1);
        assert!(seen.borrow().is_empty(), "spurious violations: {:?}", seen.borrow());

        diagnostics::reset_diagnostics_hook();
    }

    #[test]
    fn test_context_threads_down_the_owner_chain() {
        let value: Log = Rc::new(RefCell::new(Vec::new()));
        let value_clone = value.clone();
        let mut root = ScopeNode::root("app");
        let mut failures = Vec::new();

        let mut child = ScopeSpec::new("child");
        child
            .effects
            .push(EffectDescriptor::once(move |ctx| {
                let theme = ctx.context("theme");
                value_clone
                    .borrow_mut()
                    .push(format!("{theme:?} at {}", ctx.scope_path()));
                None
            }));

        let mut spec = ScopeSpec::new("app");
        spec.context
            .push(ScopeNode::context_entry("theme", "dark"));
        spec.children.push(child);
        root.reconcile(spec, &[], &mut failures).unwrap();

        assert_eq!(
            *value.borrow(),
            vec![format!(
                "{:?} at /app/child",
                Some(DepValue::from("dark"))
            )]
        );
        assert_eq!(root.context_value("theme"), Some(DepValue::from("dark")));
    }
}
