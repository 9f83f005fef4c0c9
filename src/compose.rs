//! Hooks-style front-end for building scope specs.
//!
//! [`ScopeBuilder`] accumulates effects in declaration order - the order
//! of `use_effect` calls IS the slot order, so the usual rule applies:
//! register effects unconditionally, never inside a branch. The builder
//! is purely a descriptor producer; the scheduler cannot tell specs built
//! here apart from hand-assembled ones or from the
//! [lifecycle](crate::lifecycle) front-end.
//!
//! # Example
//!
//! ```ignore
//! use spark_effects::{ScopeBuilder, DepValue};
//!
//! let spec = ScopeBuilder::new("app")
//!     .provide("theme", "dark")
//!     .use_effect_once(|_| {
//!         println!("mounted");
//!         Some(Box::new(|| println!("unmounted")))
//!     })
//!     .use_effect(vec![DepValue::from(count)], move |_| {
//!         println!("count changed to {count}");
//!         None
//!     })
//!     .child(ScopeBuilder::new("sidebar").build())
//!     .build();
//! ```

use std::rc::Rc;

use crate::types::{
    Cleanup, DepValue, EffectCtx, EffectDescriptor, EffectResult, ScopeSpec,
};

/// Builder producing a [`ScopeSpec`] from declaration-order calls.
pub struct ScopeBuilder {
    spec: ScopeSpec,
}

impl ScopeBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            spec: ScopeSpec::new(key),
        }
    }

    /// Effect gated on a dependency list.
    pub fn use_effect(
        mut self,
        deps: Vec<DepValue>,
        run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static,
    ) -> Self {
        self.spec.effects.push(EffectDescriptor::on_deps(deps, run));
        self
    }

    /// Effect that runs once, at mount (empty dependency list).
    pub fn use_effect_once(
        mut self,
        run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static,
    ) -> Self {
        self.spec.effects.push(EffectDescriptor::once(run));
        self
    }

    /// Effect with no dependency list - runs every pass.
    pub fn use_effect_always(
        mut self,
        run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static,
    ) -> Self {
        self.spec.effects.push(EffectDescriptor::every_pass(run));
        self
    }

    /// Fallible effect with explicit dependency semantics.
    pub fn try_use_effect(
        mut self,
        deps: Option<Vec<DepValue>>,
        run: impl FnMut(&EffectCtx<'_>) -> EffectResult + 'static,
    ) -> Self {
        self.spec.effects.push(EffectDescriptor::new(deps, run));
        self
    }

    /// Provide a context value for descendant scopes.
    pub fn provide(mut self, name: impl Into<Rc<str>>, value: impl Into<DepValue>) -> Self {
        self.spec.context.push((name.into(), value.into()));
        self
    }

    /// Append a child scope.
    pub fn child(mut self, child: ScopeSpec) -> Self {
        self.spec.children.push(child);
        self
    }

    pub fn build(self) -> ScopeSpec {
        self.spec
    }
}

// =============================================================================
// Tests
// =============================================================================
