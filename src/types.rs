//! Core types for spark-effects.
//!
//! These types define the foundation that everything builds on.
//! They flow from the host's render step into the scheduler and define
//! what an effect slot understands.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Cleanup
// =============================================================================

/// Cleanup function returned by an effect run.
///
/// Invoked at most once: before the next run of the same slot, or at
/// scope teardown if the effect is still active.
pub type Cleanup = Box<dyn FnOnce()>;

/// Error produced by a failing effect run.
pub type EffectError = Box<dyn Error>;

/// Result of one effect run: an optional cleanup, or the run's error.
pub type EffectResult = Result<Option<Cleanup>, EffectError>;

/// Boxed effect body. Receives the per-run [`EffectCtx`].
pub type EffectFn = Box<dyn FnMut(&EffectCtx<'_>) -> EffectResult>;

// =============================================================================
// Dependency Values
// =============================================================================

/// A dependency value with identity-comparison semantics.
///
/// Comparison follows the `Object.is` contract rather than structural
/// equality:
/// - `Float` compares by bit pattern, so `NaN == NaN` and `+0.0 != -0.0`
/// - `Ref` compares by allocation identity - a freshly allocated value
///   always "changes", no matter what it contains
/// - `Str`, `Int`, `Bool` compare by value
///
/// Deep/structural equality is deliberately NOT performed.
#[derive(Clone)]
pub enum DepValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Ref(Rc<dyn Any>),
}

impl DepValue {
    /// Wrap a shared allocation as an identity-compared dependency.
    ///
    /// Two `Ref` values are equal only when they point to the same
    /// allocation (`Rc::ptr_eq`).
    pub fn reference<T: 'static>(value: Rc<T>) -> Self {
        Self::Ref(value as Rc<dyn Any>)
    }
}

impl PartialEq for DepValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Bit comparison: NaN equals NaN, +0.0 differs from -0.0.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for DepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "Unit"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Str(v) => write!(f, "Str({v:?})"),
            Self::Ref(v) => write!(f, "Ref({:p})", Rc::as_ptr(v)),
        }
    }
}

impl From<()> for DepValue {
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for DepValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for DepValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for DepValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for DepValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for DepValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for DepValue {
    fn from(v: &str) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<String> for DepValue {
    fn from(v: String) -> Self {
        Self::Str(Rc::from(v.as_str()))
    }
}

impl From<Rc<str>> for DepValue {
    fn from(v: Rc<str>) -> Self {
        Self::Str(v)
    }
}

// =============================================================================
// Effect Context
// =============================================================================

/// A context entry provided by a scope for its descendants.
pub type ContextEntry = (Rc<str>, DepValue);

/// Per-run view handed to an effect body.
///
/// Gives the effect its scope's path (for logging) and explicit lookup
/// of context values up the owner chain - no ambient globals.
pub struct EffectCtx<'a> {
    scope_path: &'a str,
    chain: &'a [ContextEntry],
}

impl<'a> EffectCtx<'a> {
    pub(crate) fn new(scope_path: &'a str, chain: &'a [ContextEntry]) -> Self {
        Self { scope_path, chain }
    }

    /// Path of the scope this effect belongs to, e.g. `/app/list/item-2`.
    pub fn scope_path(&self) -> &str {
        self.scope_path
    }

    /// Look up a context value by name.
    ///
    /// Searches the owner chain from the nearest scope outward, so an
    /// inner provider shadows an outer one with the same name.
    pub fn context(&self, name: &str) -> Option<DepValue> {
        self.chain
            .iter()
            .rev()
            .find(|(entry, _)| entry.as_ref() == name)
            .map(|(_, value)| value.clone())
    }
}

// =============================================================================
// Effect Descriptor
// =============================================================================

/// One declared effect for one pass: a body plus its dependency list.
///
/// `deps` semantics:
/// - `None` - no dependency list, run every pass
/// - `Some(vec![])` - empty list, run once at mount only
/// - `Some(values)` - run when any value changes (identity comparison)
pub struct EffectDescriptor {
    pub deps: Option<Vec<DepValue>>,
    run: EffectFn,
}

impl EffectDescriptor {
    /// Create a fallible effect with explicit dependency semantics.
    pub fn new(
        deps: Option<Vec<DepValue>>,
        run: impl FnMut(&EffectCtx<'_>) -> EffectResult + 'static,
    ) -> Self {
        Self {
            deps,
            run: Box::new(run),
        }
    }

    /// Effect with no dependency list - runs every pass.
    pub fn every_pass(mut run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static) -> Self {
        Self::new(None, move |ctx| Ok(run(ctx)))
    }

    /// Effect with an empty dependency list - runs once, at mount.
    pub fn once(mut run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static) -> Self {
        Self::new(Some(Vec::new()), move |ctx| Ok(run(ctx)))
    }

    /// Effect gated on a dependency list - reruns when a value changes.
    pub fn on_deps(
        deps: Vec<DepValue>,
        mut run: impl FnMut(&EffectCtx<'_>) -> Option<Cleanup> + 'static,
    ) -> Self {
        Self::new(Some(deps), move |ctx| Ok(run(ctx)))
    }

    /// Run the effect body.
    pub(crate) fn invoke(&mut self, ctx: &EffectCtx<'_>) -> EffectResult {
        (self.run)(ctx)
    }
}

impl fmt::Debug for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDescriptor")
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Scope Spec
// =============================================================================

/// One scope's output of the (external) render step for one pass.
///
/// A keyed node in the descriptor tree: its effects in declaration order,
/// context values it provides to descendants, and its child scopes.
/// Keys are explicit stable identities - matching is by key, not position.
#[derive(Debug)]
pub struct ScopeSpec {
    pub key: String,
    pub effects: Vec<EffectDescriptor>,
    pub context: Vec<ContextEntry>,
    pub children: Vec<ScopeSpec>,
}

impl ScopeSpec {
    /// Create an empty spec with the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            effects: Vec::new(),
            context: Vec::new(),
            children: Vec::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
