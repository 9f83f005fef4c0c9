//! Class-style lifecycle front-end.
//!
//! The scheduler only understands effect descriptors. This module maps
//! the classic mount/update/unmount surface onto that stream, so both
//! styles drive the same machinery:
//!
//! - `on_mount` → an empty-deps effect; its cleanup calls `on_unmount`
//! - `on_update` → an every-pass effect that skips the mount pass
//!
//! A [`LifecycleHost`] owns the component across passes and produces a
//! fresh [`ScopeSpec`] per pass (descriptors are consumed by each pass,
//! the component itself is shared).
//!
//! # Example
//!
//! ```ignore
//! use spark_effects::{Lifecycle, LifecycleHost, Scheduler, Cleanup};
//!
//! struct Clock;
//!
//! impl Lifecycle for Clock {
//!     fn on_mount(&mut self) -> Option<Cleanup> {
//!         println!("clock started");
//!         Some(Box::new(|| println!("timer handle released")))
//!     }
//!     fn on_update(&mut self) {
//!         println!("clock re-rendered");
//!     }
//!     fn on_unmount(&mut self) {
//!         println!("clock stopped");
//!     }
//! }
//!
//! let host = LifecycleHost::new("clock", Clock);
//! let mut scheduler = Scheduler::new();
//! scheduler.run_pass(host.render())?;   // clock started
//! scheduler.run_pass(host.render())?;   // clock re-rendered
//! scheduler.unmount()?;                 // timer handle released, clock stopped
//! # Ok::<(), spark_effects::SchedulerError>(())
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::types::{Cleanup, EffectDescriptor, ScopeSpec};

/// Mount/update/unmount surface for components written in the
/// class-lifecycle style.
pub trait Lifecycle {
    /// Called once when the scope mounts. The returned cleanup runs at
    /// unmount, before `on_unmount`.
    fn on_mount(&mut self) -> Option<Cleanup> {
        None
    }

    /// Called on every pass after the mount pass.
    fn on_update(&mut self) {}

    /// Called once at unmount, after the mount cleanup.
    fn on_unmount(&mut self) {}
}

/// Owns a [`Lifecycle`] component across passes and renders it into
/// scope specs.
pub struct LifecycleHost<T: Lifecycle> {
    key: String,
    component: Rc<RefCell<T>>,
    // Passes the update effect has observed; zero means "mount pass"
    passes: Rc<Cell<u64>>,
}

impl<T: Lifecycle + 'static> LifecycleHost<T> {
    pub fn new(key: impl Into<String>, component: T) -> Self {
        Self {
            key: key.into(),
            component: Rc::new(RefCell::new(component)),
            passes: Rc::new(Cell::new(0)),
        }
    }

    /// Shared handle to the component, for hosts that mutate its state
    /// between passes.
    pub fn component(&self) -> Rc<RefCell<T>> {
        self.component.clone()
    }

    /// Produce this pass's spec. Call once per pass.
    pub fn render(&self) -> ScopeSpec {
        let mut spec = ScopeSpec::new(self.key.clone());

        // Slot 0: mount effect. Runs once; its cleanup drives unmount.
        let component = self.component.clone();
        let passes = self.passes.clone();
        spec.effects.push(EffectDescriptor::once(move |_| {
            let mount_cleanup = component.borrow_mut().on_mount();
            let component = component.clone();
            let passes = passes.clone();
            Some(Box::new(move || {
                if let Some(cleanup) = mount_cleanup {
                    cleanup();
                }
                component.borrow_mut().on_unmount();
                // A reintroduced key mounts a fresh scope; start over
                passes.set(0);
            }) as Cleanup)
        }));

        // Slot 1: update effect. Every pass, minus the mount pass.
        let component = self.component.clone();
        let passes = self.passes.clone();
        spec.effects.push(EffectDescriptor::every_pass(move |_| {
            let seen = passes.get();
            passes.set(seen + 1);
            if seen > 0 {
                component.borrow_mut().on_update();
            }
            None
        }));

        spec
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Probe {
        log: Log,
    }

    impl Lifecycle for Probe {
        fn on_mount(&mut self) -> Option<Cleanup> {
            self.log.borrow_mut().push("mount");
            let log = self.log.clone();
            Some(Box::new(move || log.borrow_mut().push("mount-cleanup")))
        }

        fn on_update(&mut self) {
            self.log.borrow_mut().push("update");
        }

        fn on_unmount(&mut self) {
            self.log.borrow_mut().push("unmount");
        }
    }

    #[test]
    fn test_mount_update_unmount_sequence() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let host = LifecycleHost::new("probe", Probe { log: log.clone() });
        let mut scheduler = Scheduler::new();

        scheduler.run_pass(host.render()).unwrap();
        assert_eq!(*log.borrow(), vec!["mount"]);

        scheduler.run_pass(host.render()).unwrap();
        scheduler.run_pass(host.render()).unwrap();
        assert_eq!(*log.borrow(), vec!["mount", "update", "update"]);

        scheduler.unmount().unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["mount", "update", "update", "mount-cleanup", "unmount"]
        );
    }

    #[test]
    fn test_remount_starts_a_fresh_lifecycle() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let host = LifecycleHost::new("probe", Probe { log: log.clone() });
        let mut scheduler = Scheduler::new();

        scheduler.run_pass(host.render()).unwrap();
        scheduler.unmount().unwrap();
        log.borrow_mut().clear();

        // Same host, fresh scope: mounts again, no stray update
        scheduler.run_pass(host.render()).unwrap();
        assert_eq!(*log.borrow(), vec!["mount"]);
    }
}
