//! Deferred release of acquired resources in reverse acquisition order
//!
//! Every successfully acquired resource registers exactly one release
//! action, immediately after its creation and never before. Teardown drains
//! the registry once, last registered first. Actions own the handles they
//! destroy: clones and copies are moved in at registration time, so a later
//! reassignment of the live context (a swapchain rebuild, for example)
//! cannot change what an already-registered action releases.
//!
//! The registry is single-threaded: registration and flush both happen on
//! the thread that owns the renderer.

/// A deferred, zero-argument release operation.
///
/// Must capture the handles it destroys by value; an action runs exactly
/// once, during [`DeletionRegistry::flush`].
pub type ReleaseAction = Box<dyn FnOnce()>;

/// Ordered undo-log of acquired resources.
///
/// Append-only while the acquisition chain runs, drained exactly once in
/// last-in-first-out order during teardown.
#[derive(Default)]
pub struct DeletionRegistry {
    actions: Vec<ReleaseAction>,
}

impl DeletionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release action for a resource that was just acquired.
    pub fn register(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Run every registered action in reverse registration order, each
    /// exactly once, leaving the registry empty.
    ///
    /// Safe to call at any point of a partially completed acquisition chain
    /// (the registry is simply shorter) and a no-op when already empty.
    pub fn flush(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }

    /// Number of registered, not yet flushed actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are pending.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn flush_runs_actions_in_reverse_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DeletionRegistry::new();
        for id in 0..5 {
            let order = Rc::clone(&order);
            registry.register(move || order.borrow_mut().push(id));
        }

        registry.flush();

        assert_eq!(*order.borrow(), vec![4, 3, 2, 1, 0]);
        assert!(registry.is_empty());
    }

    #[test]
    fn each_action_runs_exactly_once() {
        let count = Rc::new(RefCell::new(0));
        let mut registry = DeletionRegistry::new();
        for _ in 0..3 {
            let count = Rc::clone(&count);
            registry.register(move || *count.borrow_mut() += 1);
        }

        registry.flush();
        registry.flush(); // second flush sees an empty registry

        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn flush_on_empty_registry_is_a_no_op() {
        let mut registry = DeletionRegistry::new();
        registry.flush();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn failed_chain_releases_exactly_the_acquired_resources() {
        // Simulates a chain of 5 acquisitions that fails at step 4: three
        // resources were acquired and registered, the fourth never was.
        let live = Rc::new(RefCell::new(0));
        let mut registry = DeletionRegistry::new();

        let mut acquire = |registry: &mut DeletionRegistry| {
            *live.borrow_mut() += 1;
            let live = Rc::clone(&live);
            registry.register(move || *live.borrow_mut() -= 1);
        };

        acquire(&mut registry);
        acquire(&mut registry);
        acquire(&mut registry);
        // Step 4 fails: nothing acquired, nothing registered.
        assert_eq!(registry.len(), 3);

        registry.flush();

        // No leak, no double release.
        assert_eq!(*live.borrow(), 0);
        assert!(registry.is_empty());
    }
}
