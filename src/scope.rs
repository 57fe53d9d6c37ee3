use std::cell::RefCell;
use std::rc::Rc;

/// Anything holding a releasable capability. `dispose` must tolerate repeated calls.
pub trait Disposable {
    fn dispose(&mut self);
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

impl<T: Disposable + ?Sized> Disposable for Rc<RefCell<T>> {
    fn dispose(&mut self) {
        self.borrow_mut().dispose();
    }
}

/// Wraps a one-shot cleanup closure.
pub struct Disposer(Option<Box<dyn FnOnce()>>);

impl Disposer {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn is_disposed(&self) -> bool {
        self.0.is_none()
    }
}

impl Disposable for Disposer {
    fn dispose(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    Releasing,
    Released,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeStats {
    pub registered: usize,
    pub released: usize,
}

struct ScopeInner {
    label: String,
    state: ScopeState,
    entries: Vec<Box<dyn Disposable>>,
    stats: ScopeStats,
}

/// Ordered registry of owned resources, released exactly once in reverse registration order.
///
/// Anything registered once the scope has started releasing is disposed on the spot, so a
/// late registration can never outlive its owner.
#[derive(Clone)]
pub struct ResourceScope {
    inner: Rc<RefCell<ScopeInner>>,
}

impl ResourceScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ScopeInner {
                label: label.into(),
                state: ScopeState::Open,
                entries: Vec::new(),
                stats: ScopeStats::default(),
            })),
        }
    }

    pub fn label(&self) -> String {
        self.inner.borrow().label.clone()
    }

    pub fn state(&self) -> ScopeState {
        self.inner.borrow().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ScopeState::Open
    }

    /// Resources still waiting for release.
    pub fn pending(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn stats(&self) -> ScopeStats {
        self.inner.borrow().stats
    }

    pub fn register<D: Disposable + 'static>(&self, resource: D) {
        let mut resource: Box<dyn Disposable> = Box::new(resource);
        {
            let mut inner = self.inner.borrow_mut();
            inner.stats.registered += 1;
            if inner.state == ScopeState::Open {
                inner.entries.push(resource);
                return;
            }
            tracing::debug!(scope = %inner.label, "late registration released immediately");
        }
        resource.dispose();
        self.inner.borrow_mut().stats.released += 1;
    }

    pub fn ensure(&self, cleanup: impl FnOnce() + 'static) {
        self.register(Disposer::new(cleanup));
    }

    /// Releases every entry, newest first. Returns how many were released by this call.
    pub fn release(&self) -> usize {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ScopeState::Open {
                return 0;
            }
            inner.state = ScopeState::Releasing;
        }
        let mut count = 0;
        loop {
            // pop one at a time so disposers may touch the scope
            let next = self.inner.borrow_mut().entries.pop();
            let Some(mut resource) = next else { break };
            resource.dispose();
            count += 1;
            self.inner.borrow_mut().stats.released += 1;
        }
        let mut inner = self.inner.borrow_mut();
        inner.state = ScopeState::Released;
        tracing::trace!(scope = %inner.label, released = count, "scope released");
        count
    }
}

impl Disposable for ResourceScope {
    fn dispose(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn disposer_runs_once() {
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let mut disposer = Disposer::new(move || *counter.borrow_mut() += 1);
        disposer.dispose();
        disposer.dispose();
        assert_eq!(*hits.borrow(), 1);
        assert!(disposer.is_disposed());
    }

    #[test]
    fn registration_during_release_is_released_immediately() {
        let scope = ResourceScope::new("nested");
        let log = Rc::new(RefCell::new(Vec::new()));
        let (inner_scope, inner_log) = (scope.clone(), log.clone());
        scope.ensure(move || {
            inner_log.borrow_mut().push("outer");
            let late_log = inner_log.clone();
            inner_scope.ensure(move || late_log.borrow_mut().push("late"));
        });
        assert_eq!(scope.release(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "late"]);
        assert_eq!(scope.stats(), ScopeStats { registered: 2, released: 2 });
        assert_eq!(scope.release(), 0);
    }
}
