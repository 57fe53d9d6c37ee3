use crate::error::Fault;
use crate::scope::ResourceScope;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub type Outcome<T> = Result<T, Fault>;

type SettleCallback<T> = Box<dyn FnOnce(&Outcome<T>)>;

struct CompletionInner<T> {
    outcome: Option<Outcome<T>>,
    callbacks: Vec<SettleCallback<T>>,
    wakers: Vec<Waker>,
}

/// Settle-once completion. Callbacks run synchronously, in registration order, when it settles.
pub struct Completion<T> {
    inner: Rc<RefCell<CompletionInner<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: Clone + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Completion<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionInner {
                outcome: None,
                callbacks: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    pub fn settled(outcome: Outcome<T>) -> Self {
        let completion = Self::new();
        completion.settle(outcome);
        completion
    }

    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.inner.borrow().outcome.clone()
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, fault: Fault) -> bool {
        self.settle(Err(fault))
    }

    /// Returns false when already settled; the first outcome always wins.
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        let (callbacks, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return false;
            }
            inner.outcome = Some(outcome.clone());
            (std::mem::take(&mut inner.callbacks), std::mem::take(&mut inner.wakers))
        };
        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /// Runs immediately when already settled.
    pub fn on_settled(&self, callback: impl FnOnce(&Outcome<T>) + 'static) {
        let settled = self.inner.borrow().outcome.clone();
        match settled {
            Some(outcome) => callback(&outcome),
            None => self.inner.borrow_mut().callbacks.push(Box::new(callback)),
        }
    }

    pub fn then(&self, on_ok: impl FnOnce(T) + 'static, on_err: impl FnOnce(Fault) + 'static) {
        self.on_settled(move |outcome| match outcome {
            Ok(value) => on_ok(value.clone()),
            Err(fault) => on_err(fault.clone()),
        });
    }
}

impl<T: Clone + 'static> Future for Completion<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match &inner.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Control surface a running sub-interaction exposes to its owner.
pub trait TaskControl {
    fn cancel(&self);
    /// Ends the interaction successfully with whatever it has accumulated so far.
    fn finish(&self);
}

struct SettledControl;

impl TaskControl for SettledControl {
    fn cancel(&self) {}
    fn finish(&self) {}
}

/// A completion plus its own resource scope. Settling releases the scope first.
pub struct TaskCore<T> {
    completion: Completion<T>,
    scope: ResourceScope,
}

impl<T: Clone + 'static> TaskCore<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self { completion: Completion::new(), scope: ResourceScope::new(label) }
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    pub fn completion(&self) -> Completion<T> {
        self.completion.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.completion.is_pending()
    }

    pub fn resolve(&self, value: T) -> bool {
        if !self.completion.is_pending() {
            return false;
        }
        self.scope.release();
        self.completion.resolve(value)
    }

    pub fn reject(&self, fault: Fault) -> bool {
        if !self.completion.is_pending() {
            return false;
        }
        self.scope.release();
        self.completion.reject(fault)
    }
}

/// Cancellable handle on a running sub-interaction (picker, gizmo, dialog).
pub struct TaskHandle<T> {
    completion: Completion<T>,
    control: Rc<dyn TaskControl>,
    recovered: Rc<Cell<bool>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            completion: self.completion.clone(),
            control: Rc::clone(&self.control),
            recovered: Rc::clone(&self.recovered),
        }
    }
}

impl<T: Clone + 'static> TaskHandle<T> {
    pub fn new(completion: Completion<T>, control: Rc<dyn TaskControl>) -> Self {
        Self { completion, control, recovered: Rc::new(Cell::new(false)) }
    }

    pub fn settled(outcome: Outcome<T>) -> Self {
        Self::new(Completion::settled(outcome), Rc::new(SettledControl))
    }

    pub fn completion(&self) -> Completion<T> {
        self.completion.clone()
    }

    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.completion.outcome()
    }

    pub fn is_pending(&self) -> bool {
        self.completion.is_pending()
    }

    pub fn cancel(&self) {
        if self.is_pending() {
            self.control.cancel();
        }
    }

    pub fn finish(&self) {
        if self.is_pending() {
            self.control.finish();
        }
    }

    pub fn then(&self, on_ok: impl FnOnce(T) + 'static, on_err: impl FnOnce(Fault) + 'static) {
        self.completion.then(on_ok, on_err);
    }

    /// Marks failures as handled so they do not propagate to an owning command.
    pub fn catch(self, handler: impl FnOnce(&Fault) + 'static) -> Self {
        self.recovered.set(true);
        self.completion.on_settled(move |outcome| {
            if let Err(fault) = outcome {
                if !fault.is_cancellation() {
                    handler(fault);
                }
            }
        });
        self
    }

    pub(crate) fn is_recovered(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.recovered)
    }

    /// Same control surface, transformed value.
    pub fn map<U: Clone + 'static>(self, f: impl FnOnce(T) -> U + 'static) -> TaskHandle<U> {
        let mapped = Completion::new();
        let target = mapped.clone();
        self.completion.on_settled(move |outcome| {
            target.settle(outcome.clone().map(f));
        });
        TaskHandle { completion: mapped, control: self.control, recovered: self.recovered }
    }
}

impl<T: Clone + 'static> Future for TaskHandle<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_outcome_wins_and_callbacks_run_in_order() {
        let completion = Completion::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let log = log.clone();
            completion.on_settled(move |outcome| log.borrow_mut().push((tag, outcome.clone())));
        }
        assert!(completion.resolve(7));
        assert!(!completion.reject(Fault::Cancelled));
        assert_eq!(*log.borrow(), vec![("a", Ok(7)), ("b", Ok(7))]);
        assert_eq!(pollster::block_on(completion), Ok(7));
    }

    #[test]
    fn map_forwards_rejection() {
        let handle = TaskHandle::<u32>::settled(Err(Fault::validation("empty")));
        let mapped = handle.map(|value| value * 2);
        assert_eq!(mapped.outcome(), Some(Err(Fault::validation("empty"))));
    }
}
