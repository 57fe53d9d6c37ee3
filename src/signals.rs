use crate::command::CommandState;
use crate::geometry::{ItemRef, SolidId};
use crate::scope::Disposable;
use crate::selection::Selection;
use crate::viewport::ViewportId;
use glam::{Mat4, UVec2};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type Callback<T> = Rc<dyn Fn(&T)>;

struct Subscriber<T> {
    id: SubscriberId,
    callback: Callback<T>,
    once: bool,
    spent: Cell<bool>,
    removed: Cell<bool>,
}

struct SignalInner<T> {
    name: &'static str,
    subscribers: RefCell<Vec<Rc<Subscriber<T>>>>,
    next_id: Cell<u64>,
    depth: Cell<u32>,
}

impl<T> SignalInner<T> {
    fn compact(&self) {
        self.subscribers.borrow_mut().retain(|sub| !sub.removed.get() && !sub.spent.get());
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut found = false;
        for sub in self.subscribers.borrow().iter().filter(|sub| sub.id == id) {
            found |= !sub.removed.replace(true);
        }
        if self.depth.get() == 0 {
            self.compact();
        }
        found
    }
}

/// Named synchronous event channel.
///
/// `dispatch` walks a snapshot of the subscriber list taken when it starts. Subscribers added
/// or removed mid-dispatch only affect later dispatches; the list itself is compacted once
/// the outermost dispatch returns. A subscriber that re-dispatches the same signal gets a
/// fresh snapshot for the nested call.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("name", &self.inner.name).field("subscribers", &self.len()).finish()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                name,
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                depth: Cell::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Live subscribers, ignoring ones already removed or spent.
    pub fn len(&self) -> usize {
        self.inner.subscribers.borrow().iter().filter(|sub| !sub.removed.get() && !sub.spent.get()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, callback: impl Fn(&T) + 'static) -> Subscription<T> {
        self.push(Rc::new(callback), false)
    }

    pub fn add_once(&self, callback: impl Fn(&T) + 'static) -> Subscription<T> {
        self.push(Rc::new(callback), true)
    }

    /// Registers a shared callback; the same `Rc` may be registered more than once.
    pub fn add_rc(&self, callback: Callback<T>) -> Subscription<T> {
        self.push(callback, false)
    }

    fn push(&self, callback: Callback<T>, once: bool) -> Subscription<T> {
        let id = SubscriberId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.subscribers.borrow_mut().push(Rc::new(Subscriber {
            id,
            callback,
            once,
            spent: Cell::new(false),
            removed: Cell::new(false),
        }));
        Subscription { signal: Rc::downgrade(&self.inner), id }
    }

    pub fn remove(&self, id: SubscriberId) -> bool {
        self.inner.remove(id)
    }

    pub fn dispatch(&self, payload: &T) {
        let snapshot: SmallVec<[Rc<Subscriber<T>>; 8]> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|sub| !sub.removed.get() && !sub.spent.get())
            .cloned()
            .collect();
        if snapshot.is_empty() {
            return;
        }
        tracing::trace!(signal = self.inner.name, subscribers = snapshot.len(), "dispatch");
        self.inner.depth.set(self.inner.depth.get() + 1);
        for sub in snapshot {
            if sub.once && sub.spent.replace(true) {
                continue;
            }
            (sub.callback)(payload);
        }
        let depth = self.inner.depth.get() - 1;
        self.inner.depth.set(depth);
        if depth == 0 {
            self.inner.compact();
        }
    }
}

/// Handle returned by `add`; disposing it removes the subscriber.
pub struct Subscription<T> {
    signal: Weak<SignalInner<T>>,
    id: SubscriberId,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self { signal: Weak::clone(&self.signal), id: self.id }
    }
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl<T> Disposable for Subscription<T> {
    fn dispose(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.remove(self.id);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChanged {
    pub source: &'static str,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnded {
    pub id: Uuid,
    pub name: String,
    pub state: CommandState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPrepared {
    pub viewport: ViewportId,
    pub view_projection: Mat4,
    pub resolution: UVec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// The editor's fixed signal catalog.
#[derive(Clone)]
pub struct EditorSignals {
    pub selection_changed: Signal<SelectionChanged>,
    pub history_changed: Signal<()>,
    pub object_hovered: Signal<ItemRef>,
    pub object_unhovered: Signal<ItemRef>,
    pub scene_graph_changed: Signal<()>,
    pub factory_updated: Signal<()>,
    pub factory_cancelled: Signal<()>,
    pub point_picker_changed: Signal<()>,
    pub gizmo_changed: Signal<()>,
    pub object_added: Signal<SolidId>,
    pub command_ended: Signal<CommandEnded>,
    pub module_reloaded: Signal<()>,
    pub render_prepared: Signal<RenderPrepared>,
    pub viewport_activated: Signal<ViewportId>,
    pub window_loaded: Signal<()>,
    pub window_resized: Signal<WindowSize>,
}

impl Default for EditorSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSignals {
    pub fn new() -> Self {
        Self {
            selection_changed: Signal::new("selectionChanged"),
            history_changed: Signal::new("historyChanged"),
            object_hovered: Signal::new("objectHovered"),
            object_unhovered: Signal::new("objectUnhovered"),
            scene_graph_changed: Signal::new("sceneGraphChanged"),
            factory_updated: Signal::new("factoryUpdated"),
            factory_cancelled: Signal::new("factoryCancelled"),
            point_picker_changed: Signal::new("pointPickerChanged"),
            gizmo_changed: Signal::new("gizmoChanged"),
            object_added: Signal::new("objectAdded"),
            command_ended: Signal::new("commandEnded"),
            module_reloaded: Signal::new("moduleReloaded"),
            render_prepared: Signal::new("renderPrepared"),
            viewport_activated: Signal::new("viewportActivated"),
            window_loaded: Signal::new("windowLoaded"),
            window_resized: Signal::new("windowResized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_subscribers_are_compacted_after_dispatch() {
        let signal = Signal::<u8>::new("test");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let sub = signal.add(move |_| counter.set(counter.get() + 1));
        signal.dispatch(&1);
        signal.remove(sub.id());
        signal.dispatch(&2);
        assert_eq!(hits.get(), 1);
        assert!(signal.is_empty());
        assert_eq!(signal.inner.subscribers.borrow().len(), 0);
    }
}
