use crate::gizmo::GizmoId;
use crate::raycast::Ray;
use crate::scope::Disposer;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove { ray: Ray },
    PointerDown { ray: Ray },
    KeyDown { key: String },
    KeyUp { key: String },
    GizmoDrag { gizmo: GizmoId, delta: f32 },
    GizmoRelease { gizmo: GizmoId },
    DialogEdit { field: String, value: f32 },
    DialogSubmit,
    DialogCancel,
    Confirm,
    Abort,
}

impl InputEvent {
    pub fn key_down(key: &str) -> Self {
        InputEvent::KeyDown { key: key.to_string() }
    }

    pub fn key_up(key: &str) -> Self {
        InputEvent::KeyUp { key: key.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Consumed,
    Continue,
}

type Handler = Rc<dyn Fn(&InputEvent) -> Propagation>;

struct Listener {
    label: &'static str,
    alive: Rc<Cell<bool>>,
    handler: Handler,
}

/// Routes input to the interactions currently listening, newest first.
///
/// Pickers and gizmos register while they are active and drop out when their disposer runs.
#[derive(Clone, Default)]
pub struct InputRouter {
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, label: &'static str, handler: impl Fn(&InputEvent) -> Propagation + 'static) -> Disposer {
        let alive = Rc::new(Cell::new(true));
        self.listeners.borrow_mut().push(Listener { label, alive: Rc::clone(&alive), handler: Rc::new(handler) });
        let listeners = Rc::clone(&self.listeners);
        Disposer::new(move || {
            alive.set(false);
            if let Ok(mut listeners) = listeners.try_borrow_mut() {
                listeners.retain(|listener| listener.alive.get());
            }
        })
    }

    pub fn dispatch(&self, event: &InputEvent) -> Propagation {
        let snapshot: Vec<(Rc<Cell<bool>>, Handler)> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|listener| listener.alive.get());
            listeners.iter().rev().map(|l| (Rc::clone(&l.alive), Rc::clone(&l.handler))).collect()
        };
        for (alive, handler) in snapshot {
            if !alive.get() {
                continue;
            }
            if handler(event) == Propagation::Consumed {
                return Propagation::Consumed;
            }
        }
        Propagation::Continue
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().iter().filter(|listener| listener.alive.get()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.listeners.borrow().iter().filter(|l| l.alive.get()).map(|l| l.label).collect()
    }
}

type KeymapCommand = Rc<dyn Fn()>;

/// Named commands (`viewport:top`, ...) that keybindings and menus invoke.
#[derive(Clone, Default)]
pub struct KeymapRegistry {
    commands: Rc<RefCell<BTreeMap<String, Vec<(u64, KeymapCommand)>>>>,
    next: Rc<Cell<u64>>,
}

impl KeymapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, command: impl Fn() + 'static) -> Disposer {
        let token = self.next.get() + 1;
        self.next.set(token);
        self.commands.borrow_mut().entry(name.to_string()).or_default().push((token, Rc::new(command)));
        let commands = Rc::clone(&self.commands);
        let name = name.to_string();
        Disposer::new(move || {
            let mut commands = commands.borrow_mut();
            if let Some(entries) = commands.get_mut(&name) {
                entries.retain(|(t, _)| *t != token);
                if entries.is_empty() {
                    commands.remove(&name);
                }
            }
        })
    }

    /// Runs every handler bound to `name`; false when none is.
    pub fn invoke(&self, name: &str) -> bool {
        let handlers: Vec<KeymapCommand> = self
            .commands
            .borrow()
            .get(name)
            .map(|entries| entries.iter().map(|(_, c)| Rc::clone(c)).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler();
        }
        !handlers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Disposable;

    #[test]
    fn newest_listener_sees_events_first() {
        let router = InputRouter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = log.clone();
        let _a = router.listen("a", move |_| {
            first.borrow_mut().push("a");
            Propagation::Continue
        });
        let second = log.clone();
        let mut b = router.listen("b", move |_| {
            second.borrow_mut().push("b");
            Propagation::Consumed
        });
        assert_eq!(router.dispatch(&InputEvent::Confirm), Propagation::Consumed);
        b.dispose();
        assert_eq!(router.dispatch(&InputEvent::Confirm), Propagation::Continue);
        assert_eq!(*log.borrow(), vec!["b", "a"]);
        assert_eq!(router.labels(), vec!["a"]);
    }
}
