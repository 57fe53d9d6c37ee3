use crate::geometry::EdgeId;
use crate::gizmo::GizmoId;
use crate::scope::Disposer;
use glam::Vec3;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Overlay drawn by the helper pass.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperObject {
    Gizmo { id: GizmoId, position: Vec3, value: f32 },
    EdgeOutline { edges: Vec<EdgeId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HelperKey(u64);

/// Registry of helper overlays. Each entry lives until its disposer runs.
#[derive(Clone, Default)]
pub struct Helpers {
    objects: Rc<RefCell<BTreeMap<HelperKey, HelperObject>>>,
    next: Rc<Cell<u64>>,
}

impl Helpers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, object: HelperObject) -> (HelperKey, Disposer) {
        let key = HelperKey(self.next.get() + 1);
        self.next.set(key.0);
        self.objects.borrow_mut().insert(key, object);
        let objects = Rc::clone(&self.objects);
        (key, Disposer::new(move || {
            objects.borrow_mut().remove(&key);
        }))
    }

    pub fn update(&self, key: HelperKey, object: HelperObject) -> bool {
        match self.objects.borrow_mut().get_mut(&key) {
            Some(slot) => {
                *slot = object;
                true
            }
            None => false,
        }
    }

    pub fn objects(&self) -> Vec<HelperObject> {
        self.objects.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }
}
