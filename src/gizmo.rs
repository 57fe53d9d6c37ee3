use crate::editor::Editor;
use crate::error::Fault;
use crate::helpers::{HelperKey, HelperObject};
use crate::input::{InputEvent, Propagation};
use crate::task::{TaskControl, TaskCore, TaskHandle};
use glam::Vec3;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) const DISTANCE_SNAP_STEP: f32 = 0.05;
pub(crate) const DISTANCE_MIN: f32 = 0.0;

static NEXT_GIZMO: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GizmoId(pub u32);

impl GizmoId {
    fn fresh() -> Self {
        GizmoId(NEXT_GIZMO.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a gizmo's interaction state behaves when it is hidden and shown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoMode {
    /// Hiding drops an in-progress drag.
    #[default]
    Default,
    /// Releasing the handle or hiding the gizmo resolves its task.
    Temporary,
    /// Interaction state survives any toggle.
    Persistent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GizmoInteraction {
    Idle,
    Dragging { start_value: f32, accumulated: f32 },
}

pub(crate) fn snap_distance(value: f32, snap: bool) -> f32 {
    let clamped = value.max(DISTANCE_MIN);
    if snap {
        ((clamped / DISTANCE_SNAP_STEP).round() * DISTANCE_SNAP_STEP).max(DISTANCE_MIN)
    } else {
        clamped
    }
}

struct GizmoSession {
    core: Rc<TaskCore<f32>>,
    on_change: Rc<dyn Fn(f32)>,
    helper: HelperKey,
}

struct GizmoInner {
    id: GizmoId,
    name: String,
    editor: Editor,
    value: Cell<f32>,
    position: Cell<Vec3>,
    visible: Cell<bool>,
    snap: Cell<bool>,
    mode: Cell<GizmoMode>,
    interaction: Cell<GizmoInteraction>,
    session: RefCell<Option<GizmoSession>>,
}

impl GizmoInner {
    fn helper_object(&self) -> HelperObject {
        HelperObject::Gizmo { id: self.id, position: self.position.get(), value: self.value.get() }
    }

    fn refresh_helper(&self) {
        let key = self.session.borrow().as_ref().map(|session| session.helper);
        if let Some(key) = key {
            self.editor.helpers.update(key, self.helper_object());
        }
    }

    fn core(&self) -> Option<Rc<TaskCore<f32>>> {
        self.session.borrow().as_ref().map(|session| Rc::clone(&session.core))
    }

    fn drag(&self, delta: f32) {
        let (start_value, accumulated) = match self.interaction.get() {
            GizmoInteraction::Idle => (self.value.get(), delta),
            GizmoInteraction::Dragging { start_value, accumulated } => (start_value, accumulated + delta),
        };
        self.interaction.set(GizmoInteraction::Dragging { start_value, accumulated });
        let value = snap_distance(start_value + accumulated, self.snap.get());
        self.report(value);
    }

    /// Shows `value` and tells the session owner about it.
    fn report(&self, value: f32) {
        self.value.set(value);
        self.refresh_helper();
        let on_change = self.session.borrow().as_ref().map(|session| Rc::clone(&session.on_change));
        if let Some(on_change) = on_change {
            on_change(value);
        }
        self.editor.signals.gizmo_changed.dispatch(&());
    }

    fn release(&self) {
        self.interaction.set(GizmoInteraction::Idle);
        if self.mode.get() == GizmoMode::Temporary {
            if let Some(core) = self.core() {
                core.resolve(self.value.get());
            }
        }
    }
}

struct GizmoControl {
    gizmo: Weak<GizmoInner>,
    core: Rc<TaskCore<f32>>,
}

impl TaskControl for GizmoControl {
    fn cancel(&self) {
        self.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        let value = self.gizmo.upgrade().map(|gizmo| gizmo.value.get()).unwrap_or_default();
        self.core.resolve(value);
    }
}

/// On-screen handle editing one scalar parameter.
#[derive(Clone)]
pub struct ScalarGizmo {
    inner: Rc<GizmoInner>,
}

impl ScalarGizmo {
    pub fn new(name: impl Into<String>, editor: &Editor, value: f32) -> Self {
        Self {
            inner: Rc::new(GizmoInner {
                id: GizmoId::fresh(),
                name: name.into(),
                editor: editor.clone(),
                value: Cell::new(value),
                position: Cell::new(Vec3::ZERO),
                visible: Cell::new(true),
                snap: Cell::new(true),
                mode: Cell::new(GizmoMode::Default),
                interaction: Cell::new(GizmoInteraction::Idle),
                session: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> GizmoId {
        self.inner.id
    }

    pub fn value(&self) -> f32 {
        self.inner.value.get()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.inner.interaction.get(), GizmoInteraction::Dragging { .. })
    }

    pub fn is_active(&self) -> bool {
        self.inner.core().is_some_and(|core| core.is_pending())
    }

    pub fn mode(&self) -> GizmoMode {
        self.inner.mode.get()
    }

    pub fn set_snap(&self, snap: bool) {
        self.inner.snap.set(snap);
    }

    pub fn set_position(&self, position: Vec3) {
        self.inner.position.set(position);
        self.inner.refresh_helper();
    }

    /// Shows `value` without reporting a change.
    pub fn render(&self, value: f32) {
        self.inner.value.set(value);
        self.inner.refresh_helper();
    }

    /// Starts listening for drags; the task resolves with the final value.
    pub fn execute(&self, on_change: impl Fn(f32) + 'static, mode: GizmoMode) -> TaskHandle<f32> {
        if let Some(previous) = self.inner.core() {
            previous.reject(Fault::Cancelled);
        }
        let inner = &self.inner;
        let core = Rc::new(TaskCore::new(format!("gizmo:{}", inner.name)));
        inner.mode.set(mode);
        inner.interaction.set(GizmoInteraction::Idle);

        let (helper, helper_disposer) = inner.editor.helpers.add(inner.helper_object());
        core.scope().register(helper_disposer);

        let weak = Rc::downgrade(inner);
        let id = inner.id;
        core.scope().register(inner.editor.input.listen("gizmo", move |event| {
            let Some(gizmo) = weak.upgrade() else { return Propagation::Continue };
            match event {
                InputEvent::GizmoDrag { gizmo: target, delta } if *target == id => {
                    gizmo.drag(*delta);
                    Propagation::Consumed
                }
                InputEvent::GizmoRelease { gizmo: target } if *target == id => {
                    gizmo.release();
                    Propagation::Consumed
                }
                _ => Propagation::Continue,
            }
        }));

        let weak = Rc::downgrade(inner);
        core.scope().ensure(move || {
            if let Some(gizmo) = weak.upgrade() {
                gizmo.interaction.set(GizmoInteraction::Idle);
                gizmo.session.borrow_mut().take();
            }
        });

        *inner.session.borrow_mut() =
            Some(GizmoSession { core: Rc::clone(&core), on_change: Rc::new(on_change), helper });
        tracing::trace!(gizmo = %inner.name, ?mode, "gizmo active");
        TaskHandle::new(core.completion(), Rc::new(GizmoControl { gizmo: Rc::downgrade(inner), core }))
    }

    pub fn toggle(&self, visible: bool) {
        let inner = &self.inner;
        if inner.visible.replace(visible) == visible {
            return;
        }
        if visible {
            return;
        }
        match inner.mode.get() {
            GizmoMode::Persistent => {}
            GizmoMode::Default => {
                if let GizmoInteraction::Dragging { start_value, .. } = inner.interaction.replace(GizmoInteraction::Idle) {
                    inner.report(start_value);
                }
            }
            GizmoMode::Temporary => {
                if let Some(core) = inner.core() {
                    core.resolve(inner.value.get());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_to_step_and_clamps() {
        assert!((snap_distance(0.124, true) - 0.10).abs() < 1e-6);
        assert!((snap_distance(0.126, true) - 0.15).abs() < 1e-6);
        assert_eq!(snap_distance(-1.0, false), 0.0);
    }
}
