use super::PickerState;
use crate::editor::Editor;
use crate::error::Fault;
use crate::input::{InputEvent, Propagation};
use crate::raycast::{intersect, Ray, RaycasterParams};
use crate::selection::{PickerCapabilities, Selection, SelectionMode, SharedSelection};
use crate::signals::SelectionChanged;
use crate::task::{TaskControl, TaskCore, TaskHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct PickSession {
    core: TaskCore<Selection>,
    state: Cell<PickerState>,
    min: usize,
    max: usize,
    on_change: Box<dyn Fn(&Selection)>,
}

struct PickerInner {
    editor: Editor,
    label: &'static str,
    selection: SharedSelection,
    mode: Cell<SelectionMode>,
    capabilities: Cell<PickerCapabilities>,
    params: RaycasterParams,
    session: RefCell<Option<Rc<PickSession>>>,
}

impl PickerInner {
    fn snapshot(&self) -> Selection {
        self.selection.borrow().clone()
    }

    fn settle_state(&self, session: &PickSession) {
        if !session.core.is_pending() {
            return;
        }
        let count = self.selection.borrow().count(self.mode.get());
        let next = if (session.min..=session.max).contains(&count) {
            PickerState::AwaitingConfirmation
        } else {
            PickerState::Picking
        };
        session.state.set(next);
    }

    fn pick(&self, session: &PickSession, ray: &Ray) -> Propagation {
        let hit = {
            let db = self.editor.db.borrow();
            intersect(&db, ray, &self.params, self.mode.get()).into_iter().next()
        };
        let Some(hit) = hit else { return Propagation::Continue };
        {
            let mut selection = self.selection.borrow_mut();
            if self.capabilities.get().contains(PickerCapabilities::TOGGLE) {
                selection.toggle(hit.item);
            } else {
                if session.max == 1 {
                    selection.clear();
                }
                selection.add(hit.item);
            }
        }
        let snapshot = self.snapshot();
        (session.on_change)(&snapshot);
        self.editor.signals.selection_changed.dispatch(&SelectionChanged { source: self.label, selection: snapshot });
        self.settle_state(session);
        Propagation::Consumed
    }

    fn hover(&self, ray: &Ray) {
        let hit = {
            let db = self.editor.db.borrow();
            intersect(&db, ray, &self.params, self.mode.get()).into_iter().next()
        };
        self.editor.highlighter.set_hovered(hit.map(|hit| hit.item));
    }

    fn handle(&self, session: &PickSession, event: &InputEvent) -> Propagation {
        if !session.state.get().is_active() {
            return Propagation::Continue;
        }
        match event {
            InputEvent::PointerDown { ray } if self.capabilities.get().contains(PickerCapabilities::CLICK_SELECT) => {
                self.pick(session, ray)
            }
            InputEvent::PointerMove { ray } => {
                self.hover(ray);
                Propagation::Continue
            }
            InputEvent::Confirm
                if session.state.get() == PickerState::AwaitingConfirmation
                    && self.capabilities.get().contains(PickerCapabilities::CONFIRM) =>
            {
                session.state.set(PickerState::Resolved);
                session.core.resolve(self.snapshot());
                Propagation::Consumed
            }
            _ => Propagation::Continue,
        }
    }
}

struct PickControl {
    picker: Rc<PickerInner>,
    session: Rc<PickSession>,
}

impl TaskControl for PickControl {
    fn cancel(&self) {
        self.session.state.set(PickerState::Cancelled);
        self.session.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        self.session.state.set(PickerState::Resolved);
        self.session.core.resolve(self.picker.snapshot());
    }
}

/// Click-to-select picker over solids and edges.
#[derive(Clone)]
pub struct ObjectPicker {
    inner: Rc<PickerInner>,
}

impl ObjectPicker {
    /// Picks into `selection` when given, so a quasimode can share its parent's working set.
    pub fn new(editor: &Editor, selection: Option<SharedSelection>, label: &'static str) -> Self {
        Self {
            inner: Rc::new(PickerInner {
                editor: editor.clone(),
                label,
                selection: selection.unwrap_or_default(),
                mode: Cell::new(SelectionMode::all()),
                capabilities: Cell::new(PickerCapabilities::all()),
                params: editor.raycaster_params(),
                session: RefCell::new(None),
            }),
        }
    }

    pub fn with_capabilities(self, capabilities: PickerCapabilities) -> Self {
        self.inner.capabilities.set(capabilities);
        self
    }

    pub fn selection(&self) -> SharedSelection {
        Rc::clone(&self.inner.selection)
    }

    pub fn mode(&self) -> SelectionMode {
        self.inner.mode.get()
    }

    pub fn set_mode(&self, mode: SelectionMode) {
        self.inner.mode.set(mode);
    }

    pub fn state(&self) -> Option<PickerState> {
        self.inner.session.borrow().as_ref().map(|session| session.state.get())
    }

    pub fn copy(&self, selection: &Selection) {
        self.inner.selection.borrow_mut().copy_from(selection);
    }

    /// Keeps the `mode` items of the working selection. Resolves at once when they already
    /// number within `[min, max]`; otherwise picks interactively until they do.
    pub fn slice(&self, mode: SelectionMode, min: usize, max: usize) -> TaskHandle<Selection> {
        self.set_mode(mode);
        let filtered = self.inner.selection.borrow().filtered(mode);
        let count = filtered.len();
        *self.inner.selection.borrow_mut() = filtered;
        if (min..=max).contains(&count) {
            return TaskHandle::settled(Ok(self.inner.snapshot()));
        }
        self.execute(|_| {}, min, max)
    }

    pub fn execute(&self, on_change: impl Fn(&Selection) + 'static, min: usize, max: usize) -> TaskHandle<Selection> {
        let session = Rc::new(PickSession {
            core: TaskCore::new(format!("picker:{}", self.inner.label)),
            state: Cell::new(PickerState::Picking),
            min,
            max,
            on_change: Box::new(on_change),
        });
        self.inner.settle_state(&session);

        let (picker, listening) = (Rc::clone(&self.inner), Rc::clone(&session));
        let listener = self.inner.editor.input.listen(self.inner.label, move |event| picker.handle(&listening, event));
        session.core.scope().register(listener);

        let (picker, owned) = (Rc::downgrade(&self.inner), Rc::downgrade(&session));
        session.core.scope().ensure(move || {
            let Some(picker) = picker.upgrade() else { return };
            picker.editor.highlighter.set_hovered(None);
            let mut current = picker.session.borrow_mut();
            if current.as_ref().map(Rc::as_ptr) == owned.upgrade().as_ref().map(Rc::as_ptr) {
                current.take();
            }
        });

        *self.inner.session.borrow_mut() = Some(Rc::clone(&session));
        tracing::trace!(picker = self.inner.label, min, max, "object picker active");
        TaskHandle::new(session.core.completion(), Rc::new(PickControl { picker: Rc::clone(&self.inner), session }))
    }
}
