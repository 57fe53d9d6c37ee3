use super::ObjectPicker;
use crate::editor::Editor;
use crate::error::Fault;
use crate::input::{InputEvent, Propagation};
use crate::selection::Selection;
use crate::task::{TaskControl, TaskCore, TaskHandle};
use std::cell::RefCell;
use std::rc::Rc;

struct QuasimodeSession {
    core: TaskCore<()>,
    inner: RefCell<Option<TaskHandle<Selection>>>,
}

impl QuasimodeSession {
    fn stop_inner(&self, finish: bool) {
        let inner = self.inner.borrow_mut().take();
        if let Some(inner) = inner {
            if finish {
                inner.finish();
            } else {
                inner.cancel();
            }
        }
    }
}

struct QuasimodeControl {
    session: Rc<QuasimodeSession>,
}

impl TaskControl for QuasimodeControl {
    fn cancel(&self) {
        self.session.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        self.session.core.resolve(());
    }
}

/// Runs a second object picker only while the trigger key is held.
pub struct Quasimode {
    name: &'static str,
    editor: Editor,
    picker: ObjectPicker,
    trigger: String,
}

impl Quasimode {
    pub fn new(name: &'static str, editor: &Editor, picker: ObjectPicker) -> Self {
        Self { name, editor: editor.clone(), trigger: editor.config.keymap.quasimode.clone(), picker }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// The task stays pending until cancelled or finished; each key press runs the inner
    /// picker afresh and each release finishes it.
    pub fn execute(&self, on_change: impl Fn(&Selection) + 'static, min: usize, max: usize) -> TaskHandle<()> {
        let session = Rc::new(QuasimodeSession { core: TaskCore::new(self.name), inner: RefCell::new(None) });
        let on_change: Rc<dyn Fn(&Selection)> = Rc::new(on_change);
        let (picker, trigger, name) = (self.picker.clone(), self.trigger.clone(), self.name);
        let session_ref = Rc::clone(&session);
        let listener = self.editor.input.listen("quasimode", move |event| {
            let session = &session_ref;
            match event {
                InputEvent::KeyDown { key } if *key == trigger => {
                    if session.inner.borrow().as_ref().is_some_and(|inner| inner.is_pending()) {
                        return Propagation::Consumed;
                    }
                    tracing::trace!(quasimode = name, "engaged");
                    let forward = Rc::clone(&on_change);
                    let inner = picker.execute(move |selection| forward(selection), min, max);
                    let failed = Rc::downgrade(session);
                    inner.completion().on_settled(move |outcome| {
                        if let (Err(fault), Some(session)) = (outcome, failed.upgrade()) {
                            if !fault.is_cancellation() {
                                session.core.reject(fault.clone());
                            }
                        }
                    });
                    session.inner.replace(Some(inner));
                    Propagation::Consumed
                }
                InputEvent::KeyUp { key } if *key == trigger => {
                    session.stop_inner(true);
                    Propagation::Consumed
                }
                _ => Propagation::Continue,
            }
        });
        session.core.scope().register(listener);
        let owned = Rc::downgrade(&session);
        session.core.scope().ensure(move || {
            if let Some(session) = owned.upgrade() {
                session.stop_inner(false);
            }
        });
        TaskHandle::new(session.core.completion(), Rc::new(QuasimodeControl { session }))
    }
}
