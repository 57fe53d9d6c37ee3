use super::factory::{FilletMode, FilletParams, MultiFilletFactory};
use crate::editor::Editor;
use crate::error::Fault;
use crate::input::{InputEvent, Propagation};
use crate::task::{TaskControl, TaskCore, TaskHandle};
use std::cell::Cell;
use std::rc::Rc;

/// Values and visible fields of the parameter dialog as last rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialogView {
    pub params: FilletParams,
    pub shows_distance2: bool,
}

struct DialogControl {
    core: Rc<TaskCore<FilletParams>>,
    factory: MultiFilletFactory,
}

impl TaskControl for DialogControl {
    fn cancel(&self) {
        self.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        self.core.resolve(self.factory.params());
    }
}

pub struct FilletDialog {
    editor: Editor,
    factory: MultiFilletFactory,
    view: Rc<Cell<DialogView>>,
}

impl FilletDialog {
    pub fn new(editor: &Editor, factory: &MultiFilletFactory) -> Self {
        let view = DialogView { params: factory.params(), shows_distance2: false };
        Self { editor: editor.clone(), factory: factory.clone(), view: Rc::new(Cell::new(view)) }
    }

    pub fn view(&self) -> DialogView {
        self.view.get()
    }

    pub fn toggle(&self, mode: FilletMode) {
        let mut view = self.view.get();
        view.shows_distance2 = mode == FilletMode::Chamfer;
        self.view.set(view);
    }

    pub fn render(&self) {
        let mut view = self.view.get();
        view.params = self.factory.params();
        self.view.set(view);
    }

    /// Submit resolves with the current parameters; cancel rejects.
    pub fn execute(&self, on_change: impl Fn(FilletParams) + 'static) -> TaskHandle<FilletParams> {
        let core = Rc::new(TaskCore::new("fillet-dialog"));
        let (factory, view, settle) = (self.factory.clone(), Rc::clone(&self.view), Rc::clone(&core));
        core.scope().register(self.editor.input.listen("fillet-dialog", move |event| match event {
            InputEvent::DialogEdit { field, value } => {
                match field.as_str() {
                    "distance1" => factory.set_distance(*value),
                    "distance2" => factory.set_distance2(*value),
                    _ => return Propagation::Continue,
                }
                let params = factory.params();
                let mut current = view.get();
                current.params = params;
                view.set(current);
                on_change(params);
                Propagation::Consumed
            }
            InputEvent::DialogSubmit => {
                settle.resolve(factory.params());
                Propagation::Consumed
            }
            InputEvent::DialogCancel => {
                settle.reject(Fault::Cancelled);
                Propagation::Consumed
            }
            _ => Propagation::Continue,
        }));
        TaskHandle::new(core.completion(), Rc::new(DialogControl { core, factory: self.factory.clone() }))
    }
}
