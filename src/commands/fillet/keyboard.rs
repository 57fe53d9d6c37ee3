use super::factory::FilletMode;
use crate::editor::Editor;
use crate::error::Fault;
use crate::input::{InputEvent, Propagation};
use crate::task::{TaskControl, TaskCore, TaskHandle};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardCommand {
    Add,
    ToggleMode,
}

struct KeyboardControl {
    core: Rc<TaskCore<()>>,
}

impl TaskControl for KeyboardControl {
    fn cancel(&self) {
        self.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        self.core.resolve(());
    }
}

/// Maps keymap keys to fillet commands while the fillet is being edited.
pub struct FilletKeyboardGizmo {
    editor: Editor,
    mode: Rc<Cell<FilletMode>>,
}

impl FilletKeyboardGizmo {
    pub fn new(editor: &Editor) -> Self {
        Self { editor: editor.clone(), mode: Rc::new(Cell::new(FilletMode::Fillet)) }
    }

    pub fn toggle(&self, mode: FilletMode) {
        self.mode.set(mode);
    }

    pub fn execute(&self, on_command: impl Fn(KeyboardCommand) + 'static) -> TaskHandle<()> {
        let core = Rc::new(TaskCore::new("fillet-keyboard"));
        let keymap = &self.editor.config.keymap;
        let (add, toggle, mode) = (keymap.add_variable.clone(), keymap.toggle_mode.clone(), Rc::clone(&self.mode));
        core.scope().register(self.editor.input.listen("fillet-keyboard", move |event| {
            let InputEvent::KeyDown { key } = event else { return Propagation::Continue };
            if *key == add && mode.get() == FilletMode::Fillet {
                on_command(KeyboardCommand::Add);
                Propagation::Consumed
            } else if *key == toggle {
                on_command(KeyboardCommand::ToggleMode);
                Propagation::Consumed
            } else {
                Propagation::Continue
            }
        }));
        TaskHandle::new(core.completion(), Rc::new(KeyboardControl { core }))
    }
}
