use crate::command::{Agent, CommandExecutor, CommandLike};
use crate::config::ModelerConfig;
use crate::geometry::{GeometryDatabase, SolidId, SolidShape};
use crate::helpers::Helpers;
use crate::input::{InputEvent, InputRouter, KeymapRegistry, Propagation};
use crate::raycast::RaycasterParams;
use crate::scope::ResourceScope;
use crate::selection::{HighlightManager, SelectionManager};
use crate::signals::{EditorSignals, WindowSize};
use crate::task::Completion;
use crate::viewport::{Viewport, ViewportId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Explicitly constructed registry of editor services, handed to every component that needs
/// one. `dispose` tears everything down; nothing here is a process-wide singleton.
#[derive(Clone)]
pub struct Editor {
    pub config: Rc<ModelerConfig>,
    pub signals: EditorSignals,
    pub db: Rc<RefCell<GeometryDatabase>>,
    pub selection: SelectionManager,
    pub highlighter: HighlightManager,
    pub helpers: Helpers,
    pub input: InputRouter,
    pub keymap: KeymapRegistry,
    pub executor: CommandExecutor,
    viewports: Rc<RefCell<Vec<Viewport>>>,
    active_viewport: Rc<Cell<Option<ViewportId>>>,
    window_loaded: Rc<Cell<bool>>,
    registry: ResourceScope,
}

impl Editor {
    pub fn new(config: ModelerConfig) -> Self {
        let signals = EditorSignals::new();
        let selection = SelectionManager::new(signals.clone());
        let highlighter = HighlightManager::new(&selection, signals.clone());
        let registry = ResourceScope::new("editor");
        let active_viewport = Rc::new(Cell::new(None));
        let activated = Rc::clone(&active_viewport);
        registry.register(signals.viewport_activated.add(move |id| activated.set(Some(*id))));
        Self {
            config: Rc::new(config),
            db: Rc::new(RefCell::new(GeometryDatabase::new())),
            highlighter,
            selection,
            helpers: Helpers::new(),
            input: InputRouter::new(),
            keymap: KeymapRegistry::new(),
            executor: CommandExecutor::new(),
            viewports: Rc::new(RefCell::new(Vec::new())),
            active_viewport,
            window_loaded: Rc::new(Cell::new(false)),
            registry,
            signals,
        }
    }

    pub fn raycaster_params(&self) -> RaycasterParams {
        RaycasterParams {
            line_threshold: self.config.picker.line_threshold,
            points_threshold: self.config.picker.points_threshold,
        }
    }

    /// Long-lived scope released by `dispose`.
    pub fn registry(&self) -> &ResourceScope {
        &self.registry
    }

    pub fn is_window_loaded(&self) -> bool {
        self.window_loaded.get()
    }

    pub fn load_window(&self) {
        if !self.window_loaded.replace(true) {
            self.signals.window_loaded.dispatch(&());
        }
    }

    pub fn resize_window(&self, width: u32, height: u32) {
        self.signals.window_resized.dispatch(&WindowSize { width, height });
    }

    pub fn attach_viewport(&self, viewport: Viewport) {
        self.viewports.borrow_mut().push(viewport);
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.viewports.borrow().clone()
    }

    /// Viewport that last announced `viewport_activated`, falling back to the first attached.
    pub fn active_viewport(&self) -> Option<Viewport> {
        let viewports = self.viewports.borrow();
        self.active_viewport
            .get()
            .and_then(|id| viewports.iter().find(|viewport| viewport.id() == id))
            .or_else(|| viewports.first())
            .cloned()
    }

    pub fn enqueue(&self, command: Box<dyn CommandLike>, agent: Agent, interrupt: bool) -> Completion<()> {
        self.executor.enqueue(self, command, agent, interrupt)
    }

    /// Offers `event` to active interactions; unclaimed Abort/Confirm end the active command.
    pub fn dispatch_input(&self, event: &InputEvent) -> Propagation {
        if self.input.dispatch(event) == Propagation::Consumed {
            return Propagation::Consumed;
        }
        let handled = match event {
            InputEvent::Abort => self.executor.cancel_active(),
            InputEvent::Confirm => self.executor.finish_active(),
            _ => false,
        };
        if handled {
            Propagation::Consumed
        } else {
            Propagation::Continue
        }
    }

    pub fn add_shape(&self, shape: SolidShape) -> SolidId {
        let id = self.db.borrow_mut().add_shape(shape);
        self.signals.object_added.dispatch(&id);
        self.signals.scene_graph_changed.dispatch(&());
        id
    }

    pub fn dispose(&self) {
        self.executor.clear_queue();
        self.executor.cancel_active();
        let viewports = std::mem::take(&mut *self.viewports.borrow_mut());
        for viewport in viewports {
            viewport.dispose();
        }
        let released = self.registry.release();
        tracing::debug!(released, "editor disposed");
    }
}
