//! Render scheduling for one view onto the model.
//!
//! A viewport is only ever invalidated by signals. `render(frame)` does real work at most
//! once per frame number and only when something marked it dirty since the last attempt.

mod compositor;
mod construction_plane;
mod render_loop;
mod scene;

pub use compositor::{
    Compositor, FrameDescription, OutlinePass, PassInvocation, PassKind, RecordingBackend, RenderBackend,
    COMPOSITE_ORDER,
};
pub use construction_plane::ConstructionPlane;
pub use render_loop::{FrameClock, FrameReport, RenderLoop};
pub use scene::{SceneNode, SceneRoot, SceneRoots};

use crate::camera::{ViewKind, ViewportCamera};
use crate::editor::Editor;
use crate::error::Fault;
use crate::input::{InputEvent, Propagation};
use crate::raycast::intersect;
use crate::scope::ResourceScope;
use crate::selection::{Selection, SelectionMode};
use crate::signals::{RenderPrepared, Signal};
use glam::{UVec2, Vec2, Vec3};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_VIEWPORT: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Stopped,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationEvent {
    Start,
    Change { delta: Vec2 },
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Idle,
    /// Remembers whether the selector was enabled when navigation began.
    Navigating { selector_enabled: bool },
}

/// Axis-aligned orientations the keymap commands jump to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    NegY,
    PosX,
    PosZ,
}

impl Orientation {
    pub fn direction(self) -> Vec3 {
        match self {
            Orientation::NegY => Vec3::NEG_Y,
            Orientation::PosX => Vec3::X,
            Orientation::PosZ => Vec3::Z,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub reparents: u64,
    pub composites: u64,
    pub failures: u64,
}

struct ViewportInner {
    id: ViewportId,
    kind: ViewKind,
    editor: Editor,
    camera: RefCell<ViewportCamera>,
    size: Cell<UVec2>,
    plane: Cell<ConstructionPlane>,
    compositor: RefCell<Compositor>,
    roots: RefCell<SceneRoots>,
    needs_render: Cell<bool>,
    last_frame: Cell<Option<u64>>,
    state: Cell<RenderState>,
    navigation: Cell<NavigationState>,
    selector_enabled: Cell<bool>,
    controls_enabled: Cell<bool>,
    scope: RefCell<ResourceScope>,
    stats: Cell<RenderStats>,
}

impl ViewportInner {
    fn invalidate(&self) {
        self.needs_render.set(true);
    }

    fn bump(&self, f: impl FnOnce(&mut RenderStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

fn invalidate_on<T: 'static>(scope: &ResourceScope, signal: &Signal<T>, viewport: &Weak<ViewportInner>) {
    let viewport = Weak::clone(viewport);
    scope.register(signal.add(move |_| {
        if let Some(viewport) = viewport.upgrade() {
            viewport.invalidate();
        }
    }));
}

#[derive(Clone)]
pub struct Viewport {
    inner: Rc<ViewportInner>,
}

impl Viewport {
    pub fn new(editor: &Editor, kind: ViewKind, backend: Box<dyn RenderBackend>) -> Self {
        let config = &editor.config;
        let id = ViewportId(NEXT_VIEWPORT.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Rc::new(ViewportInner {
                id,
                kind,
                editor: editor.clone(),
                camera: RefCell::new(ViewportCamera::for_view(kind, &config.viewport)),
                size: Cell::new(UVec2::new(config.viewport.width, config.viewport.height)),
                plane: Cell::new(ConstructionPlane::Fixed { origin: Vec3::ZERO, normal: kind.plane_normal() }),
                compositor: RefCell::new(Compositor::new(backend, &config.outline)),
                roots: RefCell::new(SceneRoots::default()),
                needs_render: Cell::new(false),
                last_frame: Cell::new(None),
                state: Cell::new(RenderState::Stopped),
                navigation: Cell::new(NavigationState::Idle),
                selector_enabled: Cell::new(true),
                controls_enabled: Cell::new(true),
                scope: RefCell::new(ResourceScope::new(format!("viewport:{}", id.0))),
                stats: Cell::new(RenderStats::default()),
            }),
        }
    }

    pub fn id(&self) -> ViewportId {
        self.inner.id
    }

    pub fn kind(&self) -> ViewKind {
        self.inner.kind
    }

    pub fn state(&self) -> RenderState {
        self.inner.state.get()
    }

    pub fn needs_render(&self) -> bool {
        self.inner.needs_render.get()
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.inner.last_frame.get()
    }

    pub fn stats(&self) -> RenderStats {
        self.inner.stats.get()
    }

    pub fn camera(&self) -> ViewportCamera {
        self.inner.camera.borrow().clone()
    }

    pub fn size(&self) -> UVec2 {
        self.inner.size.get()
    }

    pub fn navigation(&self) -> NavigationState {
        self.inner.navigation.get()
    }

    pub fn selector_enabled(&self) -> bool {
        self.inner.selector_enabled.get()
    }

    pub fn set_selector_enabled(&self, enabled: bool) {
        self.inner.selector_enabled.set(enabled);
    }

    pub fn controls_enabled(&self) -> bool {
        self.inner.controls_enabled.get()
    }

    pub fn construction_plane(&self) -> ConstructionPlane {
        self.inner.plane.get()
    }

    pub fn set_construction_plane(&self, plane: ConstructionPlane) {
        self.inner.plane.set(plane);
        self.set_needs_render();
    }

    pub fn set_needs_render(&self) {
        self.inner.invalidate();
    }

    /// Registers with the editor and starts once the window has loaded.
    pub fn connect(&self) {
        let inner = &self.inner;
        let scope = inner.scope.borrow().clone();
        if !scope.is_open() {
            *inner.scope.borrow_mut() = ResourceScope::new(format!("viewport:{}", inner.id.0));
            return self.connect();
        }
        let weak = Rc::downgrade(inner);
        let resized = Weak::clone(&weak);
        scope.register(inner.editor.signals.window_resized.add(move |size| {
            if let Some(inner) = resized.upgrade() {
                Viewport { inner }.set_size(size.width, size.height);
            }
        }));
        for (name, orientation) in
            [("viewport:front", Orientation::NegY), ("viewport:right", Orientation::PosX), ("viewport:top", Orientation::PosZ)]
        {
            let target = Weak::clone(&weak);
            scope.register(inner.editor.keymap.register(name, move || {
                if let Some(inner) = target.upgrade() {
                    Viewport { inner }.navigate(orientation);
                }
            }));
        }
        if inner.editor.is_window_loaded() {
            self.start();
        } else {
            let pending = Weak::clone(&weak);
            scope.register(inner.editor.signals.window_loaded.add_once(move |_| {
                if let Some(inner) = pending.upgrade() {
                    Viewport { inner }.start();
                }
            }));
        }
    }

    fn start(&self) {
        let inner = &self.inner;
        if inner.state.replace(RenderState::Started) == RenderState::Started {
            return;
        }
        let scope = inner.scope.borrow().clone();
        let signals = &inner.editor.signals;
        let weak = Rc::downgrade(inner);
        invalidate_on(&scope, &signals.selection_changed, &weak);
        invalidate_on(&scope, &signals.scene_graph_changed, &weak);
        invalidate_on(&scope, &signals.factory_updated, &weak);
        invalidate_on(&scope, &signals.factory_cancelled, &weak);
        invalidate_on(&scope, &signals.point_picker_changed, &weak);
        invalidate_on(&scope, &signals.gizmo_changed, &weak);
        invalidate_on(&scope, &signals.object_hovered, &weak);
        invalidate_on(&scope, &signals.object_unhovered, &weak);
        invalidate_on(&scope, &signals.object_added, &weak);
        invalidate_on(&scope, &signals.history_changed, &weak);
        invalidate_on(&scope, &signals.command_ended, &weak);
        invalidate_on(&scope, &signals.module_reloaded, &weak);
        let stopped = Rc::downgrade(inner);
        scope.ensure(move || {
            if let Some(inner) = stopped.upgrade() {
                inner.state.set(RenderState::Stopped);
            }
        });
        inner.invalidate();
        tracing::debug!(viewport = inner.id.0, view = inner.kind.label(), "viewport started");
        signals.viewport_activated.dispatch(&inner.id);
    }

    /// Drops every subscription; the viewport can be connected again later.
    pub fn disconnect(&self) {
        let scope = self.inner.scope.borrow().clone();
        scope.release();
        self.inner.state.set(RenderState::Stopped);
    }

    pub fn dispose(&self) {
        self.disconnect();
        self.inner.roots.borrow_mut().detach_all();
    }

    /// Composites at most once per frame number, and only when dirty. Returns whether a
    /// composite was attempted.
    pub fn render(&self, frame: u64) -> Result<bool, Fault> {
        let inner = &self.inner;
        if inner.state.get() != RenderState::Started || !inner.needs_render.get() {
            return Ok(false);
        }
        if inner.last_frame.get().is_some_and(|last| frame <= last) {
            return Ok(false);
        }
        inner.last_frame.set(Some(frame));

        let editor = &inner.editor;
        {
            let db = editor.db.borrow();
            let mut roots = inner.roots.borrow_mut();
            roots.base.attach(db.scene_items().into_iter().map(SceneNode::Item));
            roots.phantoms.attach(db.phantoms().iter().cloned().map(SceneNode::Phantom));
            roots.helpers.attach(editor.helpers.objects().into_iter().map(SceneNode::Helper));
        }
        inner.bump(|stats| stats.reparents += 1);

        let size = inner.size.get();
        let view_projection = inner.camera.borrow().view_projection(size);
        let description = {
            let roots = inner.roots.borrow();
            let mut compositor = inner.compositor.borrow_mut();
            compositor.configure(&roots);
            compositor.hover.items = editor.highlighter.outline_hover();
            compositor.selection.items = editor.highlighter.outline_selection();
            compositor.describe(frame, &roots, view_projection, size)
        };
        editor.signals.render_prepared.dispatch(&RenderPrepared {
            viewport: inner.id,
            view_projection,
            resolution: size,
        });
        let result = inner.compositor.borrow_mut().composite(&description);
        inner.roots.borrow_mut().detach_all();
        // cleared whatever the outcome; invalidations raised while compositing are absorbed
        inner.needs_render.set(false);

        match result {
            Ok(()) => {
                inner.bump(|stats| stats.composites += 1);
                Ok(true)
            }
            Err(fault) => {
                inner.bump(|stats| stats.failures += 1);
                tracing::warn!(viewport = inner.id.0, frame, error = %fault, "composite failed");
                Err(fault)
            }
        }
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.inner.size.set(UVec2::new(width, height));
        self.set_needs_render();
    }

    pub fn disable_controls(&self) {
        self.inner.controls_enabled.set(false);
    }

    pub fn enable_controls(&self) {
        self.inner.controls_enabled.set(true);
    }

    pub fn handle_navigation(&self, event: NavigationEvent) -> Result<(), Fault> {
        let inner = &self.inner;
        // End always runs so a navigation interrupted by disabled controls still restores
        // the selector.
        if !inner.controls_enabled.get() && event != NavigationEvent::End {
            return Ok(());
        }
        match (event, inner.navigation.get()) {
            (NavigationEvent::Start, NavigationState::Idle) => {
                let selector_enabled = inner.selector_enabled.replace(false);
                inner.navigation.set(NavigationState::Navigating { selector_enabled });
            }
            (NavigationEvent::Start, NavigationState::Navigating { .. }) => {
                return Err(Fault::state("navigation start while already navigating"));
            }
            (NavigationEvent::Change { delta }, NavigationState::Navigating { .. }) => {
                let camera = {
                    let mut camera = inner.camera.borrow_mut();
                    camera.orbit(delta);
                    camera.clone()
                };
                let mut plane = inner.plane.get();
                plane.update(&camera);
                inner.plane.set(plane);
                inner.invalidate();
            }
            (NavigationEvent::Change { .. }, NavigationState::Idle) => {
                tracing::trace!(viewport = inner.id.0, "navigation change while idle ignored");
            }
            (NavigationEvent::End, NavigationState::Navigating { selector_enabled }) => {
                inner.selector_enabled.set(selector_enabled);
                inner.navigation.set(NavigationState::Idle);
            }
            (NavigationEvent::End, NavigationState::Idle) => {
                return Err(Fault::state("navigation end while idle"));
            }
        }
        Ok(())
    }

    pub fn toggle_construction_plane(&self) {
        let camera = self.camera();
        let plane = self.inner.plane.get().toggled(&camera, self.inner.kind.plane_normal());
        self.set_construction_plane(plane);
    }

    /// Looks at the target from `orientation` and fixes the construction plane facing it.
    pub fn navigate(&self, orientation: Orientation) {
        let direction = orientation.direction();
        {
            let mut camera = self.inner.camera.borrow_mut();
            let distance = camera.position.distance(camera.target).max(1.0);
            camera.position = camera.target + direction * distance;
            camera.up = if orientation == Orientation::PosZ { Vec3::Y } else { Vec3::Z };
        }
        self.set_construction_plane(ConstructionPlane::Fixed { origin: Vec3::ZERO, normal: direction });
    }

    /// Offers a click to running interactions first, then to the selector.
    pub fn pointer_down(&self, screen: Vec2) -> Propagation {
        let inner = &self.inner;
        let Some(ray) = inner.camera.borrow().screen_ray(screen, inner.size.get()) else {
            return Propagation::Continue;
        };
        let editor = &inner.editor;
        if editor.dispatch_input(&InputEvent::PointerDown { ray }) == Propagation::Consumed {
            return Propagation::Consumed;
        }
        if !inner.selector_enabled.get() || !inner.controls_enabled.get() {
            return Propagation::Continue;
        }
        let hit = {
            let db = editor.db.borrow();
            intersect(&db, &ray, &editor.raycaster_params(), SelectionMode::all()).into_iter().next()
        };
        match hit {
            Some(hit) => editor.selection.replace(Selection::from_items([hit.item]), "viewport"),
            None => editor.selection.clear("viewport"),
        }
        Propagation::Consumed
    }

    pub fn pointer_move(&self, screen: Vec2) -> Propagation {
        let inner = &self.inner;
        let Some(ray) = inner.camera.borrow().screen_ray(screen, inner.size.get()) else {
            return Propagation::Continue;
        };
        let editor = &inner.editor;
        if editor.dispatch_input(&InputEvent::PointerMove { ray }) == Propagation::Consumed {
            return Propagation::Consumed;
        }
        if inner.selector_enabled.get() && editor.input.is_empty() {
            let hit = {
                let db = editor.db.borrow();
                intersect(&db, &ray, &editor.raycaster_params(), SelectionMode::all()).into_iter().next()
            };
            editor.highlighter.set_hovered(hit.map(|hit| hit.item));
        }
        Propagation::Continue
    }
}
