use glam::{Vec2, Vec3};
use kestrel_modeler::camera::ViewKind;
use kestrel_modeler::config::ModelerConfig;
use kestrel_modeler::geometry::{PhantomObject, SolidShape};
use kestrel_modeler::viewport::{
    NavigationEvent, NavigationState, PassKind, RecordingBackend, RenderLoop, RenderState, Viewport, COMPOSITE_ORDER,
};
use kestrel_modeler::{Editor, FaultKind};
use std::cell::Cell;
use std::rc::Rc;

fn setup() -> (Editor, Viewport, RecordingBackend) {
    let editor = Editor::new(ModelerConfig::default());
    let backend = RecordingBackend::new();
    let viewport = Viewport::new(&editor, ViewKind::ThreeD, Box::new(backend.clone()));
    editor.attach_viewport(viewport.clone());
    viewport.connect();
    (editor, viewport, backend)
}

fn started() -> (Editor, Viewport, RecordingBackend) {
    let (editor, viewport, backend) = setup();
    editor.load_window();
    (editor, viewport, backend)
}

#[test]
fn viewport_waits_for_the_window_before_rendering() {
    let (editor, viewport, backend) = setup();
    assert_eq!(viewport.state(), RenderState::Stopped);
    viewport.set_needs_render();
    assert!(!viewport.render(1).expect("render"));

    let activated = Rc::new(Cell::new(0));
    let counter = Rc::clone(&activated);
    let _subscription = editor.signals.viewport_activated.add(move |_| counter.set(counter.get() + 1));
    editor.load_window();
    assert_eq!(viewport.state(), RenderState::Started);
    assert_eq!(activated.get(), 1);
    assert!(viewport.render(2).expect("render"));
    assert_eq!(backend.frame_count(), 1);
}

#[test]
fn many_invalidations_collapse_into_one_composite() {
    let (editor, viewport, backend) = started();
    viewport.render(1).expect("initial frame");
    for _ in 0..5 {
        editor.signals.scene_graph_changed.dispatch(&());
        editor.signals.gizmo_changed.dispatch(&());
    }
    assert!(viewport.render(2).expect("render"));
    assert!(!viewport.render(3).expect("render"), "clean viewport must not composite");
    assert_eq!(backend.frame_count(), 2);
    assert_eq!(viewport.stats().reparents, 2);
}

#[test]
fn stale_frame_numbers_keep_the_dirty_flag() {
    let (editor, viewport, backend) = started();
    viewport.render(5).expect("render");
    editor.signals.history_changed.dispatch(&());
    assert!(!viewport.render(5).expect("same frame"));
    assert!(!viewport.render(4).expect("older frame"));
    assert!(viewport.needs_render());
    assert!(viewport.render(6).expect("next frame"));
    assert_eq!(backend.frame_count(), 2);
}

#[test]
fn invalidation_during_render_is_absorbed_by_that_frame() {
    let (editor, viewport, backend) = started();
    let target = viewport.clone();
    let _subscription = editor.signals.render_prepared.add(move |_| target.set_needs_render());
    assert!(viewport.render(1).expect("render"));
    assert!(!viewport.needs_render(), "flag is cleared at the end of the attempt");
    assert!(!viewport.render(2).expect("render"), "a self-invalidating subscriber must not repaint forever");
    assert_eq!(backend.frame_count(), 1);
}

#[test]
fn failed_composite_is_reported_and_next_change_renders_again() {
    let (editor, viewport, backend) = started();
    backend.fail_next();
    let fault = viewport.render(1).expect_err("backend failure surfaces");
    assert_eq!(fault.kind(), FaultKind::External);
    assert_eq!(viewport.stats().failures, 1);
    assert!(!viewport.needs_render());

    editor.signals.selection_changed.dispatch(&kestrel_modeler::signals::SelectionChanged {
        source: "test",
        selection: Default::default(),
    });
    assert!(viewport.render(2).expect("recovered"));
    assert_eq!(viewport.stats().composites, 1);
    assert_eq!(backend.frame_count(), 2);
}

#[test]
fn passes_follow_the_fixed_order_and_overlays_toggle_on_content() {
    let (editor, viewport, backend) = started();
    editor.add_shape(SolidShape::cuboid("box", Vec3::ZERO, Vec3::ONE));
    viewport.render(1).expect("render");

    editor.db.borrow_mut().set_phantoms(
        "preview",
        vec![PhantomObject { owner: "preview", replaces: None, shape: SolidShape::cuboid("p", Vec3::ZERO, Vec3::ONE) }],
    );
    editor.signals.factory_updated.dispatch(&());
    viewport.render(2).expect("render");

    let frames = backend.frames();
    let kinds: Vec<PassKind> = frames[0].passes.iter().map(|pass| pass.kind).collect();
    assert_eq!(kinds, COMPOSITE_ORDER.to_vec());
    let phantoms = |frame: usize| frames[frame].passes.iter().find(|pass| pass.kind == PassKind::Phantoms).cloned();
    assert_eq!(phantoms(0).map(|pass| pass.enabled), Some(false));
    assert_eq!(phantoms(1).map(|pass| (pass.enabled, pass.objects)), Some((true, 1)));
    let base = frames[1].passes.iter().find(|pass| pass.kind == PassKind::Base).map(|pass| pass.objects);
    assert_eq!(base, Some(13), "one solid and its twelve edges");
}

#[test]
fn navigation_state_machine_guards_transitions() {
    let (_editor, viewport, _backend) = started();
    viewport.render(1).expect("render");
    viewport.handle_navigation(NavigationEvent::Start).expect("start");
    assert_eq!(viewport.navigation(), NavigationState::Navigating { selector_enabled: true });
    assert!(!viewport.selector_enabled());
    assert_eq!(viewport.handle_navigation(NavigationEvent::Start).map_err(|f| f.kind()), Err(FaultKind::State));

    let before = viewport.camera().position;
    viewport.handle_navigation(NavigationEvent::Change { delta: Vec2::new(0.3, 0.0) }).expect("change");
    assert_ne!(viewport.camera().position, before);
    assert!(viewport.needs_render());

    viewport.handle_navigation(NavigationEvent::End).expect("end");
    assert!(viewport.selector_enabled());
    assert_eq!(viewport.handle_navigation(NavigationEvent::End).map_err(|f| f.kind()), Err(FaultKind::State));

    viewport.disable_controls();
    viewport.handle_navigation(NavigationEvent::Start).expect("ignored");
    assert_eq!(viewport.navigation(), NavigationState::Idle);
}

#[test]
fn disconnect_drops_subscriptions_and_reconnect_restores_them() {
    let (editor, viewport, _backend) = started();
    viewport.render(1).expect("render");
    viewport.disconnect();
    assert_eq!(viewport.state(), RenderState::Stopped);
    editor.signals.scene_graph_changed.dispatch(&());
    assert!(!viewport.needs_render());

    viewport.connect();
    assert_eq!(viewport.state(), RenderState::Started);
    assert!(viewport.render(2).expect("render"));
}

#[test]
fn window_resize_and_keymap_commands_reach_the_viewport() {
    let (editor, viewport, _backend) = started();
    viewport.render(1).expect("render");
    editor.resize_window(640, 480);
    assert_eq!(viewport.size(), glam::UVec2::new(640, 480));
    assert!(viewport.needs_render());

    assert!(editor.keymap.invoke("viewport:top"));
    assert_eq!(viewport.construction_plane().normal(), Vec3::Z);
    assert!(editor.keymap.invoke("viewport:right"));
    assert_eq!(viewport.construction_plane().normal(), Vec3::X);
}

#[test]
fn render_loop_drives_attached_viewports_once_per_tick() {
    let (editor, _viewport, backend) = started();
    let mut render_loop = RenderLoop::new(&editor);
    let first = render_loop.tick();
    let second = render_loop.tick();
    assert_eq!((first.frame, first.composited), (1, 1));
    assert_eq!((second.frame, second.composited), (2, 0));
    editor.dispose();
    assert_eq!(render_loop.tick().composited, 0);
    assert_eq!(backend.frame_count(), 1);
}

#[test]
fn navigation_end_restores_a_disabled_selector_exactly() {
    let (_editor, viewport, _backend) = started();
    viewport.set_selector_enabled(false);
    viewport.handle_navigation(NavigationEvent::Start).expect("start");
    assert_eq!(viewport.navigation(), NavigationState::Navigating { selector_enabled: false });
    viewport.handle_navigation(NavigationEvent::End).expect("end");
    assert!(!viewport.selector_enabled(), "restores the captured value, not a default");
    assert_eq!(viewport.navigation(), NavigationState::Idle);
}

#[test]
fn navigation_end_is_honoured_after_controls_are_disabled() {
    let (_editor, viewport, _backend) = started();
    viewport.handle_navigation(NavigationEvent::Start).expect("start");
    viewport.disable_controls();
    let before = viewport.camera().position;
    viewport.handle_navigation(NavigationEvent::Change { delta: Vec2::new(0.3, 0.0) }).expect("ignored");
    assert_eq!(viewport.camera().position, before);

    viewport.handle_navigation(NavigationEvent::End).expect("end");
    assert_eq!(viewport.navigation(), NavigationState::Idle);
    assert!(viewport.selector_enabled());

    viewport.enable_controls();
    viewport.handle_navigation(NavigationEvent::Start).expect("a fresh navigation can start");
}
