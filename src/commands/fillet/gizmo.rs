use super::factory::{FilletMode, FilletParams, MultiFilletFactory};
use crate::editor::Editor;
use crate::geometry::Curve;
use crate::gizmo::{GizmoMode, ScalarGizmo};
use crate::helpers::{HelperKey, HelperObject};
use crate::scope::{Disposable, Disposer};
use crate::task::TaskHandle;
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;

pub struct VariableHandle {
    pub gizmo: ScalarGizmo,
    pub model: Curve,
    pub t: f32,
}

struct FilletGizmoInner {
    editor: Editor,
    factory: MultiFilletFactory,
    distance: ScalarGizmo,
    variables: RefCell<Vec<VariableHandle>>,
    overlay: RefCell<Option<(HelperKey, Disposer)>>,
}

/// Distance handle plus any variable-radius handles added along the edges.
#[derive(Clone)]
pub struct FilletGizmo {
    inner: Rc<FilletGizmoInner>,
}

impl FilletGizmo {
    pub fn new(editor: &Editor, factory: &MultiFilletFactory, point: Option<Vec3>) -> Self {
        let distance = ScalarGizmo::new("fillet:distance", editor, factory.params().distance1);
        if let Some(point) = point {
            distance.set_position(point);
        }
        Self {
            inner: Rc::new(FilletGizmoInner {
                editor: editor.clone(),
                factory: factory.clone(),
                distance,
                variables: RefCell::new(Vec::new()),
                overlay: RefCell::new(None),
            }),
        }
    }

    pub fn distance(&self) -> &ScalarGizmo {
        &self.inner.distance
    }

    pub fn variable_count(&self) -> usize {
        self.inner.variables.borrow().len()
    }

    pub fn execute(&self, on_change: impl Fn(FilletParams) + 'static) -> TaskHandle<f32> {
        let factory = self.inner.factory.clone();
        self.inner.distance.execute(
            move |value| {
                factory.set_distance(value);
                on_change(factory.params());
            },
            GizmoMode::Default,
        )
    }

    /// Variable radii only make sense for fillets.
    pub fn toggle(&self, mode: FilletMode) {
        let visible = mode == FilletMode::Fillet;
        for variable in self.inner.variables.borrow().iter() {
            variable.gizmo.toggle(visible);
        }
    }

    pub fn render(&self, distance: f32) {
        self.inner.distance.render(distance);
    }

    /// Outlines the edges the factory currently targets.
    pub fn show_edges(&self) {
        let object = HelperObject::EdgeOutline { edges: self.inner.factory.edges() };
        let existing = self.inner.overlay.borrow().as_ref().map(|(key, _)| *key);
        match existing {
            Some(key) => {
                self.inner.editor.helpers.update(key, object);
            }
            None => {
                let overlay = self.inner.editor.helpers.add(object);
                self.inner.overlay.replace(Some(overlay));
            }
        }
        self.inner.editor.signals.gizmo_changed.dispatch(&());
    }

    pub fn add_variable(&self, point: Vec3, model: Curve, t: f32) -> ScalarGizmo {
        let gizmo = ScalarGizmo::new("fillet:variable", &self.inner.editor, self.inner.factory.params().distance1);
        gizmo.set_position(point);
        self.inner.variables.borrow_mut().push(VariableHandle { gizmo: gizmo.clone(), model, t });
        gizmo
    }
}

impl Disposable for FilletGizmo {
    fn dispose(&mut self) {
        let overlay = self.inner.overlay.borrow_mut().take();
        if let Some((_, mut disposer)) = overlay {
            disposer.dispose();
        }
        self.inner.variables.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fillet::{FilletKernel, FilletRequest};
    use crate::config::ModelerConfig;
    use crate::geometry::SolidShape;
    use crate::input::InputEvent;
    use std::cell::Cell;

    struct Unused;

    impl FilletKernel for Unused {
        fn fillet(&self, request: &FilletRequest<'_>) -> anyhow::Result<SolidShape> {
            Ok(request.solid.clone())
        }
    }

    #[test]
    fn hiding_mid_drag_reverts_the_factory_distance() {
        let editor = Editor::new(ModelerConfig::default());
        let factory = MultiFilletFactory::new(&editor, Rc::new(Unused));
        factory.set_distance(0.2);
        let gizmo = FilletGizmo::new(&editor, &factory, None);
        gizmo.render(0.2);
        let reported = Rc::new(Cell::new(f32::NAN));
        let sink = Rc::clone(&reported);
        let _task = gizmo.execute(move |params| sink.set(params.distance1));

        editor.dispatch_input(&InputEvent::GizmoDrag { gizmo: gizmo.distance().id(), delta: 0.5 });
        assert!((factory.params().distance1 - 0.7).abs() < 1e-5);

        gizmo.distance().toggle(false);
        assert!((factory.params().distance1 - 0.2).abs() < 1e-5, "factory follows the reverted handle");
        assert!((reported.get() - 0.2).abs() < 1e-5);
        assert!((gizmo.distance().value() - 0.2).abs() < 1e-5);
    }
}
