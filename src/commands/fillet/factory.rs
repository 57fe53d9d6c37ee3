use crate::editor::Editor;
use crate::error::Fault;
use crate::factory::GeometryFactory;
use crate::geometry::{Creator, CreatorKind, EdgeId, ItemRef, PhantomObject, SolidId, SolidShape};
use crate::scope::Disposable;
use crate::signals::Signal;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

const PHANTOM_OWNER: &str = "fillet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilletMode {
    #[default]
    Fillet,
    Chamfer,
}

impl FilletMode {
    pub fn toggled(self) -> Self {
        match self {
            FilletMode::Fillet => FilletMode::Chamfer,
            FilletMode::Chamfer => FilletMode::Fillet,
        }
    }

    fn creator(self) -> CreatorKind {
        match self {
            FilletMode::Fillet => CreatorKind::Fillet,
            FilletMode::Chamfer => CreatorKind::Chamfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilletParams {
    pub distance1: f32,
    pub distance2: f32,
    pub mode: FilletMode,
}

impl Default for FilletParams {
    fn default() -> Self {
        Self { distance1: 0.0, distance2: 0.0, mode: FilletMode::Fillet }
    }
}

/// Radius along an edge, keyed by normalised parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadiusFunction {
    values: Vec<(f32, f32)>,
}

impl RadiusFunction {
    /// Sets the radius at `t`, replacing any value already pinned there.
    pub fn insert_value(&mut self, t: f32, value: f32) {
        match self.values.iter_mut().find(|(at, _)| (*at - t).abs() < 1e-4) {
            Some(slot) => slot.1 = value,
            None => {
                self.values.push((t, value));
                self.values.sort_by(|a, b| a.0.total_cmp(&b.0));
            }
        }
    }

    pub fn values(&self) -> &[(f32, f32)] {
        &self.values
    }
}

/// What the kernel is asked to fillet on one solid.
pub struct FilletRequest<'a> {
    pub solid: &'a SolidShape,
    pub edges: &'a [String],
    pub params: &'a FilletParams,
    pub functions: &'a BTreeMap<String, RadiusFunction>,
}

/// The external fillet/chamfer algorithm.
pub trait FilletKernel {
    fn fillet(&self, request: &FilletRequest<'_>) -> anyhow::Result<SolidShape>;
}

#[derive(Default)]
struct FilletState {
    edges: Vec<EdgeId>,
    params: FilletParams,
    functions: BTreeMap<String, RadiusFunction>,
    committed: bool,
}

/// Fillets every selected edge, grouped per owning solid, into phantom previews.
#[derive(Clone)]
pub struct MultiFilletFactory {
    state: Rc<RefCell<FilletState>>,
    editor: Editor,
    kernel: Rc<dyn FilletKernel>,
    changed: Signal<()>,
}

impl MultiFilletFactory {
    pub fn new(editor: &Editor, kernel: Rc<dyn FilletKernel>) -> Self {
        Self {
            state: Rc::new(RefCell::new(FilletState::default())),
            editor: editor.clone(),
            kernel,
            changed: Signal::new("factoryChanged"),
        }
    }

    /// Fires after every successful `update`.
    pub fn changed(&self) -> &Signal<()> {
        &self.changed
    }

    pub fn edges(&self) -> Vec<EdgeId> {
        self.state.borrow().edges.clone()
    }

    pub fn set_edges(&self, edges: Vec<EdgeId>) {
        self.state.borrow_mut().edges = edges;
    }

    pub fn params(&self) -> FilletParams {
        self.state.borrow().params
    }

    pub fn mode(&self) -> FilletMode {
        self.state.borrow().params.mode
    }

    pub fn set_distance(&self, distance: f32) {
        self.state.borrow_mut().params.distance1 = distance;
    }

    pub fn set_distance2(&self, distance: f32) {
        self.state.borrow_mut().params.distance2 = distance;
    }

    pub fn toggle_mode(&self) -> FilletMode {
        let mut state = self.state.borrow_mut();
        state.params.mode = state.params.mode.toggled();
        state.params.mode
    }

    pub fn insert_value(&self, edge_name: &str, t: f32, value: f32) {
        self.state.borrow_mut().functions.entry(edge_name.to_string()).or_default().insert_value(t, value);
    }

    pub fn function(&self, edge_name: &str) -> Option<RadiusFunction> {
        self.state.borrow().functions.get(edge_name).cloned()
    }

    pub fn is_committed(&self) -> bool {
        self.state.borrow().committed
    }

    fn compute(&self) -> Result<Vec<PhantomObject>, Fault> {
        let state = self.state.borrow();
        if state.edges.is_empty() {
            return Err(Fault::validation("fillet requires at least one edge"));
        }
        let db = self.editor.db.borrow();
        let mut grouped: BTreeMap<SolidId, Vec<String>> = BTreeMap::new();
        for id in &state.edges {
            let edge = db.edge(*id).ok_or_else(|| Fault::validation(format!("{} no longer exists", ItemRef::Edge(*id))))?;
            grouped.entry(edge.solid).or_default().push(edge.name.clone());
        }
        let mut phantoms = Vec::with_capacity(grouped.len());
        for (solid, edges) in grouped {
            let shape = db.solid_shape(solid).ok_or_else(|| Fault::validation(format!("solid#{} missing", solid.0)))?;
            let request = FilletRequest { solid: &shape, edges: &edges, params: &state.params, functions: &state.functions };
            let filleted = self.kernel.fillet(&request).map_err(|err| Fault::external("fillet", err))?;
            phantoms.push(PhantomObject { owner: PHANTOM_OWNER, replaces: Some(solid), shape: filleted });
        }
        Ok(phantoms)
    }
}

impl GeometryFactory for MultiFilletFactory {
    fn update(&self) -> Result<(), Fault> {
        let phantoms = self.compute()?;
        self.editor.db.borrow_mut().set_phantoms(PHANTOM_OWNER, phantoms);
        self.editor.signals.factory_updated.dispatch(&());
        self.changed.dispatch(&());
        Ok(())
    }

    fn commit(&self) -> Result<Vec<SolidId>, Fault> {
        let phantoms = self.compute()?;
        let params = self.params();
        let mut created = Vec::with_capacity(phantoms.len());
        {
            let mut db = self.editor.db.borrow_mut();
            db.clear_phantoms(PHANTOM_OWNER);
            for phantom in phantoms {
                let mut shape = phantom.shape;
                if let Some(replaced) = phantom.replaces {
                    db.remove_solid(replaced);
                }
                shape.creators.push(
                    Creator::new(params.mode.creator())
                        .with("distance1", params.distance1)
                        .with("distance2", params.distance2),
                );
                created.push(db.add_shape(shape));
            }
        }
        self.state.borrow_mut().committed = true;
        for id in &created {
            self.editor.signals.object_added.dispatch(id);
        }
        self.editor.signals.scene_graph_changed.dispatch(&());
        tracing::debug!(solids = created.len(), "fillet committed");
        Ok(created)
    }

    fn cancel(&self) {
        let cleared = self.editor.db.borrow_mut().clear_phantoms(PHANTOM_OWNER);
        if cleared > 0 {
            self.editor.signals.factory_cancelled.dispatch(&());
        }
    }
}

impl Disposable for MultiFilletFactory {
    fn dispose(&mut self) {
        GeometryFactory::cancel(self);
    }
}
