use crate::editor::Editor;
use crate::error::Fault;
use crate::geometry::EdgeId;
use crate::input::{InputEvent, Propagation};
use crate::raycast::{Ray, RaycasterParams};
use crate::spatial::{EdgeIndex, EdgeMatch};
use crate::task::{TaskControl, TaskCore, TaskHandle};
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct PointResult {
    pub point: Vec3,
    /// Set when the pick was restricted to edges.
    pub matched: Option<EdgeMatch>,
}

/// Fixed candidate set a point pick must land on.
pub struct Restriction {
    index: EdgeIndex,
    current: RefCell<Option<EdgeMatch>>,
}

impl Restriction {
    pub fn index(&self) -> &EdgeIndex {
        &self.index
    }

    /// Match under the pointer as of the last move or click.
    pub fn current_match(&self) -> Option<EdgeMatch> {
        self.current.borrow().clone()
    }

    fn update(&self, ray: &Ray, params: &RaycasterParams) -> Option<EdgeMatch> {
        let matched = self.index.raycast(ray, params.line_threshold).map(|mut matched| {
            for end in [matched.model.start(), matched.model.end()] {
                if matched.point.distance(end) <= params.points_threshold {
                    matched.point = end;
                }
            }
            matched
        });
        self.current.replace(matched.clone());
        matched
    }
}

struct PointSession {
    core: TaskCore<PointResult>,
    last: RefCell<Option<PointResult>>,
}

struct PointControl {
    session: Rc<PointSession>,
}

impl TaskControl for PointControl {
    fn cancel(&self) {
        self.session.core.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        let last = self.session.last.borrow().clone();
        match last {
            Some(result) => self.session.core.resolve(result),
            None => self.session.core.reject(Fault::Cancelled),
        };
    }
}

/// Picks a single point, either on the construction plane or on a restricted edge set.
pub struct PointPicker {
    editor: Editor,
    pub raycaster_params: RaycasterParams,
    restriction: Option<Rc<Restriction>>,
}

impl PointPicker {
    pub fn new(editor: &Editor) -> Self {
        Self { editor: editor.clone(), raycaster_params: editor.raycaster_params(), restriction: None }
    }

    /// Limits matching to `edges`, indexed once up front.
    pub fn restrict_to_edges(&mut self, edges: &[EdgeId]) -> Rc<Restriction> {
        let index = {
            let db = self.editor.db.borrow();
            EdgeIndex::build(edges.iter().filter_map(|id| db.edge(*id)))
        };
        let restriction = Rc::new(Restriction { index, current: RefCell::new(None) });
        self.restriction = Some(Rc::clone(&restriction));
        restriction
    }

    fn locate(editor: &Editor, restriction: Option<&Restriction>, params: &RaycasterParams, ray: &Ray) -> Option<PointResult> {
        match restriction {
            Some(restriction) => {
                restriction.update(ray, params).map(|matched| PointResult { point: matched.point, matched: Some(matched) })
            }
            None => {
                let plane = editor.active_viewport().map(|viewport| viewport.construction_plane()).unwrap_or_default();
                plane.intersect(ray).map(|point| PointResult { point, matched: None })
            }
        }
    }

    pub fn execute(&self) -> TaskHandle<PointResult> {
        let session = Rc::new(PointSession { core: TaskCore::new("point-picker"), last: RefCell::new(None) });
        let (editor, restriction, params) = (self.editor.clone(), self.restriction.clone(), self.raycaster_params);
        let listening = Rc::clone(&session);
        let listener = self.editor.input.listen("point-picker", move |event| match event {
            InputEvent::PointerMove { ray } => {
                let located = Self::locate(&editor, restriction.as_deref(), &params, ray);
                listening.last.replace(located);
                editor.signals.point_picker_changed.dispatch(&());
                Propagation::Continue
            }
            InputEvent::PointerDown { ray } => match Self::locate(&editor, restriction.as_deref(), &params, ray) {
                Some(result) => {
                    listening.core.resolve(result);
                    Propagation::Consumed
                }
                None if restriction.is_some() => Propagation::Consumed,
                None => Propagation::Continue,
            },
            _ => Propagation::Continue,
        });
        session.core.scope().register(listener);
        TaskHandle::new(session.core.completion(), Rc::new(PointControl { session }))
    }
}
