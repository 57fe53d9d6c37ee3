//! Creator history of the selected solid, as rendered by the modifiers panel.

use crate::editor::Editor;
use crate::error::Fault;
use crate::geometry::{Creator, CreatorKind, GeometryDatabase, SolidId};
use crate::scope::Disposable;
use crate::selection::SelectionManager;
use crate::signals::{SelectionChanged, Subscription};
use std::cell::RefCell;
use std::rc::Rc;

pub struct ModifiersModel {
    selection: SelectionManager,
    db: Rc<RefCell<GeometryDatabase>>,
}

impl ModifiersModel {
    pub fn new(selection: SelectionManager, db: Rc<RefCell<GeometryDatabase>>) -> Self {
        Self { selection, db }
    }

    /// First selected solid; only meaningful while a solid is selected.
    pub fn item(&self) -> Result<SolidId, Fault> {
        self.selection.snapshot().solids().first().copied().ok_or_else(|| Fault::validation("invalid precondition"))
    }

    pub fn creators(&self) -> Vec<(usize, Creator)> {
        let Ok(item) = self.item() else { return Vec::new() };
        let db = self.db.borrow();
        db.solid(item).map(|solid| solid.creators.iter().cloned().enumerate().collect()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatorRow {
    pub index: usize,
    pub element: String,
    pub name: &'static str,
    pub detail: String,
    pub item: SolidId,
}

fn parameter(creator: &Creator, key: &str) -> f32 {
    creator.parameters.get(key).copied().unwrap_or_default()
}

pub fn render_creator(index: usize, creator: &Creator, item: SolidId) -> CreatorRow {
    let detail = match creator.kind {
        CreatorKind::Fillet => format!("radius {:.3}", parameter(creator, "distance1")),
        CreatorKind::Chamfer => {
            format!("distances {:.3} / {:.3}", parameter(creator, "distance1"), parameter(creator, "distance2"))
        }
        CreatorKind::ElementarySolid | CreatorKind::Imported => String::new(),
        CreatorKind::CurveExtrusion
        | CreatorKind::Revolution
        | CreatorKind::Boolean
        | CreatorKind::Symmetry => creator
            .parameters
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", "),
    };
    CreatorRow {
        index,
        element: format!("kestrel-creator-{}", creator.kind.dasherized()),
        name: creator.kind.name(),
        detail,
        item,
    }
}

/// Keeps a row list in sync with the selection while connected.
pub struct ModifiersPanel {
    editor: Editor,
    rows: Rc<RefCell<Vec<CreatorRow>>>,
    subscription: RefCell<Option<Subscription<SelectionChanged>>>,
}

impl ModifiersPanel {
    pub fn new(editor: &Editor) -> Self {
        Self { editor: editor.clone(), rows: Rc::new(RefCell::new(Vec::new())), subscription: RefCell::new(None) }
    }

    pub fn rows(&self) -> Vec<CreatorRow> {
        self.rows.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    pub fn connect(&self) {
        if self.is_connected() {
            return;
        }
        let (editor, rows) = (self.editor.clone(), Rc::clone(&self.rows));
        let subscription = self.editor.signals.selection_changed.add(move |_| {
            *rows.borrow_mut() = Self::collect(&editor);
        });
        self.subscription.replace(Some(subscription));
        self.render();
    }

    pub fn render(&self) {
        *self.rows.borrow_mut() = Self::collect(&self.editor);
    }

    pub fn disconnect(&self) {
        if let Some(mut subscription) = self.subscription.borrow_mut().take() {
            subscription.dispose();
        }
    }

    fn collect(editor: &Editor) -> Vec<CreatorRow> {
        let model = ModifiersModel::new(editor.selection.clone(), Rc::clone(&editor.db));
        let Ok(item) = model.item() else { return Vec::new() };
        model.creators().iter().map(|(index, creator)| render_creator(*index, creator, item)).collect()
    }
}

impl Drop for ModifiersPanel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
