use crate::geometry::{EdgeId, GeometryDatabase, ItemRef, SolidId};
use crate::scope::Disposer;
use crate::signals::{EditorSignals, SelectionChanged};
use bitflags::bitflags;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

bitflags! {
    /// Item kinds a picker accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SelectionMode: u8 {
        const SOLID = 1;
        const CURVE_EDGE = 1 << 1;
    }
}

impl SelectionMode {
    pub fn accepts(self, item: ItemRef) -> bool {
        match item {
            ItemRef::Solid(_) => self.contains(SelectionMode::SOLID),
            ItemRef::Edge(_) => self.contains(SelectionMode::CURVE_EDGE),
        }
    }
}

bitflags! {
    /// What an object picker lets the user do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PickerCapabilities: u8 {
        const CLICK_SELECT = 1;
        const TOGGLE = 1 << 1;
        const CONFIRM = 1 << 2;
        const QUASIMODE = Self::CLICK_SELECT.bits() | Self::TOGGLE.bits();
    }
}

impl Default for PickerCapabilities {
    fn default() -> Self {
        PickerCapabilities::all()
    }
}

/// Ordered set of picked items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<ItemRef>,
}

pub type SharedSelection = Rc<RefCell<Selection>>;

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = ItemRef>) -> Self {
        let mut selection = Self::new();
        for item in items {
            selection.add(item);
        }
        selection
    }

    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: ItemRef) -> bool {
        self.items.contains(&item)
    }

    pub fn add(&mut self, item: ItemRef) -> bool {
        if self.contains(item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: ItemRef) -> bool {
        let before = self.items.len();
        self.items.retain(|i| *i != item);
        before != self.items.len()
    }

    /// Returns true when the item ends up selected.
    pub fn toggle(&mut self, item: ItemRef) -> bool {
        if self.remove(item) {
            false
        } else {
            self.items.push(item);
            true
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn count(&self, mode: SelectionMode) -> usize {
        self.items.iter().filter(|item| mode.accepts(**item)).count()
    }

    pub fn edges(&self) -> Vec<EdgeId> {
        self.items.iter().filter_map(|item| item.as_edge()).collect()
    }

    pub fn solids(&self) -> Vec<SolidId> {
        self.items.iter().filter_map(|item| item.as_solid()).collect()
    }

    /// Keeps only the items of `mode`.
    pub fn filtered(&self, mode: SelectionMode) -> Selection {
        Selection { items: self.items.iter().copied().filter(|item| mode.accepts(*item)).collect() }
    }

    pub fn copy_from(&mut self, other: &Selection) {
        self.items.clone_from(&other.items);
    }
}

/// The editor's persistent selection.
#[derive(Clone)]
pub struct SelectionManager {
    selected: SharedSelection,
    signals: EditorSignals,
}

impl SelectionManager {
    pub fn new(signals: EditorSignals) -> Self {
        Self { selected: Rc::new(RefCell::new(Selection::new())), signals }
    }

    pub fn shared(&self) -> SharedSelection {
        Rc::clone(&self.selected)
    }

    pub fn snapshot(&self) -> Selection {
        self.selected.borrow().clone()
    }

    pub fn add(&self, item: ItemRef, source: &'static str) {
        let changed = self.selected.borrow_mut().add(item);
        if changed {
            self.announce(source);
        }
    }

    pub fn replace(&self, selection: Selection, source: &'static str) {
        let changed = {
            let mut current = self.selected.borrow_mut();
            let changed = *current != selection;
            *current = selection;
            changed
        };
        if changed {
            self.announce(source);
        }
    }

    pub fn clear(&self, source: &'static str) {
        self.replace(Selection::new(), source);
    }

    /// Drops items that no longer exist in `db`.
    pub fn retain_existing(&self, db: &GeometryDatabase, source: &'static str) {
        let kept = Selection::from_items(self.snapshot().items().iter().copied().filter(|item| db.contains(*item)));
        self.replace(kept, source);
    }

    fn announce(&self, source: &'static str) {
        let selection = self.snapshot();
        self.signals.selection_changed.dispatch(&SelectionChanged { source, selection });
    }
}

/// Decides which items the outline passes draw.
#[derive(Clone)]
pub struct HighlightManager {
    base: SharedSelection,
    temporary: Rc<RefCell<Vec<(u64, SharedSelection)>>>,
    next_token: Rc<Cell<u64>>,
    hovered: Rc<Cell<Option<ItemRef>>>,
    signals: EditorSignals,
}

impl HighlightManager {
    pub fn new(selection: &SelectionManager, signals: EditorSignals) -> Self {
        Self {
            base: selection.shared(),
            temporary: Rc::new(RefCell::new(Vec::new())),
            next_token: Rc::new(Cell::new(0)),
            hovered: Rc::new(Cell::new(None)),
            signals,
        }
    }

    /// Outlines `selection` instead of the editor selection until the disposer runs.
    pub fn use_temporary(&self, selection: SharedSelection) -> Disposer {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        self.temporary.borrow_mut().push((token, selection));
        let stack = Rc::clone(&self.temporary);
        Disposer::new(move || stack.borrow_mut().retain(|(t, _)| *t != token))
    }

    pub fn temporary_depth(&self) -> usize {
        self.temporary.borrow().len()
    }

    pub fn outline_selection(&self) -> Vec<ItemRef> {
        match self.temporary.borrow().last() {
            Some((_, selection)) => selection.borrow().items().to_vec(),
            None => self.base.borrow().items().to_vec(),
        }
    }

    pub fn hovered(&self) -> Option<ItemRef> {
        self.hovered.get()
    }

    pub fn set_hovered(&self, item: Option<ItemRef>) {
        let previous = self.hovered.replace(item);
        if previous == item {
            return;
        }
        if let Some(previous) = previous {
            self.signals.object_unhovered.dispatch(&previous);
        }
        if let Some(item) = item {
            self.signals.object_hovered.dispatch(&item);
        }
    }

    pub fn outline_hover(&self) -> Vec<ItemRef> {
        self.hovered.get().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_keeps_insertion_order() {
        let mut selection = Selection::new();
        let (a, b) = (ItemRef::Edge(EdgeId(1)), ItemRef::Solid(SolidId(1)));
        selection.toggle(a);
        selection.toggle(b);
        selection.toggle(a);
        selection.toggle(a);
        assert_eq!(selection.items(), &[b, a]);
        assert_eq!(selection.count(SelectionMode::CURVE_EDGE), 1);
    }

    #[test]
    fn temporary_highlight_reverts_on_dispose() {
        use crate::scope::Disposable;
        let signals = EditorSignals::new();
        let manager = SelectionManager::new(signals.clone());
        manager.add(ItemRef::Solid(SolidId(3)), "test");
        let highlighter = HighlightManager::new(&manager, signals);
        let temp = Rc::new(RefCell::new(Selection::from_items([ItemRef::Edge(EdgeId(9))])));
        let mut disposer = highlighter.use_temporary(temp);
        assert_eq!(highlighter.outline_selection(), vec![ItemRef::Edge(EdgeId(9))]);
        disposer.dispose();
        assert_eq!(highlighter.outline_selection(), vec![ItemRef::Solid(SolidId(3))]);
    }
}
