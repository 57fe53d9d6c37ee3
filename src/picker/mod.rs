//! Cancellable sub-interactions a command drives: object picking, point picking and the
//! hold-to-pick quasimode. Each one is an explicit state machine whose resources live in its
//! own task scope, released before its task settles.

mod object_picker;
mod point_picker;
mod quasimode;

pub use object_picker::ObjectPicker;
pub use point_picker::{PointPicker, PointResult, Restriction};
pub use quasimode::Quasimode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    Picking,
    AwaitingConfirmation,
    Resolved,
    Cancelled,
}

impl PickerState {
    pub fn is_active(self) -> bool {
        matches!(self, PickerState::Picking | PickerState::AwaitingConfirmation)
    }
}
