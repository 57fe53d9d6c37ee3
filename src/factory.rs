use crate::error::Fault;
use crate::geometry::SolidId;

/// Computes a geometric result from editable parameters.
///
/// `update` refreshes the phantom preview and must leave the factory's inputs untouched when
/// it fails, so the caller can adjust them and retry. `commit` replaces the preview with real
/// geometry; `cancel` removes the preview.
pub trait GeometryFactory {
    fn update(&self) -> Result<(), Fault>;

    fn commit(&self) -> Result<Vec<SolidId>, Fault>;

    fn cancel(&self);
}
