use crate::command::{Command, CommandLike};
use crate::editor::Editor;
use crate::error::Fault;
use crate::geometry::GeometryModel;
use crate::io::write_obj;
use std::path::{Path, PathBuf};

/// Writes a model snapshot as OBJ and finishes.
pub struct ExportCommand {
    pub model: GeometryModel,
    pub path: PathBuf,
}

impl ExportCommand {
    pub fn new(model: GeometryModel, path: impl AsRef<Path>) -> Self {
        Self { model, path: path.as_ref().to_path_buf() }
    }
}

impl CommandLike for ExportCommand {
    fn name(&self) -> &'static str {
        "export"
    }

    fn execute(self: Box<Self>, command: &Command, _editor: &Editor) -> Result<(), Fault> {
        write_obj(&self.model, &self.path).map_err(|err| Fault::external("export", err))?;
        tracing::debug!(path = %self.path.display(), solids = self.model.solids.len(), "obj export written");
        command.finish();
        Ok(())
    }
}
