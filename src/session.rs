//! Headless editing session: import, render a few frames, export, tear down.

use crate::camera::ViewKind;
use crate::config::ModelerConfig;
use crate::editor::Editor;
use crate::io::{ExportOutcome, ImportReport, ImporterExporter};
use crate::viewport::{FrameReport, RecordingBackend, RenderLoop, Viewport};
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct SessionPlan {
    pub imports: Vec<PathBuf>,
    pub export: Option<PathBuf>,
    pub frames: u64,
}

#[derive(Debug, Default)]
pub struct SessionReport {
    pub import: ImportReport,
    pub frames: Vec<FrameReport>,
    pub backend_frames: usize,
    pub solids: usize,
    pub exported: Option<PathBuf>,
}

impl SessionReport {
    pub fn composites(&self) -> usize {
        self.frames.iter().map(|frame| frame.composited).sum()
    }
}

pub fn run_headless(config: ModelerConfig, plan: &SessionPlan) -> Result<SessionReport> {
    let editor = Editor::new(config);
    let backend = RecordingBackend::new();
    let viewport = Viewport::new(&editor, ViewKind::ThreeD, Box::new(backend.clone()));
    editor.attach_viewport(viewport.clone());
    viewport.connect();
    editor.load_window();

    let io = ImporterExporter::new(&editor);
    let mut report = SessionReport { import: io.open(&plan.imports), ..SessionReport::default() };
    let mut render_loop = RenderLoop::new(&editor);
    for _ in 0..plan.frames {
        report.frames.push(render_loop.tick());
    }

    let result = export(&editor, &io, plan);
    report.solids = editor.db.borrow().solid_count();
    report.backend_frames = backend.frame_count();
    editor.dispose();
    report.exported = result?;
    tracing::info!(
        loaded = report.import.loaded.len(),
        failed = report.import.failed.len(),
        composites = report.composites(),
        "headless session complete"
    );
    Ok(report)
}

fn export(editor: &Editor, io: &ImporterExporter, plan: &SessionPlan) -> Result<Option<PathBuf>> {
    let Some(path) = plan.export.as_ref() else { return Ok(None) };
    let model = editor.db.borrow().export_model();
    match io.export(&model, path)? {
        ExportOutcome::Written(path) => Ok(Some(path)),
        ExportOutcome::Enqueued(completion) => {
            pollster::block_on(completion).with_context(|| format!("Exporting {}", path.display()))?;
            Ok(Some(path.clone()))
        }
    }
}
