//! Import/export dispatch by file extension.
//!
//! The native `.kmodel` format is a `KMDL` magic, a format version, a blake3 digest of the
//! payload and the bincode-encoded [`GeometryModel`]. Everything else goes through a
//! [`Conversion`], except `.obj` export which runs as a queued [`ExportCommand`].

use crate::command::Agent;
use crate::commands::ExportCommand;
use crate::editor::Editor;
use crate::error::Fault;
use crate::geometry::{GeometryModel, SolidId};
use crate::task::Completion;
use anyhow::{bail, ensure, Context, Result};
use bincode::Options;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const NATIVE_MAGIC: &[u8; 4] = b"KMDL";
const NATIVE_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 32;

/// Why a generic conversion did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConvResType {
    #[error("unsupported file format")]
    UnknownFormat,
    #[error("file could not be opened")]
    FileOpenError,
    #[error("file contents could not be parsed")]
    ParseError,
    #[error("file could not be written")]
    WriteError,
}

/// Generic import/export for non-native formats.
pub trait Conversion {
    fn import_from_file(&self, path: &Path) -> Result<GeometryModel, ConvResType>;
    fn export_into_file(&self, model: &GeometryModel, path: &Path) -> Result<(), ConvResType>;
}

/// Plain serde_json exchange for `.json` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConversion;

impl JsonConversion {
    fn accepts(path: &Path) -> bool {
        extension_of(path).as_deref() == Some("json")
    }
}

impl Conversion for JsonConversion {
    fn import_from_file(&self, path: &Path) -> Result<GeometryModel, ConvResType> {
        if !Self::accepts(path) {
            return Err(ConvResType::UnknownFormat);
        }
        let bytes = fs::read(path).map_err(|_| ConvResType::FileOpenError)?;
        serde_json::from_slice(&bytes).map_err(|_| ConvResType::ParseError)
    }

    fn export_into_file(&self, model: &GeometryModel, path: &Path) -> Result<(), ConvResType> {
        if !Self::accepts(path) {
            return Err(ConvResType::UnknownFormat);
        }
        let json = serde_json::to_string_pretty(model).map_err(|_| ConvResType::WriteError)?;
        fs::write(path, json.as_bytes()).map_err(|_| ConvResType::WriteError)
    }
}

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

pub fn encode_native(model: &GeometryModel) -> Result<Vec<u8>> {
    let payload = bincode_options().serialize(model).context("Encoding native model")?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(NATIVE_MAGIC);
    bytes.extend_from_slice(&NATIVE_VERSION.to_le_bytes());
    bytes.extend_from_slice(blake3::hash(&payload).as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_native(bytes: &[u8]) -> Result<GeometryModel> {
    ensure!(bytes.len() >= HEADER_LEN, "native model truncated ({} bytes)", bytes.len());
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..4] != NATIVE_MAGIC {
        bail!("not a native model file");
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    ensure!(version == NATIVE_VERSION, "unsupported native model version {version}");
    let digest = blake3::hash(payload);
    ensure!(digest.as_bytes()[..] == header[6..], "native model checksum mismatch");
    bincode_options().deserialize(payload).context("Decoding native model")
}

/// Polyline OBJ: one object per solid, one `l` element per edge.
pub fn write_obj(model: &GeometryModel, path: &Path) -> Result<()> {
    let mut out = String::new();
    let mut next_vertex = 1usize;
    for solid in &model.solids {
        let _ = writeln!(out, "o {}", solid.name);
        for edge in &solid.edges {
            let first = next_vertex;
            for point in &edge.curve.points {
                let _ = writeln!(out, "v {} {} {}", point.x, point.y, point.z);
                next_vertex += 1;
            }
            let indices: Vec<String> = (first..next_vertex).map(|i| i.to_string()).collect();
            let _ = writeln!(out, "l {}", indices.join(" "));
        }
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating export directory {}", parent.display()))?;
    }
    fs::write(path, out.as_bytes()).with_context(|| format!("Writing OBJ file {}", path.display()))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Fault)>,
    pub solids: Vec<SolidId>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub enum ExportOutcome {
    Written(PathBuf),
    /// The export runs as a command; the completion settles when it ends.
    Enqueued(Completion<()>),
}

pub struct ImporterExporter {
    editor: Editor,
    conversion: Rc<dyn Conversion>,
}

impl ImporterExporter {
    pub fn new(editor: &Editor) -> Self {
        Self::with_conversion(editor, Rc::new(JsonConversion))
    }

    pub fn with_conversion(editor: &Editor, conversion: Rc<dyn Conversion>) -> Self {
        Self { editor: editor.clone(), conversion }
    }

    fn is_native(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| ext == self.editor.config.io.native_extension)
    }

    fn read_model(&self, path: &Path) -> Result<GeometryModel, Fault> {
        if self.is_native(path) {
            let bytes = fs::read(path)
                .with_context(|| format!("Reading native model {}", path.display()))
                .map_err(|err| Fault::external("import", err))?;
            return decode_native(&bytes).map_err(|err| Fault::external("import", err));
        }
        self.conversion.import_from_file(path).map_err(|err| Fault::external("import", err))
    }

    /// Loads every readable file; a failing file is logged and skipped.
    pub fn open<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> ImportReport {
        let mut report = ImportReport::default();
        for path in paths {
            let path = path.as_ref();
            match self.read_model(path) {
                Ok(model) => {
                    let ids = self.editor.db.borrow_mut().load(model);
                    tracing::debug!(path = %path.display(), solids = ids.len(), "imported");
                    for id in &ids {
                        self.editor.signals.object_added.dispatch(id);
                    }
                    report.solids.extend(ids);
                    report.loaded.push(path.to_path_buf());
                }
                Err(fault) => {
                    tracing::error!(path = %path.display(), error = %fault, "import failed; continuing");
                    report.failed.push((path.to_path_buf(), fault));
                }
            }
        }
        if !report.solids.is_empty() {
            self.editor.signals.scene_graph_changed.dispatch(&());
        }
        report
    }

    pub fn export(&self, model: &GeometryModel, path: impl AsRef<Path>) -> Result<ExportOutcome, Fault> {
        let path = path.as_ref();
        if extension_of(path).as_deref() == Some("obj") {
            let command = ExportCommand::new(model.clone(), path);
            return Ok(ExportOutcome::Enqueued(self.editor.enqueue(Box::new(command), Agent::Automated, false)));
        }
        if self.is_native(path) {
            let bytes = encode_native(model).map_err(|err| Fault::external("export", err))?;
            fs::write(path, bytes)
                .with_context(|| format!("Writing native model {}", path.display()))
                .map_err(|err| Fault::external("export", err))?;
        } else {
            self.conversion.export_into_file(model, path).map_err(|err| Fault::external("export", err))?;
        }
        tracing::debug!(path = %path.display(), "exported");
        Ok(ExportOutcome::Written(path.to_path_buf()))
    }
}
