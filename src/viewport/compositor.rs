use super::scene::SceneRoots;
use crate::config::OutlineConfig;
use crate::error::Fault;
use crate::geometry::ItemRef;
use anyhow::{bail, Result};
use glam::{Mat4, UVec2};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Base,
    HoverOutline,
    SelectionOutline,
    Phantoms,
    Helpers,
    Navigator,
    ColorCorrection,
}

pub const COMPOSITE_ORDER: [PassKind; 7] = [
    PassKind::Base,
    PassKind::HoverOutline,
    PassKind::SelectionOutline,
    PassKind::Phantoms,
    PassKind::Helpers,
    PassKind::Navigator,
    PassKind::ColorCorrection,
];

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            PassKind::Base => "Base Pass",
            PassKind::HoverOutline => "Hover Outline Pass",
            PassKind::SelectionOutline => "Selection Outline Pass",
            PassKind::Phantoms => "Phantom Pass",
            PassKind::Helpers => "Helper Pass",
            PassKind::Navigator => "Navigator Pass",
            PassKind::ColorCorrection => "Gamma Correction Pass",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlinePass {
    pub items: Vec<ItemRef>,
    pub color: u32,
    pub edge_strength: f32,
    pub edge_thickness: f32,
}

impl OutlinePass {
    fn new(color: u32, config: &OutlineConfig) -> Self {
        Self { items: Vec::new(), color, edge_strength: config.edge_strength, edge_thickness: config.edge_thickness }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassInvocation {
    pub kind: PassKind,
    pub enabled: bool,
    /// Objects the pass draws (outlined items for outline passes).
    pub objects: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescription {
    pub frame: u64,
    pub view_projection: Mat4,
    pub resolution: UVec2,
    pub passes: Vec<PassInvocation>,
}

/// GPU side of compositing. Implementations only execute the passes they are handed.
pub trait RenderBackend {
    fn composite(&mut self, frame: &FrameDescription) -> Result<()>;
}

#[derive(Default)]
struct RecordingLog {
    frames: Vec<FrameDescription>,
    fail_next: bool,
}

/// Headless backend that records every frame it is asked to composite.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    log: Rc<RefCell<RecordingLog>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<FrameDescription> {
        self.log.borrow().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.log.borrow().frames.len()
    }

    /// Makes the next composite fail after it has been recorded.
    pub fn fail_next(&self) {
        self.log.borrow_mut().fail_next = true;
    }
}

impl RenderBackend for RecordingBackend {
    fn composite(&mut self, frame: &FrameDescription) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.frames.push(frame.clone());
        if std::mem::take(&mut log.fail_next) {
            bail!("device lost while compositing frame {}", frame.frame);
        }
        Ok(())
    }
}

/// Fixed-order pass list over the per-purpose scene roots.
pub struct Compositor {
    backend: Box<dyn RenderBackend>,
    pub hover: OutlinePass,
    pub selection: OutlinePass,
    phantoms_enabled: bool,
    helpers_enabled: bool,
}

impl Compositor {
    pub fn new(backend: Box<dyn RenderBackend>, outline: &OutlineConfig) -> Self {
        Self {
            backend,
            hover: OutlinePass::new(outline.hover_color, outline),
            selection: OutlinePass::new(outline.selection_color, outline),
            phantoms_enabled: false,
            helpers_enabled: false,
        }
    }

    /// Enables the overlay passes only when their roots have something to draw.
    pub fn configure(&mut self, roots: &SceneRoots) {
        self.phantoms_enabled = !roots.phantoms.is_empty();
        self.helpers_enabled = !roots.helpers.is_empty();
    }

    pub fn phantoms_enabled(&self) -> bool {
        self.phantoms_enabled
    }

    pub fn helpers_enabled(&self) -> bool {
        self.helpers_enabled
    }

    pub fn describe(&self, frame: u64, roots: &SceneRoots, view_projection: Mat4, resolution: UVec2) -> FrameDescription {
        let passes = COMPOSITE_ORDER
            .iter()
            .map(|&kind| {
                let (enabled, objects) = match kind {
                    PassKind::Base => (true, roots.base.len()),
                    PassKind::HoverOutline => (true, self.hover.items.len()),
                    PassKind::SelectionOutline => (true, self.selection.items.len()),
                    PassKind::Phantoms => (self.phantoms_enabled, roots.phantoms.len()),
                    PassKind::Helpers => (self.helpers_enabled, roots.helpers.len()),
                    PassKind::Navigator | PassKind::ColorCorrection => (true, 0),
                };
                PassInvocation { kind, enabled, objects }
            })
            .collect();
        FrameDescription { frame, view_projection, resolution, passes }
    }

    pub fn composite(&mut self, frame: &FrameDescription) -> Result<(), Fault> {
        self.backend.composite(frame).map_err(|err| Fault::external("composite", err))
    }
}
