use crate::editor::Editor;
use std::time::{Duration, Instant};

/// Monotonic frame counter with wall-clock deltas.
pub struct FrameClock {
    last: Instant,
    frame: u64,
    pub delta: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { last: now, frame: 0, delta: Duration::ZERO }
    }

    pub fn tick(&mut self) -> u64 {
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
        self.frame += 1;
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub composited: usize,
    pub failed: usize,
}

/// Drives every attached viewport once per display frame.
pub struct RenderLoop {
    editor: Editor,
    clock: FrameClock,
}

impl RenderLoop {
    pub fn new(editor: &Editor) -> Self {
        Self { editor: editor.clone(), clock: FrameClock::new() }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn tick(&mut self) -> FrameReport {
        let frame = self.clock.tick();
        let mut report = FrameReport { frame, ..FrameReport::default() };
        for viewport in self.editor.viewports() {
            match viewport.render(frame) {
                Ok(true) => report.composited += 1,
                Ok(false) => {}
                Err(_) => report.failed += 1,
            }
        }
        report
    }
}
