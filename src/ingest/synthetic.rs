//! Scripted `stub://` scene.
//!
//! A striped grey yard (enough texture to keep the smoke gate closed) with a
//! dark puddle that comes and goes every 30 frames and a red flare that comes
//! and goes every 45 frames. Deterministic, so runs are reproducible.

use anyhow::Result;

use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

pub(crate) const SCHEME: &str = "stub://";

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FPS: f64 = 30.0;
const DEFAULT_FRAMES: u64 = 150;

const PUDDLE: (u32, u32, u32, u32) = (40, 60, 80, 80);
const PUDDLE_COLOR: [u8; 3] = [20, 20, 20];
const FLARE: (u32, u32, u32, u32) = (200, 100, 60, 60);
const FLARE_COLOR: [u8; 3] = [255, 0, 0];

pub struct SyntheticSource {
    name: String,
    total_frames: u64,
    frame_count: u64,
    open: bool,
}

impl SyntheticSource {
    pub fn new(name: &str) -> Self {
        Self::with_frames(name, DEFAULT_FRAMES)
    }

    pub fn with_frames(name: &str, total_frames: u64) -> Self {
        Self {
            name: name.to_string(),
            total_frames,
            frame_count: 0,
            open: false,
        }
    }

    /// Whether frame `n` (1-based) shows the dark puddle.
    pub fn puddle_visible(n: u64) -> bool {
        (n.saturating_sub(1) / 30) % 2 == 0
    }

    /// Whether frame `n` (1-based) shows the red flare.
    pub fn flare_visible(n: u64) -> bool {
        (n.saturating_sub(1) / 45) % 2 == 1
    }

    fn render(n: u64) -> Frame {
        let mut frame = Frame::filled(WIDTH, HEIGHT, [190, 190, 190]);
        for x in (0..WIDTH).step_by(2) {
            frame.fill_rect(x, 0, 1, HEIGHT, [170, 170, 170]);
        }
        if Self::puddle_visible(n) {
            let (x, y, w, h) = PUDDLE;
            frame.fill_rect(x, y, w, h, PUDDLE_COLOR);
        }
        if Self::flare_visible(n) {
            let (x, y, w, h) = FLARE;
            frame.fill_rect(x, y, w, h, FLARE_COLOR);
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{}{}", SCHEME, self.name)
    }

    fn open(&mut self) -> Result<SourceInfo> {
        self.open = true;
        self.frame_count = 0;
        log::info!("frame source: connected to {} (synthetic)", self.describe());
        Ok(SourceInfo {
            width: WIDTH,
            height: HEIGHT,
            fps: FPS,
            total_frames: self.total_frames,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            anyhow::bail!("synthetic source {} read before open", self.describe());
        }
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        self.frame_count += 1;
        Ok(Some(Self::render(self.frame_count)))
    }

    fn close(&mut self) {
        self.open = false;
    }
}
