use anyhow::Result;
use std::collections::VecDeque;

use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

/// Frames held in memory, yielded in insertion order.
pub struct MemorySource {
    label: String,
    fps: f64,
    pending: VecDeque<Frame>,
    total: u64,
    open: bool,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let total = frames.len() as u64;
        Self {
            label: "memory".to_string(),
            fps,
            pending: frames.into(),
            total,
            open: false,
        }
    }

    /// Single-frame source, used for snapshot analysis.
    pub fn single(frame: Frame) -> Self {
        Self::new(vec![frame], 1.0).with_label("snapshot")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameSource for MemorySource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn open(&mut self) -> Result<SourceInfo> {
        self.open = true;
        let (width, height) = self
            .pending
            .front()
            .map(|frame| (frame.width(), frame.height()))
            .unwrap_or((0, 0));
        Ok(SourceInfo {
            width,
            height,
            fps: self.fps,
            total_frames: self.total,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            anyhow::bail!("memory source read before open");
        }
        Ok(self.pending.pop_front())
    }

    fn close(&mut self) {
        self.open = false;
    }
}
