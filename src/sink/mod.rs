//! Annotated-frame outputs.
//!
//! - `ImageSequenceSink`: numbered PNG frames plus a manifest
//! - `VideoFileSink`: MPEG-4 video file (feature: render-ffmpeg)

mod images;
#[cfg(feature = "render-ffmpeg")]
mod video_ffmpeg;

pub use images::{ImageSequenceSink, SequenceManifest};
#[cfg(feature = "render-ffmpeg")]
pub use video_ffmpeg::VideoFileSink;

use anyhow::Result;
use std::path::PathBuf;

use crate::frame::Frame;

/// Destination for annotated frames, exclusively owned by one pipeline run.
pub trait OutputSink {
    fn open(&mut self, width: u32, height: u32, fps: f64) -> Result<()>;

    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Where the rendered output ends up, reported on the analysis result.
    fn location(&self) -> Option<PathBuf>;
}
