//! Frame sources.
//!
//! A source yields decoded RGB frames in order and reports the stream's
//! geometry when opened:
//! - `MemorySource`: frames already in memory (snapshots, tests)
//! - `SyntheticSource`: scripted `stub://` scene for demos and tests
//! - `ImageSequenceSource`: a directory of still images
//! - `FfmpegFileSource`: local video files (feature: ingest-file-ffmpeg)
//!
//! Ingestion is local-only. Locations with a URL scheme other than `stub://`
//! are rejected by `open_source`.

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
mod images;
mod memory;
mod synthetic;

#[cfg(feature = "ingest-file-ffmpeg")]
pub use file_ffmpeg::FfmpegFileSource;
pub use images::ImageSequenceSource;
pub use memory::MemorySource;
pub use synthetic::SyntheticSource;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::HazardConfig;
use crate::frame::Frame;

/// Stream geometry reported by `FrameSource::open`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Zero when the container does not report a frame count.
    pub total_frames: u64,
}

/// Ordered producer of frames, exclusively owned by one pipeline run.
pub trait FrameSource {
    /// Human-readable location for log lines.
    fn describe(&self) -> String;

    fn open(&mut self) -> Result<SourceInfo>;

    /// `Ok(None)` marks end of stream.
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Release handles. Must be safe to call more than once.
    fn close(&mut self);
}

/// Pick a source for `location`: `stub://<name>`, a directory of images, or a
/// local video file.
pub fn open_source(location: &str, config: &HazardConfig) -> Result<Box<dyn FrameSource>> {
    if !is_local_location(location) {
        return Err(anyhow!(
            "frame ingestion only supports local paths (no URL schemes): {}",
            location
        ));
    }
    if let Some(name) = location.strip_prefix(synthetic::SCHEME) {
        return Ok(Box::new(SyntheticSource::new(name)));
    }
    let path = Path::new(location);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::new(
            path,
            config.ingest.image_fps,
        )));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(Box::new(FfmpegFileSource::new(path)))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(anyhow!(
            "video file ingestion requires the ingest-file-ffmpeg feature: {}",
            location
        ))
    }
}

fn is_local_location(location: &str) -> bool {
    if location.trim().is_empty() {
        return false;
    }
    if location.starts_with(synthetic::SCHEME) {
        return true;
    }
    !location.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_locations_are_rejected() {
        let config = HazardConfig::default();
        for location in ["rtsp://camera/stream", "https://host/video.mp4", "  "] {
            let err = open_source(location, &config).err();
            assert!(err.is_some(), "{location} should be rejected");
        }
    }

    #[test]
    fn stub_scheme_opens_synthetic_scene() {
        let mut source = open_source("stub://yard", &HazardConfig::default()).unwrap();
        assert_eq!(source.describe(), "stub://yard");
        let info = source.open().unwrap();
        assert!(info.total_frames > 0);
        assert!(source.read_next().unwrap().is_some());
        source.close();
    }

    #[test]
    fn directories_open_as_image_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().to_string_lossy().into_owned();
        let source = open_source(&location, &HazardConfig::default()).unwrap();
        assert!(source.describe().contains(&location));
    }
}
