use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::OutputSink;
use crate::frame::Frame;

const MANIFEST_NAME: &str = "sequence.json";

/// Written next to the frames on close so players can reassemble the video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
    pub pattern: String,
}

/// Writes each frame as `frame_NNNNNN.png` into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    geometry: Option<(u32, u32, f64)>,
    written: u64,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            geometry: None,
            written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", number))
    }
}

impl OutputSink for ImageSequenceSink {
    fn open(&mut self, width: u32, height: u32, fps: f64) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot render a {}x{} output", width, height));
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output directory {}", self.dir.display()))?;
        self.geometry = Some((width, height, fps));
        self.written = 0;
        log::info!(
            "output sink: rendering {}x{} @ {:.2} fps into {}",
            width,
            height,
            fps,
            self.dir.display()
        );
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let Some((width, height, _)) = self.geometry else {
            return Err(anyhow!("output sink written before open"));
        };
        if (frame.width(), frame.height()) != (width, height) {
            return Err(anyhow!(
                "frame is {}x{}, output is {}x{}",
                frame.width(),
                frame.height(),
                width,
                height
            ));
        }
        let path = self.frame_path(self.written + 1);
        frame
            .image()
            .save(&path)
            .with_context(|| format!("write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some((width, height, fps)) = self.geometry.take() else {
            return Ok(());
        };
        let manifest = SequenceManifest {
            width,
            height,
            fps,
            frames: self.written,
            pattern: "frame_%06d.png".to_string(),
        };
        let path = self.dir.join(MANIFEST_NAME);
        let body = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_numbered_frames_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let mut sink = ImageSequenceSink::new(&out);

        sink.open(8, 6, 25.0).unwrap();
        sink.write(&Frame::filled(8, 6, [0, 0, 0])).unwrap();
        sink.write(&Frame::filled(8, 6, [5, 5, 5])).unwrap();
        sink.close().unwrap();

        assert!(out.join("frame_000001.png").is_file());
        assert!(out.join("frame_000002.png").is_file());
        let manifest: SequenceManifest =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_NAME)).unwrap())
                .unwrap();
        assert_eq!(manifest.frames, 2);
        assert_eq!((manifest.width, manifest.height), (8, 6));
    }

    #[test]
    fn rejects_mismatched_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path());
        assert!(sink.write(&Frame::filled(8, 6, [0, 0, 0])).is_err());
        sink.open(8, 6, 25.0).unwrap();
        assert!(sink.write(&Frame::filled(4, 4, [0, 0, 0])).is_err());
    }
}
