use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Still images in a directory, read in file-name order.
pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: f64,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            dir: dir.into(),
            fps,
            files: Vec::new(),
            cursor: 0,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn open(&mut self) -> Result<SourceInfo> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read image directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        let (width, height) = match files.first() {
            Some(first) => image::image_dimensions(first)
                .with_context(|| format!("read image header {}", first.display()))?,
            None => (0, 0),
        };
        log::info!(
            "frame source: {} images in {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.cursor = 0;
        Ok(SourceInfo {
            width,
            height,
            fps: self.fps,
            total_frames: self.files.len() as u64,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let image = image::open(path)
            .map_err(|e| anyhow!("decode image {}: {}", path.display(), e))?
            .to_rgb8();
        Ok(Some(Frame::new(image)))
    }

    fn close(&mut self) {
        self.files.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_images_sorted_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        Frame::filled(6, 4, [9, 9, 9])
            .image()
            .save(dir.path().join("b.png"))
            .unwrap();
        Frame::filled(6, 4, [1, 1, 1])
            .image()
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::new(dir.path(), 12.0);
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height, info.total_frames), (6, 4, 2));
        assert_eq!(info.fps, 12.0);

        let first = source.read_next().unwrap().unwrap();
        assert_eq!(first.image().get_pixel(0, 0).0, [1, 1, 1]);
        assert!(source.read_next().unwrap().is_some());
        assert!(source.read_next().unwrap().is_none());
        source.close();
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(dir.path().join("absent"), 30.0);
        assert!(source.open().is_err());
    }
}
