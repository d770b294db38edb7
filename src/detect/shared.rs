use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::backend::FrameDetector;
use crate::detect::result::{Detection, DetectionMethod};
use crate::frame::Frame;

/// A detector shared between several analyzers.
///
/// The inner detector is wrapped in a `Mutex` because `FrameDetector::detect`
/// takes `&mut self`; concurrent pipelines serialize on it. Use this to reuse
/// one loaded model across runs instead of loading it per worker.
pub struct SharedDetector<D: FrameDetector> {
    inner: Arc<Mutex<D>>,
    name: &'static str,
    method: DetectionMethod,
}

impl<D: FrameDetector> SharedDetector<D> {
    pub fn new(detector: D) -> Self {
        let name = detector.name();
        let method = detector.method();
        Self {
            inner: Arc::new(Mutex::new(detector)),
            name,
            method,
        }
    }

    /// Run a closure with exclusive access to the inner detector.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("shared detector '{}' lock poisoned", self.name))?;
        Ok(f(&mut guard))
    }
}

impl<D: FrameDetector> Clone for SharedDetector<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: self.name,
            method: self.method,
        }
    }
}

impl<D: FrameDetector> FrameDetector for SharedDetector<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> DetectionMethod {
        self.method
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        self.with(|detector| detector.detect(frame, frame_index))?
    }

    fn warm_up(&mut self) -> Result<()> {
        self.with(|detector| detector.warm_up())?
    }
}
