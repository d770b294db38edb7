//! Learned detector adapter.
//!
//! Wraps a pre-trained object-detection model behind `FrameDetector`. The model
//! artifact is loaded once and reused for every frame and every run.
//!
//! Loading never aborts analysis:
//! - a missing custom model falls back to the generic baseline model (degraded
//!   mode, logged as a warning)
//! - a load failure is reported as `false` from `load()`; `detect` retries the
//!   load lazily and yields no detections while the model is unavailable

#[cfg(feature = "backend-tract")]
mod tract;

#[cfg(feature = "backend-tract")]
pub use tract::TractModel;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;
use crate::detect::backend::FrameDetector;
use crate::detect::result::{BoundingBox, Detection, DetectionMethod, HazardClass};
use crate::error::HazardError;
use crate::frame::Frame;

/// Raw model output for one object, in source-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A loaded inference runtime.
///
/// Implementations return every candidate at or above `confidence_threshold`;
/// box coordinates are in the pixel space of `frame`. The numeric contract is
/// the same whatever device the runtime uses.
pub trait InferenceModel: Send {
    /// Runtime identifier, e.g. "tract-cpu".
    fn backend(&self) -> &'static str;

    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<RawDetection>>;
}

/// Builds a model from an artifact path.
pub type ModelLoader =
    Box<dyn Fn(&Path, &ModelSettings) -> Result<Box<dyn InferenceModel>> + Send>;

pub struct LearnedDetector {
    settings: ModelSettings,
    loader: ModelLoader,
    model: Option<Box<dyn InferenceModel>>,
    load_failures: u32,
}

impl LearnedDetector {
    /// Adapter using the inference backend compiled into this build.
    pub fn new(settings: ModelSettings) -> Self {
        Self::with_loader(settings, Box::new(default_loader))
    }

    pub fn with_loader(settings: ModelSettings, loader: ModelLoader) -> Self {
        Self {
            settings,
            loader,
            model: None,
            load_failures: 0,
        }
    }

    /// Adapter around an already-loaded model.
    pub fn with_model(settings: ModelSettings, model: Box<dyn InferenceModel>) -> Self {
        let mut detector = Self::new(settings);
        detector.model = Some(model);
        detector
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Load the model artifact. Returns whether a model is available.
    pub fn load(&mut self) -> bool {
        if self.model.is_some() {
            return true;
        }
        let path = self.resolve_model_path();
        match (self.loader)(&path, &self.settings) {
            Ok(model) => {
                log::info!(
                    "hazard model loaded from {} ({})",
                    path.display(),
                    model.backend()
                );
                self.model = Some(model);
                self.load_failures = 0;
                true
            }
            Err(err) => {
                self.load_failures += 1;
                let failure = HazardError::ModelLoadFailure(format!(
                    "{}: {:#}",
                    path.display(),
                    err
                ));
                if self.load_failures == 1 {
                    log::error!("{}; continuing with heuristics only", failure);
                } else {
                    log::debug!("{} (attempt {})", failure, self.load_failures);
                }
                false
            }
        }
    }

    /// Run the model on a frame.
    ///
    /// Loads lazily; when no model can be loaded the result is empty rather
    /// than an error. Inference failures on a loaded model are returned.
    pub fn detect_raw(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        if !self.load() {
            return Ok(Vec::new());
        }
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| anyhow!("model missing after load"))?;
        let candidates = model
            .infer(frame, confidence_threshold)?
            .into_iter()
            .filter(|c| c.confidence >= confidence_threshold)
            .map(|c| RawDetection {
                bbox: c.bbox.clamp_to(frame.width(), frame.height()),
                ..c
            })
            .collect();
        Ok(non_max_suppression(candidates, self.settings.nms_threshold))
    }

    fn resolve_model_path(&self) -> PathBuf {
        if self.settings.path.exists() {
            return self.settings.path.clone();
        }
        if self.load_failures == 0 {
            log::warn!(
                "custom model not found at {}, using baseline model {} (degraded mode)",
                self.settings.path.display(),
                self.settings.fallback_path.display()
            );
        }
        self.settings.fallback_path.clone()
    }
}

impl FrameDetector for LearnedDetector {
    fn name(&self) -> &'static str {
        "learned_model"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::LearnedModel
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        let threshold = self.settings.confidence_threshold;
        Ok(self
            .detect_raw(frame, threshold)?
            .into_iter()
            .map(|raw| {
                Detection::new(
                    frame_index,
                    HazardClass::from_class_id(raw.class_id),
                    raw.confidence,
                    raw.bbox,
                    DetectionMethod::LearnedModel,
                )
            })
            .collect())
    }

    fn warm_up(&mut self) -> Result<()> {
        self.load();
        Ok(())
    }
}

#[cfg(feature = "backend-tract")]
fn default_loader(path: &Path, settings: &ModelSettings) -> Result<Box<dyn InferenceModel>> {
    Ok(Box::new(TractModel::load(path, settings.input_size)?))
}

#[cfg(not(feature = "backend-tract"))]
fn default_loader(path: &Path, _settings: &ModelSettings) -> Result<Box<dyn InferenceModel>> {
    Err(anyhow!(
        "no inference backend compiled in (enable the backend-tract feature to load {})",
        path.display()
    ))
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
