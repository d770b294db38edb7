use anyhow::{anyhow, Result};

use super::{blobs_to_detections, AreaScoring};
use crate::detect::backend::FrameDetector;
use crate::detect::result::{Detection, DetectionMethod, HazardClass};
use crate::frame::Frame;
use crate::imaging;

/// Low-texture haze.
///
/// Works from one frame only: the whole frame must look low-texture (global
/// Laplacian variance under the gate) before bright regions are searched.
/// There is no motion analysis.
#[derive(Clone, Debug)]
pub struct SmokeDetector {
    pub variance_gate: f64,
    pub intensity_threshold: u8,
    pub morph_radius: u8,
    pub scoring: AreaScoring,
}

impl Default for SmokeDetector {
    fn default() -> Self {
        Self {
            variance_gate: 100.0,
            intensity_threshold: 100,
            morph_radius: 1,
            scoring: AreaScoring {
                min_area: 1_000.0,
                area_divisor: 20_000.0,
                max_confidence: 0.7,
                emit_cutoff: 0.2,
            },
        }
    }
}

impl FrameDetector for SmokeDetector {
    fn name(&self) -> &'static str {
        "smoke_heuristic"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::HeuristicTexture
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        if frame.is_empty() {
            return Err(anyhow!("empty frame"));
        }
        let gray = imaging::to_gray(frame.image());
        let variance = imaging::laplacian_variance(&gray);
        if variance >= self.variance_gate {
            return Ok(Vec::new());
        }
        log::debug!(
            "smoke search on frame {} (laplacian variance {:.1})",
            frame_index,
            variance
        );

        let mask = imaging::threshold(&gray, self.intensity_threshold);
        let mask = imaging::close_then_open(&mask, self.morph_radius);

        Ok(blobs_to_detections(
            imaging::external_blobs(&mask),
            &self.scoring,
            frame,
            frame_index,
            HazardClass::Smoke,
            self.method(),
        ))
    }
}
