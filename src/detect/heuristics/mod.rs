//! Rule-based hazard detectors.
//!
//! Each heuristic works on a single frame with no temporal state:
//! 1. colour or intensity transform
//! 2. binary mask by range test or threshold
//! 3. morphological close-then-open to drop speckle
//! 4. external contour extraction
//! 5. area-based confidence, emitted only above a cutoff
//!
//! They need no training data and are deliberately coarse. Bounding boxes are
//! the axis-aligned rectangle of each contour.

mod fire;
mod oil;
mod smoke;

pub use fire::FireDetector;
pub use oil::OilLeakDetector;
pub use smoke::SmokeDetector;

use crate::detect::result::{BoundingBox, Detection, DetectionMethod, HazardClass};
use crate::frame::Frame;
use crate::imaging::Blob;

/// Area-to-confidence rule shared by the heuristics.
///
/// A contour qualifies when its area exceeds `min_area`; its confidence is
/// `min(max_confidence, area / area_divisor)` and it is emitted only when that
/// confidence exceeds `emit_cutoff`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaScoring {
    pub min_area: f64,
    pub area_divisor: f64,
    pub max_confidence: f32,
    pub emit_cutoff: f32,
}

impl AreaScoring {
    pub fn score(&self, area: f64) -> Option<f32> {
        if area <= self.min_area || self.area_divisor <= 0.0 {
            return None;
        }
        let confidence = ((area / self.area_divisor) as f32).min(self.max_confidence);
        (confidence > self.emit_cutoff).then_some(confidence)
    }
}

/// Turn scored blobs into detections with boxes clamped to the frame.
pub(crate) fn blobs_to_detections(
    blobs: impl IntoIterator<Item = Blob>,
    scoring: &AreaScoring,
    frame: &Frame,
    frame_index: u64,
    hazard_class: HazardClass,
    method: DetectionMethod,
) -> Vec<Detection> {
    blobs
        .into_iter()
        .filter_map(|blob| {
            let confidence = scoring.score(blob.area)?;
            let bbox = BoundingBox::from_rect(blob.x, blob.y, blob.width, blob.height)
                .clamp_to(frame.width(), frame.height());
            Some(Detection::new(
                frame_index,
                hazard_class,
                confidence,
                bbox,
                method,
            ))
        })
        .collect()
}
