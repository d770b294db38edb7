use anyhow::{anyhow, Result};

use super::{blobs_to_detections, AreaScoring};
use crate::detect::backend::FrameDetector;
use crate::detect::result::{Detection, DetectionMethod, HazardClass};
use crate::frame::Frame;
use crate::imaging;

/// Dark, unsaturated patches: pooled oil on concrete or metal.
#[derive(Clone, Debug)]
pub struct OilLeakDetector {
    /// Inclusive HSV lower bound of the oil mask.
    pub hsv_lower: [u8; 3],
    /// Inclusive HSV upper bound of the oil mask.
    pub hsv_upper: [u8; 3],
    pub morph_radius: u8,
    pub scoring: AreaScoring,
    /// Drop regions whose bounding box spans the entire frame: that is
    /// scene-wide darkness (night, lens cap), not a leak.
    pub reject_frame_spanning: bool,
}

impl Default for OilLeakDetector {
    fn default() -> Self {
        Self {
            hsv_lower: [0, 0, 0],
            hsv_upper: [180, 100, 80],
            morph_radius: 2,
            scoring: AreaScoring {
                min_area: 500.0,
                area_divisor: 10_000.0,
                max_confidence: 0.9,
                emit_cutoff: 0.3,
            },
            reject_frame_spanning: true,
        }
    }
}

impl FrameDetector for OilLeakDetector {
    fn name(&self) -> &'static str {
        "oil_leak_heuristic"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::HeuristicColor
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        if frame.is_empty() {
            return Err(anyhow!("empty frame"));
        }
        let hsv = imaging::to_hsv(frame.image());
        let mask = imaging::in_range(&hsv, self.hsv_lower, self.hsv_upper);
        let mask = imaging::close_then_open(&mask, self.morph_radius);

        let (width, height) = (frame.width(), frame.height());
        let blobs = imaging::external_blobs(&mask)
            .into_iter()
            .filter(|blob| !(self.reject_frame_spanning && blob.spans(width, height)));

        Ok(blobs_to_detections(
            blobs,
            &self.scoring,
            frame,
            frame_index,
            HazardClass::OilLeak,
            self.method(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_black_frame_yields_nothing() {
        let frame = Frame::filled(640, 480, [0, 0, 0]);
        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn bright_frame_yields_nothing() {
        let frame = Frame::filled(640, 480, [230, 230, 230]);
        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn dark_patch_yields_one_area_scored_detection() {
        let mut frame = Frame::filled(640, 480, [220, 220, 220]);
        frame.fill_rect(100, 100, 61, 61, [20, 20, 20]);

        let detections = OilLeakDetector::default().detect(&frame, 7).unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.hazard_class(), HazardClass::OilLeak);
        assert_eq!(det.frame_index(), 7);
        assert_eq!(det.detection_method(), DetectionMethod::HeuristicColor);
        // 60x60 contour polygon minus the corners rounded off by opening.
        assert!(
            det.confidence() > 0.355 && det.confidence() <= 0.36,
            "confidence {}",
            det.confidence()
        );
        let bbox = det.bounding_box();
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (100.0, 100.0, 161.0, 161.0));
    }

    #[test]
    fn large_dark_patch_saturates_at_max_confidence() {
        let mut frame = Frame::filled(640, 480, [220, 220, 220]);
        frame.fill_rect(50, 50, 200, 150, [10, 10, 10]);

        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.9);
    }

    #[test]
    fn near_frame_filling_patch_is_one_detection() {
        let mut frame = Frame::filled(640, 480, [220, 220, 220]);
        frame.fill_rect(10, 10, 620, 460, [15, 15, 15]);

        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.9);
    }

    #[test]
    fn patch_on_three_borders_is_still_a_leak() {
        let mut frame = Frame::filled(640, 480, [220, 220, 220]);
        frame.fill_rect(0, 0, 600, 480, [15, 15, 15]);

        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();

        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bounding_box();
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (0.0, 0.0, 600.0, 480.0));
    }

    #[test]
    fn small_patch_below_min_area_is_ignored() {
        let mut frame = Frame::filled(200, 200, [220, 220, 220]);
        frame.fill_rect(20, 20, 15, 15, [0, 0, 0]);

        let detections = OilLeakDetector::default().detect(&frame, 0).unwrap();
        assert!(detections.is_empty());
    }
}
