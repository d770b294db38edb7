use anyhow::{anyhow, Result};

use super::{blobs_to_detections, AreaScoring};
use crate::detect::backend::FrameDetector;
use crate::detect::result::{Detection, DetectionMethod, HazardClass};
use crate::frame::Frame;
use crate::imaging;

/// Saturated, bright red-orange regions.
///
/// Red sits at both ends of the hue circle, so two hue ranges are tested and
/// OR-combined.
#[derive(Clone, Debug)]
pub struct FireDetector {
    pub hsv_ranges: [([u8; 3], [u8; 3]); 2],
    pub morph_radius: u8,
    pub scoring: AreaScoring,
}

impl Default for FireDetector {
    fn default() -> Self {
        Self {
            hsv_ranges: [
                ([0, 120, 70], [10, 255, 255]),
                ([170, 120, 70], [180, 255, 255]),
            ],
            morph_radius: 1,
            scoring: AreaScoring {
                min_area: 300.0,
                area_divisor: 5_000.0,
                max_confidence: 0.8,
                emit_cutoff: 0.4,
            },
        }
    }
}

impl FrameDetector for FireDetector {
    fn name(&self) -> &'static str {
        "fire_heuristic"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::HeuristicColor
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        if frame.is_empty() {
            return Err(anyhow!("empty frame"));
        }
        let hsv = imaging::to_hsv(frame.image());
        let [(lo_a, hi_a), (lo_b, hi_b)] = self.hsv_ranges;
        let mask = imaging::union(
            &imaging::in_range(&hsv, lo_a, hi_a),
            &imaging::in_range(&hsv, lo_b, hi_b),
        );
        let mask = imaging::close_then_open(&mask, self.morph_radius);

        Ok(blobs_to_detections(
            imaging::external_blobs(&mask),
            &self.scoring,
            frame,
            frame_index,
            HazardClass::Fire,
            self.method(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_square_is_fire_at_capped_confidence() {
        let mut frame = Frame::filled(640, 480, [0, 0, 0]);
        frame.fill_rect(200, 150, 100, 100, [255, 0, 0]);

        let detections = FireDetector::default().detect(&frame, 10).unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.hazard_class(), HazardClass::Fire);
        assert_eq!(det.confidence(), 0.8);
        let bbox = det.bounding_box();
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (200.0, 150.0, 300.0, 250.0));
    }

    #[test]
    fn flame_in_frame_corner_is_detected() {
        let mut frame = Frame::filled(640, 480, [0, 0, 0]);
        frame.fill_rect(0, 0, 100, 100, [255, 0, 0]);

        let detections = FireDetector::default().detect(&frame, 0).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.8);
        let bbox = detections[0].bounding_box();
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn wraparound_hue_is_detected() {
        // Hue ~175 (magenta-red side of the circle).
        let mut frame = Frame::filled(300, 300, [0, 0, 0]);
        frame.fill_rect(50, 50, 80, 80, [255, 0, 40]);

        let detections = FireDetector::default().detect(&frame, 0).unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn desaturated_red_is_ignored() {
        let mut frame = Frame::filled(300, 300, [0, 0, 0]);
        frame.fill_rect(50, 50, 80, 80, [200, 150, 150]);

        let detections = FireDetector::default().detect(&frame, 0).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn small_red_region_is_below_cutoff() {
        // 30x30 -> area ~841 -> confidence ~0.17, under the 0.4 cutoff.
        let mut frame = Frame::filled(300, 300, [0, 0, 0]);
        frame.fill_rect(50, 50, 30, 30, [255, 0, 0]);

        let detections = FireDetector::default().detect(&frame, 0).unwrap();
        assert!(detections.is_empty());
    }
}
