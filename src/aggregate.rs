//! Reduction of raw detections into a per-video result.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{Detection, HazardClass};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassSummary {
    pub count: usize,
    pub max_confidence: f32,
    /// Arithmetic mean over every detection of the class.
    pub avg_confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_detections: usize,
    /// Detections whose confidence is strictly above the alert threshold.
    pub high_confidence_detections: usize,
    /// Only classes with at least one detection appear.
    pub detection_types: BTreeMap<HazardClass, ClassSummary>,
}

/// Outcome of one pipeline run. Built once by `ResultAggregator::aggregate`
/// and read-only afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct VideoAnalysisResult {
    detections: Vec<Detection>,
    analysis_time_seconds: f64,
    processed_video_path: Option<PathBuf>,
    summary: AnalysisSummary,
}

impl VideoAnalysisResult {
    /// Discovery order: by sampled frame, then detector order.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn analysis_time_seconds(&self) -> f64 {
        self.analysis_time_seconds
    }

    pub fn processed_video_path(&self) -> Option<&Path> {
        self.processed_video_path.as_deref()
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResultAggregator {
    alert_threshold: f32,
}

impl ResultAggregator {
    pub fn new(alert_threshold: f32) -> Self {
        Self { alert_threshold }
    }

    pub fn alert_threshold(&self) -> f32 {
        self.alert_threshold
    }

    pub fn aggregate(
        &self,
        detections: Vec<Detection>,
        elapsed: Duration,
        output_path: Option<PathBuf>,
    ) -> VideoAnalysisResult {
        let summary = self.summarize(&detections);
        VideoAnalysisResult {
            detections,
            analysis_time_seconds: elapsed.as_secs_f64(),
            processed_video_path: output_path,
            summary,
        }
    }

    pub fn summarize(&self, detections: &[Detection]) -> AnalysisSummary {
        let high_confidence_detections = detections
            .iter()
            .filter(|d| d.confidence() > self.alert_threshold)
            .count();

        // First pass: count and max per class.
        let mut detection_types: BTreeMap<HazardClass, ClassSummary> = BTreeMap::new();
        for detection in detections {
            let entry = detection_types
                .entry(detection.hazard_class())
                .or_insert(ClassSummary {
                    count: 0,
                    max_confidence: f32::MIN,
                    avg_confidence: 0.0,
                });
            entry.count += 1;
            entry.max_confidence = entry.max_confidence.max(detection.confidence());
        }

        // Second pass: mean recomputed from the full list.
        for (class, summary) in detection_types.iter_mut() {
            let sum: f64 = detections
                .iter()
                .filter(|d| d.hazard_class() == *class)
                .map(|d| d.confidence() as f64)
                .sum();
            summary.avg_confidence = (sum / summary.count as f64) as f32;
        }

        AnalysisSummary {
            total_detections: detections.len(),
            high_confidence_detections,
            detection_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, DetectionMethod};

    fn det(class: HazardClass, confidence: f32) -> Detection {
        Detection::new(
            5,
            class,
            confidence,
            BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            DetectionMethod::HeuristicColor,
        )
    }

    #[test]
    fn average_is_exact_mean_regardless_of_order() {
        let aggregator = ResultAggregator::new(0.8);
        let forward = aggregator.summarize(&[det(HazardClass::Fire, 0.3), det(HazardClass::Fire, 0.9)]);
        let reverse = aggregator.summarize(&[det(HazardClass::Fire, 0.9), det(HazardClass::Fire, 0.3)]);

        let fire = &forward.detection_types[&HazardClass::Fire];
        assert!((fire.avg_confidence - 0.6).abs() < 1e-6);
        assert_eq!(fire.max_confidence, 0.9);
        assert_eq!(fire.count, 2);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn counts_are_consistent() {
        let aggregator = ResultAggregator::new(0.8);
        let detections = vec![
            det(HazardClass::OilLeak, 0.9),
            det(HazardClass::OilLeak, 0.8),
            det(HazardClass::Smoke, 0.25),
            det(HazardClass::Unknown(42), 0.95),
        ];

        let result = aggregator.aggregate(detections, Duration::from_millis(1500), None);
        let summary = result.summary();

        assert_eq!(summary.total_detections, 4);
        let per_class: usize = summary.detection_types.values().map(|c| c.count).sum();
        assert_eq!(per_class, summary.total_detections);
        assert!(summary.detection_types.values().all(|c| c.count > 0));
        // 0.8 is not above the threshold.
        assert_eq!(summary.high_confidence_detections, 2);
        assert_eq!(result.analysis_time_seconds(), 1.5);
        assert!(result.processed_video_path().is_none());
    }

    #[test]
    fn empty_input_produces_empty_summary() {
        let result = ResultAggregator::new(0.8).aggregate(Vec::new(), Duration::ZERO, None);
        assert_eq!(result.summary().total_detections, 0);
        assert!(result.summary().detection_types.is_empty());
    }

    #[test]
    fn serializes_class_keys_by_name() {
        let result = ResultAggregator::new(0.8).aggregate(
            vec![det(HazardClass::GasLeak, 0.5)],
            Duration::from_secs(2),
            Some(PathBuf::from("processed/run")),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["summary"]["detection_types"]["gas_leak"]["count"],
            serde_json::json!(1)
        );
        assert_eq!(json["processed_video_path"], serde_json::json!("processed/run"));
    }
}
