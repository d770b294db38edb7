//! Operator-facing text for a finished analysis.
//!
//! Notification channels cap message length, so the caption lists only the
//! first few detections and is truncated to `CAPTION_LIMIT` characters.

use std::fmt::Write as _;

use crate::aggregate::VideoAnalysisResult;

pub const CAPTION_LIMIT: usize = 1024;
const CAPTION_DETECTIONS: usize = 5;
const TRUNCATION_MARK: &str = "...";

/// Short summary suitable as a message or video caption. `None` means the
/// run produced no result and is reported as a failure, not as a clean video.
pub fn caption(result: Option<&VideoAnalysisResult>, alert_threshold: f32) -> String {
    let Some(result) = result else {
        return "Analysis failed: no result was produced".to_string();
    };
    let summary = result.summary();
    let mut text = String::from("Hazard analysis results\n");
    let _ = writeln!(
        text,
        "Total: {} | High risk: {}",
        summary.total_detections, summary.high_confidence_detections
    );
    let _ = write!(text, "Time: {:.2}s", result.analysis_time_seconds());
    if summary.total_detections == 0 {
        text.push_str("\nNo hazards detected");
    }
    for detection in result.detections().iter().take(CAPTION_DETECTIONS) {
        let mark = if detection.confidence() > alert_threshold {
            "[ALERT]"
        } else {
            "[info]"
        };
        let _ = write!(
            text,
            "\n{} {} ({:.2}) frame {}",
            mark,
            detection.hazard_class(),
            detection.confidence(),
            detection.frame_index()
        );
    }
    truncate(text, CAPTION_LIMIT)
}

/// One line per hazard class with count, max and average confidence. Empty
/// when there are no detections.
pub fn breakdown(result: &VideoAnalysisResult) -> String {
    let types = &result.summary().detection_types;
    if types.is_empty() {
        return String::new();
    }
    let mut text = String::from("Breakdown by type:");
    for (class, info) in types {
        let _ = write!(
            text,
            "\n- {}: {} (max {:.2}, avg {:.2})",
            class, info.count, info.max_confidence, info.avg_confidence
        );
    }
    text
}

fn truncate(text: String, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    let keep = limit.saturating_sub(TRUNCATION_MARK.len());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(TRUNCATION_MARK);
    cut
}
