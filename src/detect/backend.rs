use anyhow::Result;

use crate::detect::result::{Detection, DetectionMethod};
use crate::frame::Frame;

/// A producer of hazard detections for a single frame.
///
/// Learned and heuristic detectors both implement this trait so the frame
/// analyzer can run them as one ordered list.
///
/// Implementations must not keep state derived from one frame that changes the
/// output for another: analyzing the same frame twice yields the same
/// detections apart from their timestamps.
pub trait FrameDetector: Send {
    /// Detector identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Method tag stamped on every detection this detector emits.
    fn method(&self) -> DetectionMethod;

    /// Run detection on a frame. `frame_index` is copied into each detection.
    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before a video run.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
