//! Hazard Scan
//!
//! This crate analyzes video from fixed industrial cameras for hazards such as
//! oil leaks, fire and smoke, and reduces the findings to a per-video report.
//!
//! # Architecture
//!
//! Data flows strictly downward:
//!
//! 1. **Detectors** map one frame to candidate detections: a learned model
//!    adapter plus colour and texture heuristics (`detect`).
//! 2. **Frame analyzer** runs the detectors in a fixed order and concatenates
//!    their output without cross-detector suppression (`analyzer`).
//! 3. **Pipeline** drives a frame source, analyzes every fifth frame, renders
//!    annotated frames to an optional sink and collects detections (`pipeline`).
//! 4. **Aggregator** reduces the detections into a per-class summary
//!    (`aggregate`).
//!
//! # Module Structure
//!
//! - `frame`, `imaging`: raster frames and the image operations heuristics use
//! - `ingest`, `sink`: frame sources and annotated-frame outputs
//! - `annotate`: boxes, labels and the frame counter overlay
//! - `report`: operator-facing text for a finished result
//! - `config`, `error`: settings and the failure taxonomy

pub mod aggregate;
pub mod analyzer;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod imaging;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod sink;

pub use aggregate::{AnalysisSummary, ClassSummary, ResultAggregator, VideoAnalysisResult};
pub use analyzer::FrameAnalyzer;
pub use annotate::Annotator;
pub use config::{HazardConfig, ModelSettings};
pub use detect::{
    BoundingBox, Detection, DetectionMethod, FireDetector, FrameDetector, HazardClass,
    LearnedDetector, OilLeakDetector, SharedDetector, SmokeDetector,
};
pub use error::HazardError;
pub use frame::Frame;
pub use ingest::{
    open_source, FrameSource, ImageSequenceSource, MemorySource, SourceInfo, SyntheticSource,
};
pub use pipeline::{HazardPipeline, Progress};
pub use sink::{ImageSequenceSink, OutputSink};
#[cfg(feature = "render-ffmpeg")]
pub use sink::VideoFileSink;
