//! Video analysis pipeline.
//!
//! One run pulls frames from a source in order, analyzes every fifth frame,
//! optionally renders annotated frames to a sink, and hands the collected
//! detections to the aggregator. Everything happens on the caller's thread.
//! Cancellation is a flag checked between frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::aggregate::{ResultAggregator, VideoAnalysisResult};
use crate::analyzer::FrameAnalyzer;
use crate::annotate::Annotator;
use crate::config::HazardConfig;
use crate::detect::Detection;
use crate::error::HazardError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceInfo};
use crate::sink::OutputSink;

/// Full detection runs on frames whose 1-based counter is a multiple of this.
pub const SAMPLE_INTERVAL: u64 = 5;
/// Progress is reported every this many frames.
pub const PROGRESS_INTERVAL: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub frames_read: u64,
    /// Zero when the source did not report a frame count.
    pub total_frames: u64,
}

impl Progress {
    pub fn percent(&self) -> Option<f64> {
        (self.total_frames > 0).then(|| self.frames_read as f64 * 100.0 / self.total_frames as f64)
    }
}

pub type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

pub struct HazardPipeline {
    analyzer: FrameAnalyzer,
    annotator: Annotator,
    aggregator: ResultAggregator,
    cancel: Arc<AtomicBool>,
    on_progress: Option<ProgressCallback>,
}

struct RunState {
    detections: Vec<Detection>,
    frames_read: u64,
    rendering: bool,
}

impl HazardPipeline {
    pub fn new(analyzer: FrameAnalyzer, aggregator: ResultAggregator) -> Self {
        Self {
            analyzer,
            annotator: Annotator::default(),
            aggregator,
            cancel: Arc::new(AtomicBool::new(false)),
            on_progress: None,
        }
    }

    /// Standard analyzer and aggregator built from `config`.
    pub fn from_config(config: &HazardConfig) -> Self {
        Self::new(
            FrameAnalyzer::from_config(config),
            ResultAggregator::new(config.alert_threshold),
        )
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Share an externally owned cancellation flag (e.g. set by a signal handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(Progress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn analyzer_mut(&mut self) -> &mut FrameAnalyzer {
        &mut self.analyzer
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    /// One-off analysis of a single frame, reported as frame index 0.
    pub fn analyze_frame(&mut self, frame: &Frame) -> Vec<Detection> {
        self.analyzer.analyze_frame(frame, 0)
    }

    /// Analyze a whole stream. Fails only when the source cannot be opened or
    /// its first read fails, or when the run is cancelled. Source and sink are
    /// closed on every path.
    pub fn analyze_video(
        &mut self,
        source: &mut dyn FrameSource,
        sink: Option<&mut dyn OutputSink>,
    ) -> Result<VideoAnalysisResult, HazardError> {
        let started = Instant::now();
        let location = source.describe();

        let opened = source
            .open()
            .and_then(|info| source.read_next().map(|first| (info, first)));
        let (info, first) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                source.close();
                let failure = HazardError::source_unavailable(&err);
                log::error!("{}: {}", location, failure);
                return Err(failure);
            }
        };
        log::info!(
            "analyzing {} ({}x{} @ {:.2} fps, {} frames)",
            location,
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );

        let mut sink = sink;
        let rendering = match sink.as_deref_mut() {
            Some(out) => open_sink(out, &info, first.as_ref()),
            None => false,
        };
        let mut state = RunState {
            detections: Vec::new(),
            frames_read: 0,
            rendering,
        };

        let outcome = self.stream(source, first, &info, sink.as_deref_mut(), &mut state);
        source.close();

        let output_path = match sink {
            Some(out) if rendering => match out.close() {
                Ok(()) if state.rendering => out.location(),
                Ok(()) => None,
                Err(err) => {
                    log::warn!("{}", HazardError::sink_failure(&err));
                    None
                }
            },
            _ => None,
        };

        outcome?;
        let elapsed = started.elapsed();
        log::info!(
            "video analysis of {} completed in {:.2} seconds: {} frames, {} detections",
            location,
            elapsed.as_secs_f64(),
            state.frames_read,
            state.detections.len()
        );
        Ok(self
            .aggregator
            .aggregate(state.detections, elapsed, output_path))
    }

    fn stream(
        &mut self,
        source: &mut dyn FrameSource,
        first: Option<Frame>,
        info: &SourceInfo,
        mut sink: Option<&mut (dyn OutputSink + '_)>,
        state: &mut RunState,
    ) -> Result<(), HazardError> {
        let mut next = first;
        while let Some(frame) = next {
            if self.cancel.load(Ordering::SeqCst) {
                log::warn!("analysis cancelled after {} frames", state.frames_read);
                return Err(HazardError::Cancelled {
                    frames_read: state.frames_read,
                });
            }
            state.frames_read += 1;
            let counter = state.frames_read;

            let found = if counter % SAMPLE_INTERVAL == 0 {
                self.analyzer.analyze_frame(&frame, counter)
            } else {
                Vec::new()
            };

            if state.rendering {
                if let Some(out) = sink.as_deref_mut() {
                    let mut canvas = frame;
                    self.annotator.draw_detections(canvas.image_mut(), &found);
                    self.annotator
                        .draw_frame_counter(canvas.image_mut(), counter, info.total_frames);
                    if let Err(err) = out.write(&canvas) {
                        log::warn!(
                            "{}; rendering disabled at frame {}",
                            HazardError::sink_failure(&err),
                            counter
                        );
                        state.rendering = false;
                    }
                }
            }
            state.detections.extend(found);

            if counter % PROGRESS_INTERVAL == 0 {
                self.report_progress(Progress {
                    frames_read: counter,
                    total_frames: info.total_frames,
                });
            }

            next = match source.read_next() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!(
                        "frame source failed after {} frames, ending stream early: {:#}",
                        counter,
                        err
                    );
                    None
                }
            };
        }
        Ok(())
    }

    fn report_progress(&mut self, progress: Progress) {
        match progress.percent() {
            Some(percent) => log::info!(
                "progress: {:.1}% ({}/{})",
                percent,
                progress.frames_read,
                progress.total_frames
            ),
            None => log::info!("progress: {} frames", progress.frames_read),
        }
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }
}

/// Output geometry follows the source, falling back to the first frame when
/// the source reports none.
fn open_sink(sink: &mut (dyn OutputSink + '_), info: &SourceInfo, first: Option<&Frame>) -> bool {
    let (width, height) = match (info.width, info.height, first) {
        (0, _, Some(frame)) | (_, 0, Some(frame)) => (frame.width(), frame.height()),
        (width, height, _) => (width, height),
    };
    match sink.open(width, height, info.fps) {
        Ok(()) => true,
        Err(err) => {
            log::warn!(
                "{}; continuing without rendering",
                HazardError::sink_failure(&err)
            );
            false
        }
    }
}
