use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hazard_scan::{
    BoundingBox, Detection, DetectionMethod, Frame, FrameAnalyzer, FrameDetector, FrameSource,
    HazardClass, HazardError, HazardPipeline, ImageSequenceSink, MemorySource, OutputSink,
    ResultAggregator, SourceInfo, SyntheticSource,
};

/// Records the frame indices it was invoked on and reports one detection per call.
struct CountingDetector {
    calls: Arc<Mutex<Vec<u64>>>,
    cancel_at: Option<(u64, Arc<AtomicBool>)>,
}

impl FrameDetector for CountingDetector {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::LearnedModel
    }

    fn detect(&mut self, _frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        self.calls.lock().unwrap().push(frame_index);
        if let Some((at, flag)) = &self.cancel_at {
            if *at == frame_index {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(vec![Detection::new(
            frame_index,
            HazardClass::Worker,
            0.85,
            BoundingBox::new(1.0, 1.0, 4.0, 4.0),
            DetectionMethod::LearnedModel,
        )])
    }
}

fn counting_pipeline() -> (HazardPipeline, Arc<Mutex<Vec<u64>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let detector = CountingDetector {
        calls: Arc::clone(&calls),
        cancel_at: None,
    };
    let pipeline = HazardPipeline::new(
        FrameAnalyzer::new(vec![Box::new(detector)]),
        ResultAggregator::new(0.8),
    );
    (pipeline, calls)
}

fn frames(count: usize) -> Vec<Frame> {
    (0..count).map(|_| Frame::filled(16, 12, [90, 90, 90])).collect()
}

/// Scripted source that can fail at open, on a given read, and tracks closes.
struct ScriptedSource {
    fail_open: bool,
    fail_on_read: Option<u64>,
    frames: u64,
    reads: u64,
    closes: Arc<Mutex<u32>>,
}

impl ScriptedSource {
    fn new(frames: u64) -> (Self, Arc<Mutex<u32>>) {
        let closes = Arc::new(Mutex::new(0));
        (
            Self {
                fail_open: false,
                fail_on_read: None,
                frames,
                reads: 0,
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn open(&mut self) -> Result<SourceInfo> {
        if self.fail_open {
            return Err(anyhow!("device busy"));
        }
        Ok(SourceInfo {
            width: 16,
            height: 12,
            fps: 10.0,
            total_frames: self.frames,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        self.reads += 1;
        if self.fail_on_read == Some(self.reads) {
            return Err(anyhow!("corrupt packet"));
        }
        if self.reads > self.frames {
            return Ok(None);
        }
        Ok(Some(Frame::filled(16, 12, [0, 0, 0])))
    }

    fn close(&mut self) {
        *self.closes.lock().unwrap() += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    fail_open: bool,
    opened: Option<(u32, u32, f64)>,
    written: Vec<Frame>,
    closed: bool,
}

impl OutputSink for RecordingSink {
    fn open(&mut self, width: u32, height: u32, fps: f64) -> Result<()> {
        if self.fail_open {
            return Err(anyhow!("disk full"));
        }
        self.opened = Some((width, height, fps));
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        self.written.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(PathBuf::from("recorded"))
    }
}

#[test]
fn analyzer_runs_on_every_fifth_frame_only() {
    let (mut pipeline, calls) = counting_pipeline();
    let mut source = MemorySource::new(frames(23), 25.0);

    let result = pipeline.analyze_video(&mut source, None).expect("run");

    assert_eq!(*calls.lock().unwrap(), vec![5, 10, 15, 20]);
    let indices: Vec<u64> = result.detections().iter().map(|d| d.frame_index()).collect();
    assert_eq!(indices, vec![5, 10, 15, 20]);
    assert_eq!(result.summary().total_detections, 4);
    assert_eq!(result.summary().high_confidence_detections, 4);
    assert!(result.processed_video_path().is_none());
    assert!(!source.is_open());
}

#[test]
fn short_source_is_never_analyzed() {
    let (mut pipeline, calls) = counting_pipeline();
    let mut source = MemorySource::new(frames(4), 25.0);

    let result = pipeline.analyze_video(&mut source, None).expect("run");

    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(result.summary().total_detections, 0);
}

#[test]
fn empty_source_completes_with_no_detections() {
    let (mut pipeline, _) = counting_pipeline();
    let mut source = MemorySource::new(Vec::new(), 25.0);

    let result = pipeline.analyze_video(&mut source, None).expect("run");

    assert!(result.detections().is_empty());
    assert!(result.summary().detection_types.is_empty());
}

#[test]
fn unopenable_source_is_reported_not_raised() {
    let (mut pipeline, calls) = counting_pipeline();
    let (mut source, closes) = ScriptedSource::new(10);
    source.fail_open = true;

    let err = pipeline.analyze_video(&mut source, None).unwrap_err();

    assert!(matches!(err, HazardError::SourceUnavailable(_)));
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(*closes.lock().unwrap(), 1);
}

#[test]
fn first_read_failure_is_source_unavailable() {
    let (mut pipeline, _) = counting_pipeline();
    let (mut source, closes) = ScriptedSource::new(10);
    source.fail_on_read = Some(1);
    let mut sink = RecordingSink::default();

    let err = pipeline
        .analyze_video(&mut source, Some(&mut sink))
        .unwrap_err();

    assert!(matches!(err, HazardError::SourceUnavailable(_)));
    assert_eq!(*closes.lock().unwrap(), 1);
    assert!(sink.opened.is_none());
}

#[test]
fn mid_stream_read_failure_keeps_collected_detections() {
    let (mut pipeline, calls) = counting_pipeline();
    let (mut source, closes) = ScriptedSource::new(20);
    source.fail_on_read = Some(8);

    let result = pipeline.analyze_video(&mut source, None).expect("run");

    assert_eq!(*calls.lock().unwrap(), vec![5]);
    assert_eq!(result.summary().total_detections, 1);
    assert_eq!(*closes.lock().unwrap(), 1);
}

#[test]
fn every_frame_is_rendered_at_source_geometry() {
    let (mut pipeline, _) = counting_pipeline();
    let mut source = MemorySource::new(frames(12), 25.0);
    let mut sink = RecordingSink::default();

    let result = pipeline
        .analyze_video(&mut source, Some(&mut sink))
        .expect("run");

    assert_eq!(sink.opened, Some((16, 12, 25.0)));
    assert_eq!(sink.written.len(), 12);
    assert!(sink.closed);
    assert_eq!(
        result.processed_video_path(),
        Some(PathBuf::from("recorded").as_path())
    );
}

#[test]
fn sink_open_failure_disables_rendering_only() {
    let (mut pipeline, calls) = counting_pipeline();
    let mut source = MemorySource::new(frames(10), 25.0);
    let mut sink = RecordingSink {
        fail_open: true,
        ..Default::default()
    };

    let result = pipeline
        .analyze_video(&mut source, Some(&mut sink))
        .expect("run");

    assert_eq!(*calls.lock().unwrap(), vec![5, 10]);
    assert!(sink.written.is_empty());
    assert!(result.processed_video_path().is_none());
    assert_eq!(result.summary().total_detections, 2);
}

#[test]
fn cancellation_is_observed_between_frames() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let cancel = Arc::new(AtomicBool::new(false));
    let detector = CountingDetector {
        calls: Arc::clone(&calls),
        cancel_at: Some((10, Arc::clone(&cancel))),
    };
    let mut pipeline = HazardPipeline::new(
        FrameAnalyzer::new(vec![Box::new(detector)]),
        ResultAggregator::new(0.8),
    )
    .with_cancel_flag(cancel);
    let (mut source, closes) = ScriptedSource::new(50);
    let mut sink = RecordingSink::default();

    let err = pipeline
        .analyze_video(&mut source, Some(&mut sink))
        .unwrap_err();

    assert!(matches!(err, HazardError::Cancelled { frames_read: 10 }));
    assert_eq!(*calls.lock().unwrap(), vec![5, 10]);
    assert_eq!(*closes.lock().unwrap(), 1);
    assert!(sink.closed);
}

#[test]
fn progress_is_reported_every_hundred_frames() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let (pipeline, _) = counting_pipeline();
    let mut pipeline = pipeline.on_progress(move |p| recorder.lock().unwrap().push(p));
    let (mut source, _) = ScriptedSource::new(250);

    pipeline.analyze_video(&mut source, None).expect("run");

    let seen = seen.lock().unwrap();
    let frames_read: Vec<u64> = seen.iter().map(|p| p.frames_read).collect();
    assert_eq!(frames_read, vec![100, 200]);
    assert_eq!(seen[0].percent(), Some(40.0));
}

#[test]
fn synthetic_scene_end_to_end_with_image_sink() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("processed_yard");
    let mut pipeline = HazardPipeline::new(FrameAnalyzer::heuristics_only(), ResultAggregator::new(0.8));
    let mut source = SyntheticSource::with_frames("yard", 30);
    let mut sink = ImageSequenceSink::new(&out);

    let result = pipeline
        .analyze_video(&mut source, Some(&mut sink))
        .expect("run");

    let detections = result.detections();
    assert_eq!(detections.len(), 6);
    assert!(detections
        .iter()
        .all(|d| d.hazard_class() == HazardClass::OilLeak && d.frame_index() % 5 == 0));
    for d in detections {
        let bbox = d.bounding_box();
        assert!((0.0..=1.0).contains(&d.confidence()));
        assert!(bbox.x1 <= bbox.x2 && bbox.y1 <= bbox.y2);
        assert!(bbox.x2 <= 320.0 && bbox.y2 <= 240.0);
    }
    let oil = &result.summary().detection_types[&HazardClass::OilLeak];
    assert_eq!(oil.count, 6);

    assert_eq!(result.processed_video_path(), Some(out.as_path()));
    assert_eq!(sink.frames_written(), 30);
    assert!(out.join("frame_000030.png").is_file());
    assert!(out.join("sequence.json").is_file());

    // Frame counter background sits in the top-left corner of every frame.
    let first = image::open(out.join("frame_000001.png"))
        .expect("read frame")
        .to_rgb8();
    assert_eq!(first.get_pixel(8, 8).0, [0, 0, 0]);
}

#[test]
fn snapshot_analysis_is_repeatable() {
    let mut frame = Frame::filled(320, 240, [200, 200, 200]);
    frame.fill_rect(20, 20, 80, 80, [10, 10, 10]);
    frame.fill_rect(200, 100, 100, 100, [255, 0, 0]);
    let mut pipeline = HazardPipeline::new(FrameAnalyzer::heuristics_only(), ResultAggregator::new(0.8));

    let first = pipeline.analyze_frame(&frame);
    let second = pipeline.analyze_frame(&frame);

    assert!(!first.is_empty());
    assert!(first.iter().all(|d| d.frame_index() == 0));
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.same_observation(b)));
    let fire: Vec<_> = first
        .iter()
        .filter(|d| d.hazard_class() == HazardClass::Fire)
        .collect();
    assert_eq!(fire.len(), 1);
    assert_eq!(fire[0].confidence(), 0.8);
}
