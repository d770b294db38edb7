//! hazard_scan - analyze a video or a single image for industrial hazards.
//!
//! `video` streams a local file, image directory or `stub://` scene through the
//! pipeline, renders annotated output unless `--no-render` is given, and prints
//! the operator caption and per-class breakdown. Built with `render-ffmpeg`
//! the annotated output is an MP4 file, otherwise a directory of PNG frames. `snapshot` analyzes one image
//! and prints its detections as JSON.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hazard_scan::{
    open_source, report, Frame, HazardConfig, HazardPipeline, OutputSink,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "hazard_scan",
    about = "Detect oil leaks, fire and smoke in fixed-camera video"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a video file, image directory or stub:// scene
    Video {
        /// Input location (local path or stub://<name>)
        #[arg(long, value_name = "PATH")]
        input: String,

        /// Directory for rendered output (defaults to the configured processed dir)
        #[arg(long, value_name = "DIR", env = "HAZARD_PROCESSED_DIR")]
        output_dir: Option<PathBuf>,

        /// Skip rendering annotated frames
        #[arg(long)]
        no_render: bool,

        /// Write the full result as JSON to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// UI mode for stderr progress (auto|plain|pretty)
        #[arg(long, default_value = "auto", value_name = "MODE")]
        ui: String,
    },
    /// Analyze a single image
    Snapshot {
        /// Image file (png or jpeg)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = HazardConfig::load()?;

    match args.command {
        Command::Video {
            input,
            output_dir,
            no_render,
            report,
            ui,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.output.processed_dir.clone());
            let render_path = (!no_render).then(|| run_path(&output_dir, &input));
            run_video(&config, &input, render_path, report.as_deref(), &ui)
        }
        Command::Snapshot { image } => run_snapshot(&config, &image),
    }
}

fn run_video(
    config: &HazardConfig,
    input: &str,
    render_path: Option<PathBuf>,
    report_path: Option<&Path>,
    ui_flag: &str,
) -> Result<()> {
    let ui = ui::Ui::from_args(
        Some(ui_flag),
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let progress = ui.frames();
    let reporter = progress.clone();
    let mut pipeline = HazardPipeline::from_config(config)
        .with_cancel_flag(cancel)
        .on_progress(move |p| reporter.update(p));
    {
        let _stage = ui.stage("Load detectors");
        pipeline.analyzer_mut().warm_up();
    }

    let mut source = open_source(input, config)?;
    let mut sink = render_path.map(render_sink);
    let outcome = {
        let _stage = ui.stage("Analyze video");
        pipeline.analyze_video(source.as_mut(), sink.as_mut().map(|s| s.as_mut() as &mut dyn OutputSink))
    };
    progress.finish();

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            println!("{}", report::caption(None, config.alert_threshold));
            return Err(err.into());
        }
    };

    println!("{}", report::caption(Some(&result), config.alert_threshold));
    let breakdown = report::breakdown(&result);
    if !breakdown.is_empty() {
        println!();
        println!("{}", breakdown);
    }
    if let Some(path) = result.processed_video_path() {
        println!();
        println!("annotated output: {}", path.display());
    }
    if let Some(path) = report_path {
        let body = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, body).with_context(|| format!("write report {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "render-ffmpeg")]
fn render_sink(base: PathBuf) -> Box<dyn OutputSink> {
    Box::new(hazard_scan::VideoFileSink::new(base.with_extension("mp4")))
}

#[cfg(not(feature = "render-ffmpeg"))]
fn render_sink(base: PathBuf) -> Box<dyn OutputSink> {
    Box::new(hazard_scan::ImageSequenceSink::new(base))
}

fn run_snapshot(config: &HazardConfig, image_path: &Path) -> Result<()> {
    let image = image::open(image_path)
        .map_err(|e| anyhow!("failed to read image {}: {}", image_path.display(), e))?
        .to_rgb8();
    let frame = Frame::new(image);

    let mut pipeline = HazardPipeline::from_config(config);
    let detections = pipeline.analyze_frame(&frame);
    println!("{}", serde_json::to_string_pretty(&detections)?);
    Ok(())
}

/// `<output_dir>/processed_<input stem>_<UTC timestamp>`
fn run_path(output_dir: &Path, input: &str) -> PathBuf {
    let stem = input
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .map(|name| name.split('.').next().unwrap_or(name))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("video");
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    output_dir.join(format!("processed_{}_{}", stem, stamp))
}
