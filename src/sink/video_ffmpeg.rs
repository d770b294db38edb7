//! Annotated video file output using FFmpeg.
//!
//! Frames are converted from RGB24 to YUV420P and encoded as MPEG-4 Part 2 at
//! the source resolution and frame rate. Closing flushes the encoder and
//! writes the container trailer, so a sink that is never closed leaves a
//! truncated file behind.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::PathBuf;

use super::OutputSink;
use crate::frame::Frame;

/// Used when the source does not report a usable frame rate.
const FALLBACK_FPS: f64 = 30.0;

pub struct VideoFileSink {
    path: PathBuf,
    encoding: Option<Encoding>,
    written: u64,
}

struct Encoding {
    output: ffmpeg::format::context::Output,
    stream_index: usize,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
}

impl VideoFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encoding: None,
            written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for VideoFileSink {
    fn open(&mut self, width: u32, height: u32, fps: f64) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot render a {}x{} output", width, height));
        }
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            FALLBACK_FPS
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }

        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&self.path).with_context(|| {
            format!("failed to create video output '{}'", self.path.display())
        })?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("ffmpeg build has no MPEG-4 encoder"))?;
        let encoder_time_base = ffmpeg::Rational::from(fps).invert();
        let mut config = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        config.set_width(width);
        config.set_height(height);
        config.set_format(ffmpeg::format::Pixel::YUV420P);
        config.set_time_base(encoder_time_base);
        config.set_frame_rate(Some(ffmpeg::Rational::from(fps)));
        if global_header {
            config.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = config.open_as(codec).context("open MPEG-4 encoder")?;

        let stream_index = {
            let mut stream = output.add_stream(codec).context("add video stream")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.index()
        };
        output
            .write_header()
            .with_context(|| format!("write header of {}", self.path.display()))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| anyhow!("video stream vanished after header"))?;

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        self.encoding = Some(Encoding {
            output,
            stream_index,
            encoder,
            scaler,
            encoder_time_base,
            stream_time_base,
            width,
            height,
        });
        self.written = 0;
        log::info!(
            "output sink: encoding {}x{} @ {:.2} fps into {}",
            width,
            height,
            fps,
            self.path.display()
        );
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let Some(encoding) = self.encoding.as_mut() else {
            return Err(anyhow!("output sink written before open"));
        };
        if (frame.width(), frame.height()) != (encoding.width, encoding.height) {
            return Err(anyhow!(
                "frame is {}x{}, output is {}x{}",
                frame.width(),
                frame.height(),
                encoding.width,
                encoding.height
            ));
        }

        let rgb = rgb_video_frame(frame);
        let mut yuv = ffmpeg::frame::Video::empty();
        encoding
            .scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.written as i64));
        encoding
            .encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        encoding.drain()?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut encoding) = self.encoding.take() else {
            return Ok(());
        };
        encoding
            .encoder
            .send_eof()
            .context("flush ffmpeg encoder")?;
        encoding.drain()?;
        encoding
            .output
            .write_trailer()
            .with_context(|| format!("write trailer of {}", self.path.display()))?;
        log::debug!(
            "output sink: closed {} after {} frames",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

impl Encoding {
    /// Moves every packet the encoder has ready into the container.
    fn drain(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

fn rgb_video_frame(frame: &Frame) -> ffmpeg::frame::Video {
    let (width, height) = (frame.width(), frame.height());
    let mut video = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, width, height);
    let row_bytes = width as usize * 3;
    let stride = video.stride(0);
    let pixels = frame.image().as_raw();
    let data = video.data_mut(0);
    for (row, source) in pixels.chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        data[start..start + row_bytes].copy_from_slice(source);
    }
    video
}
