//! Local video file source using FFmpeg.
//!
//! Frames are decoded in memory and converted to RGB24. At end of input the
//! decoder is flushed so trailing buffered frames are not lost.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

pub struct FfmpegFileSource {
    path: PathBuf,
    decoding: Option<Decoding>,
    frame_count: u64,
}

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            decoding: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for FfmpegFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<SourceInfo> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.path).with_context(|| {
            format!("failed to open file input '{}' with ffmpeg", self.path.display())
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let fps = f64::from(input_stream.avg_frame_rate());
        let total_frames = input_stream.frames().max(0) as u64;
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = SourceInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 0.0 },
            total_frames,
        };
        self.decoding = Some(Decoding {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        });
        self.frame_count = 0;
        log::info!(
            "frame source: opened {} ({}x{} @ {:.2} fps, {} frames)",
            self.path.display(),
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );
        Ok(info)
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let Some(decoding) = self.decoding.as_mut() else {
            anyhow::bail!("ffmpeg source {} read before open", self.path.display());
        };

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if decoding.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                decoding
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::from_rgb(pixels, width, height).map(Some);
            }
            if decoding.eof_sent {
                return Ok(None);
            }

            let stream_index = decoding.stream_index;
            let packet = decoding
                .input
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => decoding
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    decoding
                        .decoder
                        .send_eof()
                        .context("flush ffmpeg decoder")?;
                    decoding.eof_sent = true;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.decoding.take().is_some() {
            log::debug!(
                "frame source: closed {} after {} frames",
                self.path.display(),
                self.frame_count
            );
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame buffer is shorter than expected")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
