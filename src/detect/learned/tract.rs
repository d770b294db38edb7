use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use super::{InferenceModel, RawDetection};
use crate::detect::result::BoundingBox;
use crate::frame::Frame;

/// Tract-based runtime for YOLO-style ONNX detectors.
///
/// Expects input `[1, 3, S, S]` (RGB scaled to 0..1) and a single output of
/// `[1, 4 + C, N]` or `[1, N, 4 + C]`, where each anchor carries
/// `(cx, cy, w, h)` in input pixels followed by one score per class.
/// Runs on the CPU.
pub struct TractModel {
    plan: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractModel {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(anyhow!("model artifact {} not found", model_path.display()));
        }
        let side = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { plan, input_size })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(
        &self,
        outputs: &[TValue],
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected a 3-D detection output")?;

        let (dim_a, dim_b) = (view.shape()[1], view.shape()[2]);
        let channels_first = dim_a < dim_b;
        let (features, anchors) = if channels_first {
            (dim_a, dim_b)
        } else {
            (dim_b, dim_a)
        };
        if features < 5 {
            return Err(anyhow!("detection output has {} features, need >= 5", features));
        }
        let value = |feature: usize, anchor: usize| {
            if channels_first {
                view[[0, feature, anchor]]
            } else {
                view[[0, anchor, feature]]
            }
        };

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let (class_id, confidence) = (4..features)
                .map(|f| (f - 4, value(f, anchor)))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !confidence.is_finite() || confidence < confidence_threshold {
                continue;
            }
            let (cx, cy) = (value(0, anchor), value(1, anchor));
            let (w, h) = (value(2, anchor), value(3, anchor));
            detections.push(RawDetection {
                class_id: class_id as u32,
                confidence,
                bbox: BoundingBox::new(
                    (cx - w / 2.0) * scale_x,
                    (cy - h / 2.0) * scale_y,
                    (cx + w / 2.0) * scale_x,
                    (cy + h / 2.0) * scale_y,
                ),
            });
        }
        Ok(detections)
    }
}

impl InferenceModel for TractModel {
    fn backend(&self) -> &'static str {
        "tract-cpu"
    }

    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(&outputs, frame, confidence_threshold)
    }
}
