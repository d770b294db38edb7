use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_MODEL_PATH: &str = "models/oil_leak_detector.onnx";
const DEFAULT_FALLBACK_MODEL_PATH: &str = "models/yolov8n.onnx";
const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
const DEFAULT_ALERT_THRESHOLD: f32 = 0.8;
const DEFAULT_PROCESSED_DIR: &str = "processed";
const DEFAULT_IMAGE_FPS: f64 = 30.0;

#[derive(Debug, Deserialize, Default)]
struct HazardConfigFile {
    model: Option<ModelConfigFile>,
    alert_threshold: Option<f32>,
    output: Option<OutputConfigFile>,
    ingest: Option<IngestConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    fallback_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    processed_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct IngestConfigFile {
    image_fps: Option<f64>,
}

/// Read-only settings for one analyzer instance.
#[derive(Debug, Clone)]
pub struct HazardConfig {
    pub model: ModelSettings,
    /// Detections above this confidence count as high confidence.
    pub alert_threshold: f32,
    pub output: OutputSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Custom hazard model artifact.
    pub path: PathBuf,
    /// Generic baseline model used when `path` does not exist.
    pub fallback_path: PathBuf,
    /// Square model input side in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub processed_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Frame rate assumed for image-directory sources.
    pub image_fps: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            fallback_path: PathBuf::from(DEFAULT_FALLBACK_MODEL_PATH),
            input_size: DEFAULT_MODEL_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        }
    }
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            output: OutputSettings {
                processed_dir: PathBuf::from(DEFAULT_PROCESSED_DIR),
            },
            ingest: IngestSettings {
                image_fps: DEFAULT_IMAGE_FPS,
            },
        }
    }
}

impl HazardConfig {
    /// Load from the file named by `HAZARD_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HAZARD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: HazardConfigFile) -> Self {
        let defaults = Self::default();
        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            path: model_file.path.unwrap_or(defaults.model.path),
            fallback_path: model_file
                .fallback_path
                .unwrap_or(defaults.model.fallback_path),
            input_size: model_file.input_size.unwrap_or(defaults.model.input_size),
            confidence_threshold: model_file
                .confidence_threshold
                .unwrap_or(defaults.model.confidence_threshold),
            nms_threshold: model_file
                .nms_threshold
                .unwrap_or(defaults.model.nms_threshold),
        };
        let output = OutputSettings {
            processed_dir: file
                .output
                .and_then(|output| output.processed_dir)
                .unwrap_or(defaults.output.processed_dir),
        };
        let ingest = IngestSettings {
            image_fps: file
                .ingest
                .and_then(|ingest| ingest.image_fps)
                .unwrap_or(defaults.ingest.image_fps),
        };
        Self {
            model,
            alert_threshold: file.alert_threshold.unwrap_or(defaults.alert_threshold),
            output,
            ingest,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_nonempty("HAZARD_MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("HAZARD_FALLBACK_MODEL_PATH") {
            self.model.fallback_path = PathBuf::from(path);
        }
        if let Some(value) = env_nonempty("HAZARD_CONFIDENCE_THRESHOLD") {
            self.model.confidence_threshold = parse_threshold("HAZARD_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = env_nonempty("HAZARD_NMS_THRESHOLD") {
            self.model.nms_threshold = parse_threshold("HAZARD_NMS_THRESHOLD", &value)?;
        }
        if let Some(value) = env_nonempty("HAZARD_ALERT_THRESHOLD") {
            self.alert_threshold = parse_threshold("HAZARD_ALERT_THRESHOLD", &value)?;
        }
        if let Some(dir) = env_nonempty("HAZARD_PROCESSED_DIR") {
            self.output.processed_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("model.confidence_threshold", self.model.confidence_threshold),
            ("model.nms_threshold", self.model.nms_threshold),
            ("alert_threshold", self.alert_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model.input_size must be greater than zero"));
        }
        if !(self.ingest.image_fps > 0.0) {
            return Err(anyhow!("ingest.image_fps must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<HazardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_threshold(key: &str, value: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| anyhow!("{} must be a number between 0 and 1", key))
}
