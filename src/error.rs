use thiserror::Error;

/// Failure taxonomy for hazard analysis.
///
/// Only `SourceUnavailable` and `Cancelled` end a run. The remaining variants
/// are recovered locally and exist so that every recovery path logs the same
/// shape of message.
#[derive(Debug, Error)]
pub enum HazardError {
    #[error("model load failure: {0}")]
    ModelLoadFailure(String),

    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("detector '{detector}' failed on frame {frame_index}: {message}")]
    FrameDetection {
        detector: &'static str,
        frame_index: u64,
        message: String,
    },

    #[error("output sink failure: {0}")]
    SinkWriteFailure(String),

    #[error("analysis cancelled after {frames_read} frames")]
    Cancelled { frames_read: u64 },
}

impl HazardError {
    pub fn source_unavailable(err: &anyhow::Error) -> Self {
        Self::SourceUnavailable(format!("{:#}", err))
    }

    pub fn sink_failure(err: &anyhow::Error) -> Self {
        Self::SinkWriteFailure(format!("{:#}", err))
    }
}
