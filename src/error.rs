use realfft::FftError;

/// Rejected engine or partition configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("frame length {0} must be a power of two of at least 4")]
    InvalidFrameLength(usize),

    #[error("at least one channel is required")]
    NoChannels,

    #[error(
        "transform frame length {transform} does not match partition frame length {partitions}"
    )]
    FrameLengthMismatch { transform: usize, partitions: usize },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("impulse response transform failed: {0}")]
    Transform(#[from] FftError),
}

/// Condition reported by `process`. The output block has been zeroed when one
/// of these is returned, so the host can keep the stream running.
#[derive(Debug, thiserror::Error)]
pub enum ProcessFault {
    #[error("impulse response has no divisions")]
    EmptyResponse,

    #[error("transform failed: {0}")]
    Transform(#[from] FftError),
}
