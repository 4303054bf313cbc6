use serde::Serialize;

/// Result type for per-channel estimation.
pub type EstimationResult<T> = Result<T, EstimationError>;

/// Why a single channel could not be estimated.
///
/// Every variant is recoverable and scoped to one channel: the orchestrator
/// records it next to the channel id and carries on with the rest of the
/// capture.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimationError {
    #[error("insufficient zero crossings: found {found}, need at least {needed}")]
    InsufficientCrossings { found: usize, needed: usize },

    #[error("insufficient periods: found {found}, need at least {needed}")]
    InsufficientPeriods { found: usize, needed: usize },

    #[error("degenerate interpolation at sample {index}: samples around the crossing do not bracket zero")]
    DegenerateInterpolation { index: usize },

    #[error("empty analysis window: {span} samples cannot hold a {samples_per_period}-sample period")]
    EmptyWindow { span: usize, samples_per_period: usize },

    #[error("fundamental bin {bin} outside a {length}-bin spectrum")]
    FundamentalOutOfRange { bin: usize, length: usize },

    #[error("sample {index} is not finite")]
    NonFiniteSample { index: usize },

    #[error("FFT failed: {message}")]
    Fft { message: String },
}

impl From<realfft::FftError> for EstimationError {
    fn from(err: realfft::FftError) -> Self {
        EstimationError::Fft {
            message: err.to_string(),
        }
    }
}

/// Errors raised while assembling a [`Capture`](crate::types::Capture).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("invalid sampling frequency: {0} Hz")]
    InvalidSamplingFrequency(f64),

    #[error("invalid nominal frequency: {0} Hz")]
    InvalidNominalFrequency(f64),

    #[error("channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: crate::types::ChannelId,
        expected: usize,
        actual: usize,
    },
}
