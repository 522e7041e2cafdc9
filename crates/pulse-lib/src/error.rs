use thiserror::Error;

pub type Result<T> = std::result::Result<T, PulseError>;

/// Failures raised by the pulse analysis pipeline.
///
/// Structural problems (bad filter setup, too little data) abort a recording.
/// Per-pulse numeric degeneracies are reported as NaN features instead and
/// never show up here, except for [`PulseError::DegeneratePulse`] which the
/// classification driver catches per pulse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PulseError {
    #[error("insufficient data: {what} needs at least {required} samples, got {actual}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("invalid filter configuration: {0}")]
    InvalidFilterConfiguration(String),
    #[error("degenerate pulse: {0}")]
    DegeneratePulse(String),
    #[error("invalid timebase: {0}")]
    InvalidTimebase(String),
    #[error("length mismatch: signal has {signal} samples but time vector has {time}")]
    LengthMismatch { signal: usize, time: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("classification failed on batch {batch}: {reason}")]
    ClassificationFailed { batch: usize, reason: String },
}
