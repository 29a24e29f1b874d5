use thiserror::Error;

/// Errors surfaced by the analysis/modification/synthesis pipeline.
///
/// Silent frames and unmatched peaks are not errors; they are handled by the
/// frame scheduler and the track associator respectively.
#[derive(Debug, Error)]
pub enum SinusoidalError {
    #[error("input signal is empty")]
    EmptySignal,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown window type: {0}")]
    InvalidWindowType(String),

    #[error("pitch marks are required but none were given")]
    MissingPitchMarks,

    #[error("a pitch contour is required but none was given")]
    MissingPitchContour,

    #[error("{what}: expected {expected} values, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no sinusoidal tracks survived analysis")]
    NoTracks,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, SinusoidalError>;
