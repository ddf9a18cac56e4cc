//! Error taxonomy for the streaming engine.
//!
//! Each variant maps to a distinct process exit code so calling scripts can
//! branch on the failure class.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The media engine itself (gst-launch-1.0 / gst-inspect-1.0) cannot be
    /// queried at all. Distinct from "no hardware encoder found".
    #[error("media engine unavailable: {0}")]
    Environment(String),

    /// Source device missing or unreadable.
    #[error("source device error: {0}")]
    Device(String),

    /// No candidate in any tier verified, including the software fallback.
    #[error("no verified encoder available on this host")]
    NoEncoderAvailable,

    /// No known conversion from the requested format to anything the chosen
    /// encoder accepts.
    #[error("no conversion from '{requested}' to any accepted format {accepted:?}")]
    IncompatibleFormat {
        requested: String,
        accepted: Vec<String>,
    },

    /// Retryable runtime fault (momentary device contention, network hiccup).
    #[error("transient stream failure: {0}")]
    Transient(String),

    /// Non-retryable runtime fault requiring operator intervention.
    #[error("fatal stream failure: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Exit code for this failure class. 0 is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            StreamError::Io(_) => 1,
            StreamError::Environment(_) => 2,
            StreamError::NoEncoderAvailable => 3,
            StreamError::IncompatibleFormat { .. } => 4,
            StreamError::Device(_) => 5,
            // A transient fault only surfaces once the retry ceiling is
            // exceeded, at which point it is reported like a fatal one.
            StreamError::Transient(_) | StreamError::Fatal(_) => 6,
        }
    }

    /// Whether the execution supervisor may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
