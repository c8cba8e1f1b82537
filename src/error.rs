//! Error types for adasoft.

use thiserror::Error;

/// Every failure surfaced by the adaptive softmax loss and its helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad cutoffs, a zero reduced dimension, or another invalid setting.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A supplied matrix does not have the shape the module expects.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: String,
        got: String,
    },

    /// A target class id outside `[0, num_classes)`.
    #[error("target class {target} is out of range for {num_classes} classes")]
    InvalidTarget { target: usize, num_classes: usize },

    /// Gradients were requested before any forward pass was recorded.
    #[error("no forward pass has been recorded")]
    MissingForward,

    /// A checkpoint names a type the registry does not know.
    #[error("unknown loss type tag: {0}")]
    UnknownTypeTag(String),

    /// A checkpoint was written by an encoder version this build cannot read.
    #[error("unsupported version {version} for {tag}")]
    UnsupportedVersion { tag: String, version: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        got: impl std::fmt::Display,
    ) -> Error {
        Error::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
