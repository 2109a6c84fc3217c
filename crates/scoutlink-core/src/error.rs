//! Error types for payload handling.

use thiserror::Error;

/// Errors produced while classifying or parsing a transfer payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The bytes were not valid JSON, or an item failed its schema.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but matched none of the known dataset shapes.
    /// Nothing is merged in this case; guessing a category would corrupt
    /// the receiving store.
    #[error("unrecognized payload shape: {reason}")]
    Unrecognized { reason: String },
}

impl PayloadError {
    pub(crate) fn unrecognized(reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            reason: reason.into(),
        }
    }
}
