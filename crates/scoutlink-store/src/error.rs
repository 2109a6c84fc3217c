//! Error types for dataset stores.

use thiserror::Error;

/// Errors for dataset store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown category: {name}")]
    UnknownCategory { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_display() {
        let err = StoreError::UnknownCategory {
            name: "robots".into(),
        };
        assert_eq!(err.to_string(), "unknown category: robots");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = StoreError::from(io);
        assert!(err.to_string().starts_with("I/O error"));
    }
}
