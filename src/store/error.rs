//! Match store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by match stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite reported an error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store could not be opened
    #[error("Cannot open match store {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// A single record could not be decoded
    #[error("Malformed record {location}: {reason}")]
    Malformed { location: String, reason: String },
}

impl StoreError {
    pub fn malformed(location: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Malformed {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only affect one record
    pub fn is_record_level(&self) -> bool {
        matches!(self, StoreError::Malformed { .. })
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::malformed("record 7", "missing teams");
        assert_eq!(err.to_string(), "Malformed record record 7: missing teams");
        assert!(err.is_record_level());

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!StoreError::from(io_err).is_record_level());
    }
}
