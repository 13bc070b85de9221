//! Index error types

use crate::champion::Champion;
use crate::index::MatchId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, validating or (de)serializing an index
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Checksum mismatch, bad magic, truncated body
    #[error("Corrupt snapshot: {0}")]
    Corruption(String),

    /// Snapshot was written by a newer or unknown format
    #[error("Invalid snapshot format: {0}")]
    InvalidSnapshot(String),

    /// Snapshot could not be opened at all
    #[error("Snapshot {path:?} unavailable: {source}")]
    SnapshotUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output location does not exist or is not writable
    #[error("Output destination {path:?} unusable: {reason}")]
    Destination { path: PathBuf, reason: String },

    /// Posting list ids out of order
    #[error("ids are not strictly ascending at index {index}: prev={prev}, next={next}")]
    NotAscending {
        index: usize,
        prev: MatchId,
        next: MatchId,
    },

    /// A champion won and lost the same match
    #[error("{champion} has match {match_id} on both winning and losing lists")]
    OverlappingOutcome { champion: Champion, match_id: MatchId },

    /// A posting list references a match missing from the universe
    #[error("{champion} references matches outside the universe")]
    OutsideUniverse { champion: Champion },
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::NotAscending {
            index: 3,
            prev: 7,
            next: 7,
        };
        assert_eq!(
            err.to_string(),
            "ids are not strictly ascending at index 3: prev=7, next=7"
        );

        let err = IndexError::OverlappingOutcome {
            champion: Champion::from_riot_id(412),
            match_id: 9,
        };
        assert_eq!(
            err.to_string(),
            "Thresh has match 9 on both winning and losing lists"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IndexError = io_err.into();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
