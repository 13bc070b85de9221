//! Transport error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message encoding error: {0}")]
    Encoding(String),

    /// Accumulated bytes passed the limit without a delimiter
    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Peer broke the multiplexing protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Stream {0} was reset")]
    StreamReset(u32),

    #[error("Stream {0} is closed for writing")]
    StreamClosed(u32),

    #[error("Stream {0} closed without a response")]
    NoResponse(u32),

    #[error("Session closed")]
    SessionClosed,

    #[error("Response for query {got} does not match request {expected}")]
    Mismatched { expected: u64, got: u64 },
}

impl From<bincode::Error> for TransportError {
    fn from(err: bincode::Error) -> Self {
        TransportError::Encoding(err.to_string())
    }
}

impl TransportError {
    /// Errors that only affect one stream; the session stays usable
    pub fn is_stream_local(&self) -> bool {
        matches!(
            self,
            TransportError::Encoding(_)
                | TransportError::FrameTooLarge { .. }
                | TransportError::MalformedFrame(_)
                | TransportError::StreamReset(_)
                | TransportError::StreamClosed(_)
                | TransportError::NoResponse(_)
                | TransportError::Mismatched { .. }
        )
    }
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_scope() {
        assert!(TransportError::StreamReset(3).is_stream_local());
        assert!(TransportError::FrameTooLarge { len: 10, max: 5 }.is_stream_local());
        assert!(!TransportError::SessionClosed.is_stream_local());
        assert!(!TransportError::Protocol("bad".into()).is_stream_local());
        assert_eq!(TransportError::StreamReset(3).to_string(), "Stream 3 was reset");
    }
}
