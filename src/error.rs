//! Error types for weatherhub
//!
//! Provides a unified error type for all operations.

use std::io::ErrorKind;

use thiserror::Error;

/// Result type alias using HubError
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type for weatherhub operations
#[derive(Debug, Error)]
pub enum HubError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Malformed start line: {0:?}")]
    MalformedStartLine(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("Invalid value for header {name}: {value:?}")]
    InvalidHeaderValue { name: String, value: String },

    #[error("Missing Content-Length header")]
    MissingContentLength,

    #[error("Truncated body: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: usize, received: usize },

    #[error("Frame too large: {0}")]
    FrameTooLarge(String),

    // -------------------------------------------------------------------------
    // Routing Errors
    // -------------------------------------------------------------------------
    #[error("No route for {method} {target}")]
    UnknownRoute { method: String, target: String },

    #[error("Invalid source id: {0:?}")]
    InvalidSourceId(String),

    #[error("Invalid observation payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for HubError {
    fn from(err: bincode::Error) -> Self {
        HubError::Serialization(err.to_string())
    }
}

impl HubError {
    /// True for errors raised while parsing a message off the wire
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            HubError::MalformedStartLine(_)
                | HubError::MalformedHeader(_)
                | HubError::InvalidHeaderValue { .. }
                | HubError::MissingContentLength
                | HubError::TruncatedBody { .. }
                | HubError::FrameTooLarge(_)
        )
    }

    /// True when the peer went away (EOF, reset, abort, broken pipe, timeout).
    ///
    /// The dispatcher treats these as a clean close rather than a fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            HubError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// HTTP status code used when this error is reported to a peer
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::UnknownRoute { .. }
            | HubError::InvalidSourceId(_)
            | HubError::InvalidPayload(_) => 400,
            HubError::NotFound(_) => 404,
            HubError::UnsupportedMethod(_) => 405,
            _ => 500,
        }
    }
}
