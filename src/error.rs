//! Error types for loralink.

use std::io;

use thiserror::Error;

use crate::wire::FrameKind;

/// Result type alias for loralink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for loralink.
#[derive(Error, Debug)]
pub enum Error {
    // Radio errors
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),

    // Framing errors
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Radio port operation failures.
///
/// Mirrors the status word of the underlying transceiver interface: timeouts
/// and malformed transmissions are ordinary air-interface noise, while
/// `InitializationFailed` means the port itself is unusable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    #[error("operation timed out")]
    Timeout,

    #[error("bad buffer size: {len} bytes (capacity {capacity})")]
    BadBufferSize { len: usize, capacity: usize },

    #[error("malformed transmission")]
    BadMessage,

    #[error("radio initialization failed")]
    InitializationFailed,

    #[error("unspecified radio failure")]
    Unspecified,
}

/// Frame encoding and decoding errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: {len} bytes, need {need}")]
    Truncated { len: usize, need: usize },

    #[error("unexpected frame tag: expected {expected:?}, got {got}")]
    UnexpectedKind { expected: FrameKind, got: u8 },

    #[error("unknown frame tag: {0}")]
    UnknownKind(u8),

    #[error("unknown session packet subtype: {0}")]
    UnknownOp(u8),
}

impl Error {
    /// Check if the error is transient (the operation may be retried).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Radio(
                RadioError::Timeout | RadioError::BadBufferSize { .. } | RadioError::BadMessage
            ) | Error::Frame(_)
        )
    }
}
