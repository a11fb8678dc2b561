//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("negative frame length: {0}")]
    NegativeLength(i32),

    #[error("exec target too long: {size} bytes (max {max})")]
    ExecTargetTooLong { size: usize, max: usize },

    #[error("string field does not fit in datagram at offset {offset}")]
    FieldOverflow { offset: usize },

    #[error("datagram truncated: needed {needed} bytes, had {available}")]
    TruncatedDatagram { needed: usize, available: usize },

    #[error("no terminator found in port field")]
    MissingPortTerminator,

    #[error("invalid port field: {0:?}")]
    InvalidPort(String),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("malformed catalog entry: {0:?}")]
    MalformedEntry(String),

    #[error("invalid process id: {0:?}")]
    InvalidProcessId(String),
}
