//! GTP Error types

use std::net::SocketAddr;

use thiserror::Error;

/// GTP Error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GtpError {
    /// Buffer too short for operation
    #[error("Buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Invalid version
    #[error("Invalid GTP version: {0}")]
    InvalidVersion(u8),

    /// Message length field disagrees with the received buffer
    #[error("Invalid message length: header says {declared}, payload has {actual}")]
    InvalidLength { declared: usize, actual: usize },

    /// Invalid IE length
    #[error("Invalid IE length: expected {expected}, got {actual}")]
    InvalidIeLength { expected: usize, actual: usize },

    /// Resource exhausted
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A triggered message arrived with no matching local request
    #[error("No transaction for response from {peer} (sqn={sequence:#x})")]
    OrphanResponse { peer: SocketAddr, sequence: u32 },

    /// Transaction table is full
    #[error("Transaction table exhausted ({0} open)")]
    XactTableFull(usize),
}

/// GTP Result type
pub type GtpResult<T> = Result<T, GtpError>;
