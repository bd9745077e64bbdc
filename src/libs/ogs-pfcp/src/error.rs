//! PFCP Error Types

use std::net::SocketAddr;

use thiserror::Error;

/// PFCP Error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PfcpError {
    /// Buffer too short for operation
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Version not supported
    #[error("PFCP version not supported: {0}")]
    VersionNotSupported(u8),

    /// Message length field disagrees with the received buffer
    #[error("Invalid message length: header says {declared}, payload has {actual}")]
    InvalidLength { declared: usize, actual: usize },

    /// IE claims more octets than remain
    #[error("Invalid IE length: expected {expected}, got {actual}")]
    InvalidIeLength { expected: usize, actual: usize },

    /// A response arrived with no matching local request
    #[error("No transaction for response from {peer} (sqn={sequence:#x})")]
    OrphanResponse { peer: SocketAddr, sequence: u32 },

    /// Transaction table is full
    #[error("Transaction table exhausted ({0} open)")]
    XactTableFull(usize),
}

/// PFCP Result type
pub type PfcpResult<T> = Result<T, PfcpError>;
