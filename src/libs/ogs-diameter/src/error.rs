//! Diameter error types

use thiserror::Error;

/// Diameter error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiameterError {
    #[error("Buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Unsupported Diameter version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid message length: {0}")]
    InvalidMessageLength(usize),

    #[error("Invalid AVP: {0}")]
    InvalidAvp(String),

    #[error("Invalid AVP value: {0}")]
    InvalidAvpValue(String),
}

/// Diameter result type
pub type DiameterResult<T> = Result<T, DiameterError>;

/// Result-Code values (RFC 6733 7.1) the Gx path distinguishes
pub mod result_code {
    pub const DIAMETER_SUCCESS: u32 = 2001;
    pub const DIAMETER_LIMITED_SUCCESS: u32 = 2002;
    pub const DIAMETER_UNABLE_TO_DELIVER: u32 = 3002;
    pub const DIAMETER_TOO_BUSY: u32 = 3004;
    pub const DIAMETER_UNKNOWN_SESSION_ID: u32 = 5002;
    pub const DIAMETER_UNABLE_TO_COMPLY: u32 = 5012;
}
