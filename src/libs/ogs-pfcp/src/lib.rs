//! NextGCore PFCP Protocol Library
//!
//! PFCP (3GPP TS 29.244) header and message decoding for the N4 reference
//! point, plus the transaction table that pairs N4 requests with responses.

pub mod error;
pub mod header;
pub mod message;
pub mod xact;

#[cfg(test)]
mod property_tests;

pub use error::{PfcpError, PfcpResult};
pub use header::{PfcpHeader, PfcpMessageType, PFCP_HEADER_LEN, PFCP_HEADER_LEN_WITH_SEID};
pub use message::{PfcpIe, PfcpMessage};
pub use xact::{PfcpXact, PfcpXactTable, PFCP_XACT_DEFAULT_CAPACITY};

/// PFCP UDP port (8805)
pub const PFCP_UDP_PORT: u16 = 8805;
