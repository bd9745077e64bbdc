//! NextGCore GTP Protocol Library
//!
//! GTPv2-C (3GPP TS 29.274) header and message decoding for the S5/S8
//! control plane, TEID allocation, and the per-peer transaction table that
//! correlates requests with their responses.

pub mod error;
pub mod v2;
pub mod xact;

#[cfg(test)]
mod property_tests;

pub use error::{GtpError, GtpResult};
pub use xact::{GtpXact, GtpXactTable, XactMatch, XactOrigin, GTP_XACT_DEFAULT_CAPACITY};

/// GTPv2-C UDP port (2123)
pub const GTPV2_C_UDP_PORT: u16 = 2123;
