//! NextGCore Diameter Protocol Library
//!
//! Diameter base message and AVP codec (RFC 6733) and the Gx (3GPP TS
//! 29.212) answer/request surface consumed by the SMF.

pub mod error;
pub mod gx;
pub mod message;

#[cfg(test)]
mod property_tests;

pub use error::{result_code, DiameterError, DiameterResult};
pub use gx::{CcRequestType, GxCommand, GxMessage, GX_APPLICATION_ID};
pub use message::{Avp, DiameterHeader, DiameterMessage};

/// 3GPP Vendor ID
pub const OGS_3GPP_VENDOR_ID: u32 = 10415;

/// Diameter protocol version
pub const DIAMETER_VERSION: u8 = 1;

/// Default Diameter port
pub const DIAMETER_PORT: u16 = 3868;
