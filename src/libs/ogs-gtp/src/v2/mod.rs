//! GTPv2 Protocol Implementation
//!
//! This module implements GTPv2-C (Control Plane) as specified in 3GPP TS 29.274.

pub mod header;
pub mod message;
pub mod teid_pool;

pub use header::{Gtp2Header, Gtp2MessageType, GTPV2C_HEADER_LEN, GTPV2C_HEADER_LEN_NO_TEID};
pub use message::{
    BearerResourceCommand, CreateBearerResponse, CreateSessionRequest, DeleteBearerResponse,
    DeleteSessionRequest, Gtp2Body, Gtp2Ie, Gtp2Message, UpdateBearerResponse,
};
pub use teid_pool::TeidPool;
