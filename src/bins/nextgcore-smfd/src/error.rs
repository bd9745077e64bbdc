//! SMF error types

use std::net::SocketAddr;

use ogs_gtp::GtpError;
use ogs_pfcp::PfcpError;
use thiserror::Error;

/// Errors raised while dispatching events or bringing the SMF up
#[derive(Debug, Error)]
pub enum SmfError {
    /// Malformed wire bytes
    #[error("{protocol} decode failed: {reason}")]
    Decode {
        protocol: &'static str,
        reason: String,
    },

    /// Orphan response or exhausted transaction table
    #[error("{protocol} correlation failed: {reason}")]
    Correlation {
        protocol: &'static str,
        reason: String,
    },

    /// An identifier that should name a session does not
    #[error("session resolution failed: {0}")]
    SessionResolution(String),

    /// A peer-scoped event for a peer without a sub state machine
    #[error("no PFCP state machine for {0}")]
    NoSubFsm(SocketAddr),

    /// N4 traffic from a node that is not configured
    #[error("unknown PFCP peer {0}")]
    UnknownPeer(SocketAddr),

    /// Listener could not be bound
    #[error("cannot open {path} path on {addr}: {source}")]
    TransportOpen {
        path: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Session table or TEID space is full
    #[error("resource exhausted: {0}")]
    Resource(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SmfError {
    pub fn gtp_decode(err: GtpError) -> Self {
        Self::Decode {
            protocol: "GTPv2-C",
            reason: err.to_string(),
        }
    }

    pub fn pfcp_decode(err: PfcpError) -> Self {
        Self::Decode {
            protocol: "PFCP",
            reason: err.to_string(),
        }
    }

    pub fn gtp_correlation(err: GtpError) -> Self {
        Self::Correlation {
            protocol: "GTPv2-C",
            reason: err.to_string(),
        }
    }

    pub fn pfcp_correlation(err: PfcpError) -> Self {
        Self::Correlation {
            protocol: "PFCP",
            reason: err.to_string(),
        }
    }

    /// Only a failed listener stops the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportOpen { .. })
    }
}

/// SMF Result type
pub type SmfResult<T> = Result<T, SmfError>;
