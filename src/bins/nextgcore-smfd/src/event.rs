//! SMF Event Definitions
//!
//! Everything the SMF reacts to arrives as one [`SmfEvent`] on a single
//! queue: state machine signals, datagrams from the S5-C and N4 listeners,
//! Gx answers and requests, and timer expiries.

use std::fmt;
use std::net::SocketAddr;

use ogs_diameter::GxMessage;

use crate::pkbuf::Pkbuf;
use crate::timer::SmfTimerId;

/// Protocol a transaction timeout refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XactProtocol {
    Gtp,
    Pfcp,
}

/// SMF event
pub enum SmfEvent {
    /// FSM entry signal
    Entry,
    /// FSM exit signal
    Exit,
    /// GTPv2-C datagram. `gnode` is the sender, known to the listener but
    /// only used when the TEID does not resolve a session.
    S5cMessage {
        gnode: Option<SocketAddr>,
        pkbuf: Pkbuf,
    },
    /// Decoded Gx message for a session that started a policy exchange
    GxMessage {
        sess_id: u64,
        /// GTP transaction the exchange was started for, if any
        gtp_xact_id: Option<u64>,
        message: GxMessage,
        pkbuf: Pkbuf,
    },
    /// PFCP datagram from a UPF
    N4Message { pnode: SocketAddr, pkbuf: Pkbuf },
    /// Peer scoped PFCP timer
    N4Timer {
        pnode: SocketAddr,
        timer_id: SmfTimerId,
    },
    /// The UPF stopped answering heartbeats
    N4NoHeartbeat { pnode: SocketAddr },
    /// A transaction outlived its deadline without a response
    XactTimeout {
        protocol: XactProtocol,
        xact_id: u64,
    },
}

impl SmfEvent {
    /// Get the name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Entry => "OGS_FSM_ENTRY_SIG",
            Self::Exit => "OGS_FSM_EXIT_SIG",
            Self::S5cMessage { .. } => "SMF_EVT_S5C_MESSAGE",
            Self::GxMessage { .. } => "SMF_EVT_GX_MESSAGE",
            Self::N4Message { .. } => "SMF_EVT_N4_MESSAGE",
            Self::N4Timer { .. } => "SMF_EVT_N4_TIMER",
            Self::N4NoHeartbeat { .. } => "SMF_EVT_N4_NO_HEARTBEAT",
            Self::XactTimeout { .. } => "SMF_EVT_XACT_TIMEOUT",
        }
    }

    pub fn s5c_message(gnode: SocketAddr, pkbuf: Pkbuf) -> Self {
        Self::S5cMessage {
            gnode: Some(gnode),
            pkbuf,
        }
    }

    pub fn n4_message(pnode: SocketAddr, pkbuf: Pkbuf) -> Self {
        Self::N4Message { pnode, pkbuf }
    }

    pub fn gx_message(
        sess_id: u64,
        gtp_xact_id: Option<u64>,
        message: GxMessage,
        pkbuf: Pkbuf,
    ) -> Self {
        Self::GxMessage {
            sess_id,
            gtp_xact_id,
            message,
            pkbuf,
        }
    }

    pub fn n4_timer(pnode: SocketAddr, timer_id: SmfTimerId) -> Self {
        Self::N4Timer { pnode, timer_id }
    }
}

impl fmt::Debug for SmfEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S5cMessage { gnode, pkbuf } => {
                write!(f, "{}[gnode={:?}, len={}]", self.name(), gnode, pkbuf.len())
            }
            Self::GxMessage {
                sess_id, message, ..
            } => write!(f, "{}[sess={}, cmd={}]", self.name(), sess_id, message.cmd_code),
            Self::N4Message { pnode, pkbuf } => {
                write!(f, "{}[pnode={}, len={}]", self.name(), pnode, pkbuf.len())
            }
            Self::N4Timer { pnode, timer_id } => {
                write!(f, "{}[pnode={}, {}]", self.name(), pnode, timer_id.name())
            }
            Self::N4NoHeartbeat { pnode } => write!(f, "{}[pnode={}]", self.name(), pnode),
            Self::XactTimeout { protocol, xact_id } => {
                write!(f, "{}[{:?} xact={}]", self.name(), protocol, xact_id)
            }
            Self::Entry | Self::Exit => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkbuf::PkbufPool;

    #[test]
    fn test_event_names() {
        let pool = PkbufPool::new();
        let addr = SocketAddr::from(([127, 0, 0, 1], 2123));
        assert_eq!(SmfEvent::Entry.name(), "OGS_FSM_ENTRY_SIG");
        assert_eq!(
            SmfEvent::s5c_message(addr, pool.alloc(vec![0u8])).name(),
            "SMF_EVT_S5C_MESSAGE"
        );
        assert_eq!(
            SmfEvent::n4_timer(addr, SmfTimerId::PfcpAssociation).name(),
            "SMF_EVT_N4_TIMER"
        );
    }

    #[test]
    fn test_dropping_event_releases_buffer() {
        let pool = PkbufPool::new();
        let addr = SocketAddr::from(([127, 0, 0, 1], 8805));
        let event = SmfEvent::n4_message(addr, pool.alloc(vec![1u8, 2]));
        assert_eq!(format!("{event:?}"), "SMF_EVT_N4_MESSAGE[pnode=127.0.0.1:8805, len=2]");
        drop(event);
        assert_eq!(pool.in_use(), 0);
    }
}
