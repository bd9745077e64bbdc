//! GTPv2-C Transactions
//!
//! Every initial message opens a transaction keyed by (peer, origin,
//! sequence number); the triggered message that answers it closes the same
//! transaction. Local transactions carry the sequence numbers this node
//! picked, remote ones the numbers the peer picked, so the two spaces never
//! collide even when a peer reuses a value.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::{GtpError, GtpResult};
use crate::v2::header::{Gtp2Header, Gtp2MessageType, GTP2_MAX_SEQUENCE};

/// Default number of open transactions before new ones are refused
pub const GTP_XACT_DEFAULT_CAPACITY: usize = 65536;

/// Which side opened the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XactOrigin {
    /// Opened by a request this node sent
    Local,
    /// Opened by a request received from the peer
    Remote,
}

/// GTP Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpXact {
    /// Transaction ID, unique for the lifetime of the table
    pub id: u64,
    /// Peer the transaction runs against
    pub gnode: SocketAddr,
    pub origin: XactOrigin,
    /// Sequence number (24 bits)
    pub sequence: u32,
    /// Type of the initial message
    pub message_type: Gtp2MessageType,
    /// Session the transaction belongs to, once known
    pub sess_id: Option<u64>,
    pub created_at: Instant,
    /// Times the initial message was received again
    pub retransmit_count: u32,
}

impl GtpXact {
    /// Check if transaction has outlived `timeout`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > timeout
    }
}

/// Outcome of matching a received message against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XactMatch {
    /// A fresh initial message; a remote transaction was opened
    New(GtpXact),
    /// The same initial message again; no new transaction was opened
    Duplicate(GtpXact),
    /// A triggered message answering one of our requests
    Response(GtpXact),
}

impl XactMatch {
    pub fn xact(&self) -> &GtpXact {
        match self {
            Self::New(x) | Self::Duplicate(x) | Self::Response(x) => x,
        }
    }
}

type XactKey = (SocketAddr, XactOrigin, u32);

/// Transaction table for all GTP peers
#[derive(Debug)]
pub struct GtpXactTable {
    xacts: HashMap<u64, GtpXact>,
    index: HashMap<XactKey, u64>,
    next_id: u64,
    next_sequence: u32,
    capacity: usize,
}

impl GtpXactTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            xacts: HashMap::new(),
            index: HashMap::new(),
            next_id: 1,
            next_sequence: 1,
            capacity,
        }
    }

    fn key(xact: &GtpXact) -> XactKey {
        (xact.gnode, xact.origin, xact.sequence)
    }

    fn insert(
        &mut self,
        gnode: SocketAddr,
        origin: XactOrigin,
        sequence: u32,
        message_type: Gtp2MessageType,
        sess_id: Option<u64>,
    ) -> GtpResult<GtpXact> {
        if self.xacts.len() >= self.capacity {
            return Err(GtpError::XactTableFull(self.xacts.len()));
        }
        let id = self.next_id;
        self.next_id += 1;

        let xact = GtpXact {
            id,
            gnode,
            origin,
            sequence,
            message_type,
            sess_id,
            created_at: Instant::now(),
            retransmit_count: 0,
        };
        self.index.insert(Self::key(&xact), id);
        self.xacts.insert(id, xact.clone());
        Ok(xact)
    }

    /// Match a received message to a transaction.
    ///
    /// Triggered messages must answer an open local transaction; anything
    /// else is an orphan. Initial messages open a remote transaction unless
    /// one with the same key is already open, in which case the message is
    /// a retransmission.
    pub fn receive(&mut self, gnode: SocketAddr, header: &Gtp2Header) -> GtpResult<XactMatch> {
        let sequence = header.sequence_number & GTP2_MAX_SEQUENCE;

        if header.message_type.is_triggered() {
            let id = self
                .index
                .get(&(gnode, XactOrigin::Local, sequence))
                .copied()
                .ok_or(GtpError::OrphanResponse {
                    peer: gnode,
                    sequence,
                })?;
            return self
                .xacts
                .get(&id)
                .cloned()
                .map(XactMatch::Response)
                .ok_or(GtpError::OrphanResponse {
                    peer: gnode,
                    sequence,
                });
        }

        if let Some(id) = self.index.get(&(gnode, XactOrigin::Remote, sequence)) {
            if let Some(xact) = self.xacts.get_mut(id) {
                xact.retransmit_count += 1;
                log::debug!(
                    "[{}] retransmitted {} (sqn={:#x}, count={})",
                    gnode,
                    header.message_type.name(),
                    sequence,
                    xact.retransmit_count
                );
                return Ok(XactMatch::Duplicate(xact.clone()));
            }
        }

        self.insert(gnode, XactOrigin::Remote, sequence, header.message_type, None)
            .map(XactMatch::New)
    }

    /// Open a transaction for a request this node is about to send
    pub fn local_create(
        &mut self,
        gnode: SocketAddr,
        message_type: Gtp2MessageType,
        sess_id: Option<u64>,
    ) -> GtpResult<GtpXact> {
        let sequence = self.next_sequence;
        self.next_sequence = (self.next_sequence + 1) & GTP2_MAX_SEQUENCE;
        self.insert(gnode, XactOrigin::Local, sequence, message_type, sess_id)
    }

    fn remove(&mut self, id: u64) -> Option<GtpXact> {
        let xact = self.xacts.remove(&id)?;
        self.index.remove(&Self::key(&xact));
        Some(xact)
    }

    /// Close a transaction that ran to completion
    pub fn commit(&mut self, id: u64) -> Option<GtpXact> {
        self.remove(id)
    }

    /// Close a transaction whose message was discarded. Unknown ids are
    /// tolerated so callers can abandon unconditionally.
    pub fn abandon(&mut self, id: u64) -> Option<GtpXact> {
        let xact = self.remove(id);
        if let Some(ref x) = xact {
            log::debug!(
                "[{}] abandoned {} (sqn={:#x})",
                x.gnode,
                x.message_type.name(),
                x.sequence
            );
        }
        xact
    }

    /// Bind a transaction to a session. Returns false for unknown ids.
    pub fn bind_session(&mut self, id: u64, sess_id: u64) -> bool {
        match self.xacts.get_mut(&id) {
            Some(xact) => {
                xact.sess_id = Some(sess_id);
                true
            }
            None => false,
        }
    }

    fn remove_where(&mut self, pred: impl Fn(&GtpXact) -> bool) -> usize {
        let ids: Vec<u64> = self
            .xacts
            .values()
            .filter(|x| pred(x))
            .map(|x| x.id)
            .collect();
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }

    /// Drop every transaction bound to `sess_id`
    pub fn remove_by_session(&mut self, sess_id: u64) -> usize {
        self.remove_where(|x| x.sess_id == Some(sess_id))
    }

    /// Drop every transaction running against `gnode`
    pub fn remove_by_peer(&mut self, gnode: SocketAddr) -> usize {
        self.remove_where(|x| x.gnode == gnode)
    }

    /// Transactions older than `timeout`; they stay open until abandoned
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<GtpXact> {
        self.xacts
            .values()
            .filter(|x| x.is_timed_out(now, timeout))
            .cloned()
            .collect()
    }

    pub fn find(&self, id: u64) -> Option<&GtpXact> {
        self.xacts.get(&id)
    }

    pub fn count(&self) -> usize {
        self.xacts.len()
    }

    pub fn clear(&mut self) {
        self.xacts.clear();
        self.index.clear();
    }
}

impl Default for GtpXactTable {
    fn default() -> Self {
        Self::new(GTP_XACT_DEFAULT_CAPACITY)
    }
}
