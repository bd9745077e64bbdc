//! PFCP Transactions
//!
//! Same correlation model as GTPv2-C: requests open a transaction keyed by
//! (peer, origin, sequence number), responses close the local one that
//! carries their sequence number.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::{PfcpError, PfcpResult};
use crate::header::{PfcpHeader, PfcpMessageType, PFCP_MAX_SEQUENCE};

pub const PFCP_XACT_DEFAULT_CAPACITY: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XactOrigin {
    Local,
    Remote,
}

/// PFCP Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpXact {
    pub id: u64,
    /// Peer (UPF) the transaction runs against
    pub node: SocketAddr,
    pub origin: XactOrigin,
    pub sequence: u32,
    /// Type of the request that opened the transaction
    pub message_type: PfcpMessageType,
    pub sess_id: Option<u64>,
    pub created_at: Instant,
    pub retransmit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XactMatch {
    New(PfcpXact),
    Duplicate(PfcpXact),
    Response(PfcpXact),
}

impl XactMatch {
    pub fn xact(&self) -> &PfcpXact {
        match self {
            Self::New(x) | Self::Duplicate(x) | Self::Response(x) => x,
        }
    }
}

type XactKey = (SocketAddr, XactOrigin, u32);

/// Transaction table for all PFCP peers
#[derive(Debug)]
pub struct PfcpXactTable {
    xacts: HashMap<u64, PfcpXact>,
    index: HashMap<XactKey, u64>,
    next_id: u64,
    next_sequence: u32,
    capacity: usize,
}

impl PfcpXactTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            xacts: HashMap::new(),
            index: HashMap::new(),
            next_id: 1,
            next_sequence: 1,
            capacity,
        }
    }

    fn insert(
        &mut self,
        node: SocketAddr,
        origin: XactOrigin,
        sequence: u32,
        message_type: PfcpMessageType,
        sess_id: Option<u64>,
    ) -> PfcpResult<PfcpXact> {
        if self.xacts.len() >= self.capacity {
            return Err(PfcpError::XactTableFull(self.xacts.len()));
        }
        let xact = PfcpXact {
            id: self.next_id,
            node,
            origin,
            sequence,
            message_type,
            sess_id,
            created_at: Instant::now(),
            retransmit_count: 0,
        };
        self.next_id += 1;
        self.index.insert((node, origin, sequence), xact.id);
        self.xacts.insert(xact.id, xact.clone());
        Ok(xact)
    }

    /// Match a received message to a transaction
    pub fn receive(&mut self, node: SocketAddr, header: &PfcpHeader) -> PfcpResult<XactMatch> {
        let sequence = header.sequence_number & PFCP_MAX_SEQUENCE;
        let orphan = PfcpError::OrphanResponse {
            peer: node,
            sequence,
        };

        if !header.message_type.is_request() {
            return self
                .index
                .get(&(node, XactOrigin::Local, sequence))
                .and_then(|id| self.xacts.get(id))
                .cloned()
                .map(XactMatch::Response)
                .ok_or(orphan);
        }

        let existing = self.index.get(&(node, XactOrigin::Remote, sequence)).copied();
        if let Some(xact) = existing.and_then(|id| self.xacts.get_mut(&id)) {
            xact.retransmit_count += 1;
            log::debug!(
                "[{}] retransmitted {} (sqn={:#x})",
                node,
                header.message_type.name(),
                sequence
            );
            return Ok(XactMatch::Duplicate(xact.clone()));
        }

        self.insert(node, XactOrigin::Remote, sequence, header.message_type, None)
            .map(XactMatch::New)
    }

    /// Open a transaction for a request this node is about to send
    pub fn local_create(
        &mut self,
        node: SocketAddr,
        message_type: PfcpMessageType,
        sess_id: Option<u64>,
    ) -> PfcpResult<PfcpXact> {
        let sequence = self.next_sequence;
        self.next_sequence = (self.next_sequence + 1) & PFCP_MAX_SEQUENCE;
        self.insert(node, XactOrigin::Local, sequence, message_type, sess_id)
    }

    fn remove(&mut self, id: u64) -> Option<PfcpXact> {
        let xact = self.xacts.remove(&id)?;
        self.index.remove(&(xact.node, xact.origin, xact.sequence));
        Some(xact)
    }

    pub fn commit(&mut self, id: u64) -> Option<PfcpXact> {
        self.remove(id)
    }

    /// Close a transaction whose message was discarded; unknown ids are fine
    pub fn abandon(&mut self, id: u64) -> Option<PfcpXact> {
        let xact = self.remove(id);
        if let Some(ref x) = xact {
            log::debug!("[{}] abandoned {} (sqn={:#x})", x.node, x.message_type.name(), x.sequence);
        }
        xact
    }

    pub fn bind_session(&mut self, id: u64, sess_id: u64) -> bool {
        self.xacts
            .get_mut(&id)
            .map(|x| x.sess_id = Some(sess_id))
            .is_some()
    }

    fn remove_where(&mut self, pred: impl Fn(&PfcpXact) -> bool) -> usize {
        let ids: Vec<u64> = self.xacts.values().filter(|x| pred(x)).map(|x| x.id).collect();
        ids.iter().filter(|id| self.remove(**id).is_some()).count()
    }

    pub fn remove_by_session(&mut self, sess_id: u64) -> usize {
        self.remove_where(|x| x.sess_id == Some(sess_id))
    }

    pub fn remove_by_peer(&mut self, node: SocketAddr) -> usize {
        self.remove_where(|x| x.node == node)
    }

    /// Transactions older than `timeout`; they stay open until abandoned
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<PfcpXact> {
        self.xacts
            .values()
            .filter(|x| now.saturating_duration_since(x.created_at) > timeout)
            .cloned()
            .collect()
    }

    pub fn find(&self, id: u64) -> Option<&PfcpXact> {
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

impl Default for PfcpXactTable {
    fn default() -> Self {
        Self::new(PFCP_XACT_DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upf() -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 7], 8805))
    }

    #[test]
    fn test_request_then_retransmission() {
        let mut table = PfcpXactTable::default();
        let h = PfcpHeader::new(PfcpMessageType::AssociationSetupRequest, 1);
        assert!(matches!(table.receive(upf(), &h).unwrap(), XactMatch::New(_)));
        let dup = table.receive(upf(), &h).unwrap();
        assert!(matches!(dup, XactMatch::Duplicate(_)));
        assert_eq!(dup.xact().retransmit_count, 1);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_response_to_local_request() {
        let mut table = PfcpXactTable::default();
        let local = table
            .local_create(upf(), PfcpMessageType::SessionEstablishmentRequest, Some(4))
            .unwrap();
        let h = PfcpHeader::new_with_seid(
            PfcpMessageType::SessionEstablishmentResponse,
            0x10,
            local.sequence,
        );
        assert_eq!(table.receive(upf(), &h).unwrap(), XactMatch::Response(local));
    }

    #[test]
    fn test_orphan_response() {
        let mut table = PfcpXactTable::default();
        let h = PfcpHeader::new(PfcpMessageType::HeartbeatResponse, 8);
        assert!(matches!(
            table.receive(upf(), &h),
            Err(PfcpError::OrphanResponse { sequence: 8, .. })
        ));
    }

    #[test]
    fn test_cleanup() {
        let mut table = PfcpXactTable::default();
        let x = table
            .local_create(upf(), PfcpMessageType::SessionDeletionRequest, None)
            .unwrap();
        assert!(table.bind_session(x.id, 9));
        assert!(!table.bind_session(999, 9));
        assert_eq!(table.remove_by_session(9), 1);
        assert!(table.abandon(x.id).is_none());
        assert_eq!(table.count(), 0);
    }
}
