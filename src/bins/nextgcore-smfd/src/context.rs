//! SMF Context Management
//!
//! The session table, the GTP peer list and both transaction tables. All of
//! it is owned by the top-level state machine and only touched from the
//! dispatch loop, so nothing here is locked.

use std::collections::HashMap;
use std::net::SocketAddr;

use ogs_gtp::v2::TeidPool;
use ogs_gtp::{GtpXactTable, GTP_XACT_DEFAULT_CAPACITY};
use ogs_pfcp::{PfcpXactTable, PFCP_XACT_DEFAULT_CAPACITY};

use crate::error::{SmfError, SmfResult};

/// Default maximum number of sessions
pub const SMF_DEFAULT_MAX_SESS: usize = 4096;

// ============================================================================
// Session
// ============================================================================

/// SMF session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmfSess {
    /// Session ID
    pub id: u64,
    /// Local S5-C TEID, assigned when the session is created
    pub teid: u32,
    /// N4 SEID, known once the UPF has established the session
    pub n4_seid: Option<u64>,
    /// Access gateway (SGW-C) the session was created by
    pub gnode: SocketAddr,
    /// UPF serving the session
    pub pfcp_node: Option<SocketAddr>,
    pub imsi: Option<String>,
}

impl SmfSess {
    pub fn new(id: u64, teid: u32, gnode: SocketAddr) -> Self {
        Self {
            id,
            teid,
            n4_seid: None,
            gnode,
            pfcp_node: None,
            imsi: None,
        }
    }
}

/// GTP-C peer learned from inbound traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpNode {
    pub addr: SocketAddr,
    /// Sessions currently created by this peer
    pub sess_ids: Vec<u64>,
}

// ============================================================================
// SMF Context
// ============================================================================

/// SMF context
#[derive(Debug)]
pub struct SmfContext {
    sess_list: HashMap<u64, SmfSess>,
    /// S5-C TEID -> session
    teid_hash: HashMap<u32, u64>,
    /// N4 SEID -> session
    seid_hash: HashMap<u64, u64>,
    gnode_list: HashMap<SocketAddr, GtpNode>,
    teid_pool: TeidPool,
    next_sess_id: u64,
    max_num_of_sess: usize,

    pub gtp_xact: GtpXactTable,
    pub pfcp_xact: PfcpXactTable,
}

impl Default for SmfContext {
    fn default() -> Self {
        Self::new(
            TeidPool::new(),
            SMF_DEFAULT_MAX_SESS,
            GTP_XACT_DEFAULT_CAPACITY.min(PFCP_XACT_DEFAULT_CAPACITY),
        )
    }
}

impl SmfContext {
    pub fn new(teid_pool: TeidPool, max_sess: usize, xact_capacity: usize) -> Self {
        Self {
            sess_list: HashMap::new(),
            teid_hash: HashMap::new(),
            seid_hash: HashMap::new(),
            gnode_list: HashMap::new(),
            teid_pool,
            next_sess_id: 1,
            max_num_of_sess: max_sess,
            gtp_xact: GtpXactTable::new(xact_capacity),
            pfcp_xact: PfcpXactTable::new(xact_capacity),
        }
    }

    // ========================================================================
    // Session Management
    // ========================================================================

    /// Create a session for `gnode` with a fresh S5-C TEID
    pub fn sess_add(&mut self, gnode: SocketAddr) -> SmfResult<SmfSess> {
        if self.sess_list.len() >= self.max_num_of_sess {
            return Err(SmfError::Resource(format!(
                "maximum number of sessions [{}] reached",
                self.max_num_of_sess
            )));
        }

        let teid_hash = &self.teid_hash;
        let teid = self
            .teid_pool
            .allocate(|teid| teid_hash.contains_key(&teid))
            .map_err(|e| SmfError::Resource(e.to_string()))?;

        let id = self.next_sess_id;
        self.next_sess_id += 1;

        let sess = SmfSess::new(id, teid, gnode);
        self.teid_hash.insert(teid, id);
        self.sess_list.insert(id, sess.clone());
        self.gnode_list
            .entry(gnode)
            .or_insert_with(|| {
                log::info!("[Added] GTP-C peer [{}]", gnode);
                GtpNode {
                    addr: gnode,
                    sess_ids: Vec::new(),
                }
            })
            .sess_ids
            .push(id);

        log::info!(
            "[Added] Session (id={}, teid={:#x}, gnode={})",
            id,
            teid,
            gnode
        );
        Ok(sess)
    }

    /// Remove a session, closing its transactions and unlinking both keys
    pub fn sess_remove(&mut self, id: u64) -> Option<SmfSess> {
        let sess = self.sess_list.remove(&id)?;

        self.teid_hash.remove(&sess.teid);
        if let Some(seid) = sess.n4_seid {
            self.seid_hash.remove(&seid);
        }

        let gtp = self.gtp_xact.remove_by_session(id);
        let pfcp = self.pfcp_xact.remove_by_session(id);
        if gtp + pfcp > 0 {
            log::debug!(
                "Closed {} GTP and {} PFCP transactions of session {}",
                gtp,
                pfcp,
                id
            );
        }

        if let Some(node) = self.gnode_list.get_mut(&sess.gnode) {
            node.sess_ids.retain(|&sid| sid != id);
            if node.sess_ids.is_empty() {
                self.gnode_list.remove(&sess.gnode);
                self.gtp_xact.remove_by_peer(sess.gnode);
                log::info!("[Removed] GTP-C peer [{}]", sess.gnode);
            }
        }

        log::info!("[Removed] Session (id={}, teid={:#x})", id, sess.teid);
        Some(sess)
    }

    /// Remove every session; returns how many were removed
    pub fn sess_remove_all(&mut self) -> usize {
        let ids: Vec<u64> = self.sess_list.keys().copied().collect();
        ids.into_iter()
            .filter(|id| self.sess_remove(*id).is_some())
            .count()
    }

    /// Record the SEID the UPF assigned to a session
    pub fn sess_set_seid(&mut self, id: u64, seid: u64) -> SmfResult<()> {
        if let Some(owner) = self.seid_hash.get(&seid) {
            if *owner != id {
                return Err(SmfError::SessionResolution(format!(
                    "SEID {seid:#x} already belongs to session {owner}"
                )));
            }
        }
        let sess = self
            .sess_list
            .get_mut(&id)
            .ok_or_else(|| SmfError::SessionResolution(format!("no session {id}")))?;

        if let Some(old) = sess.n4_seid.replace(seid) {
            self.seid_hash.remove(&old);
        }
        self.seid_hash.insert(seid, id);
        log::debug!("Session {} bound to SEID {:#x}", id, seid);
        Ok(())
    }

    /// Bind the UPF serving a session
    pub fn sess_set_pfcp_node(&mut self, id: u64, pnode: SocketAddr) -> bool {
        self.sess_list
            .get_mut(&id)
            .map(|sess| sess.pfcp_node = Some(pnode))
            .is_some()
    }

    /// Write back handler-owned fields; the lookup keys are not touched
    pub fn sess_update(&mut self, sess: &SmfSess) -> bool {
        match self.sess_list.get_mut(&sess.id) {
            Some(entry) => {
                entry.imsi = sess.imsi.clone();
                entry.pfcp_node = sess.pfcp_node;
                true
            }
            None => false,
        }
    }

    pub fn sess_find(&self, id: u64) -> Option<SmfSess> {
        self.sess_list.get(&id).cloned()
    }

    pub fn sess_find_by_teid(&self, teid: u32) -> Option<SmfSess> {
        self.teid_hash.get(&teid).and_then(|id| self.sess_find(*id))
    }

    pub fn sess_find_by_seid(&self, seid: u64) -> Option<SmfSess> {
        self.seid_hash.get(&seid).and_then(|id| self.sess_find(*id))
    }

    pub fn sess_count(&self) -> usize {
        self.sess_list.len()
    }

    // ========================================================================
    // GTP-C Peers
    // ========================================================================

    pub fn gnode_find(&self, addr: SocketAddr) -> Option<&GtpNode> {
        self.gnode_list.get(&addr)
    }

    pub fn gnode_count(&self) -> usize {
        self.gnode_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogs_gtp::v2::Gtp2MessageType;
    use ogs_pfcp::PfcpMessageType;

    fn sgw() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 3], 2123))
    }

    fn upf() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 7], 8805))
    }

    #[test]
    fn test_sess_add_assigns_unique_teid() {
        let mut ctx = SmfContext::default();
        let a = ctx.sess_add(sgw()).unwrap();
        let b = ctx.sess_add(sgw()).unwrap();
        assert_ne!(a.teid, 0);
        assert_ne!(a.teid, b.teid);
        assert_eq!(ctx.sess_find_by_teid(a.teid), Some(a));
        assert_eq!(ctx.sess_count(), 2);
        assert_eq!(ctx.gnode_find(sgw()).map(|n| n.sess_ids.len()), Some(2));
    }

    #[test]
    fn test_sess_add_limit() {
        let mut ctx = SmfContext::new(TeidPool::new(), 1, 16);
        ctx.sess_add(sgw()).unwrap();
        assert!(matches!(ctx.sess_add(sgw()), Err(SmfError::Resource(_))));
    }

    #[test]
    fn test_teid_pool_exhaustion() {
        let mut ctx = SmfContext::new(TeidPool::with_range(10, 11).unwrap(), 16, 16);
        ctx.sess_add(sgw()).unwrap();
        ctx.sess_add(sgw()).unwrap();
        assert!(matches!(ctx.sess_add(sgw()), Err(SmfError::Resource(_))));
    }

    #[test]
    fn test_teid_reused_after_remove() {
        let mut ctx = SmfContext::new(TeidPool::with_range(10, 10).unwrap(), 16, 16);
        let sess = ctx.sess_add(sgw()).unwrap();
        ctx.sess_remove(sess.id);
        assert_eq!(ctx.sess_add(sgw()).unwrap().teid, 10);
    }

    #[test]
    fn test_sess_seid_binding() {
        let mut ctx = SmfContext::default();
        let a = ctx.sess_add(sgw()).unwrap();
        let b = ctx.sess_add(sgw()).unwrap();

        ctx.sess_set_seid(a.id, 0x100).unwrap();
        assert_eq!(ctx.sess_find_by_seid(0x100).map(|s| s.id), Some(a.id));
        assert!(ctx.sess_set_seid(b.id, 0x100).is_err());

        ctx.sess_set_seid(a.id, 0x200).unwrap();
        assert!(ctx.sess_find_by_seid(0x100).is_none());
        assert!(ctx.sess_set_seid(999, 0x300).is_err());
    }

    #[test]
    fn test_sess_remove_unlinks_everything() {
        let mut ctx = SmfContext::default();
        let sess = ctx.sess_add(sgw()).unwrap();
        ctx.sess_set_seid(sess.id, 0x55).unwrap();

        ctx.gtp_xact
            .local_create(sgw(), Gtp2MessageType::CreateBearerRequest, Some(sess.id))
            .unwrap();
        ctx.pfcp_xact
            .local_create(upf(), PfcpMessageType::SessionEstablishmentRequest, Some(sess.id))
            .unwrap();

        let removed = ctx.sess_remove(sess.id).unwrap();
        assert_eq!(removed.id, sess.id);
        assert!(ctx.sess_find_by_teid(sess.teid).is_none());
        assert!(ctx.sess_find_by_seid(0x55).is_none());
        assert_eq!(ctx.gtp_xact.count(), 0);
        assert_eq!(ctx.pfcp_xact.count(), 0);
        assert_eq!(ctx.gnode_count(), 0);
        assert!(ctx.sess_remove(sess.id).is_none());
    }

    #[test]
    fn test_sess_remove_all() {
        let mut ctx = SmfContext::default();
        for _ in 0..3 {
            ctx.sess_add(sgw()).unwrap();
        }
        assert_eq!(ctx.sess_remove_all(), 3);
        assert_eq!(ctx.sess_count(), 0);
        assert_eq!(ctx.sess_remove_all(), 0);
    }

    #[test]
    fn test_sess_update_keeps_keys() {
        let mut ctx = SmfContext::default();
        let mut sess = ctx.sess_add(sgw()).unwrap();
        let teid = sess.teid;
        sess.imsi = Some("001010000000001".to_string());
        sess.teid = 0;
        assert!(ctx.sess_update(&sess));
        let stored = ctx.sess_find(sess.id).unwrap();
        assert_eq!(stored.teid, teid);
        assert_eq!(stored.imsi.as_deref(), Some("001010000000001"));
    }
}
