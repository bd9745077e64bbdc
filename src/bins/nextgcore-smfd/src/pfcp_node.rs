//! PFCP node registry
//!
//! Owns one [`PfcpFsm`] per configured UPF, keyed by the node address.
//! Nodes are added from configuration, get their state machine created and
//! initialised when the SMF becomes operational, and have it finalised and
//! destroyed exactly once on exit.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{SmfError, SmfResult};
use crate::pfcp_sm::{PfcpFsm, PfcpFsmEvent, PfcpFsmResult};

/// A configured UPF
#[derive(Debug)]
pub struct PfcpNode {
    pub addr: SocketAddr,
    /// Present between `create_subfsm` and `destroy`
    sm: Option<PfcpFsm>,
}

#[derive(Debug, Default)]
pub struct PfcpNodeRegistry {
    nodes: HashMap<SocketAddr, PfcpNode>,
    /// Configuration order, so bring-up is deterministic
    order: Vec<SocketAddr>,
    /// Applied to every state machine created from now on
    max_association_attempts: u32,
}

impl PfcpNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; returns false if it was already known
    pub fn add(&mut self, addr: SocketAddr) -> bool {
        if self.nodes.contains_key(&addr) {
            return false;
        }
        self.nodes.insert(addr, PfcpNode { addr, sm: None });
        self.order.push(addr);
        log::debug!("[Added] PFCP node [{}]", addr);
        true
    }

    pub fn set_association_limit(&mut self, max_attempts: u32) {
        self.max_association_attempts = max_attempts;
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.nodes.contains_key(&addr)
    }

    pub fn addrs(&self) -> &[SocketAddr] {
        &self.order
    }

    pub fn create_subfsm(&mut self, addr: SocketAddr) -> SmfResult<()> {
        let node = self
            .nodes
            .get_mut(&addr)
            .ok_or(SmfError::UnknownPeer(addr))?;
        if node.sm.is_none() {
            node.sm =
                Some(PfcpFsm::new(addr).with_association_limit(self.max_association_attempts));
        }
        Ok(())
    }

    pub fn init(&mut self, addr: SocketAddr) -> SmfResult<()> {
        self.subfsm_mut(addr)?.init();
        Ok(())
    }

    pub fn finalize(&mut self, addr: SocketAddr) -> SmfResult<()> {
        self.subfsm_mut(addr)?.fini();
        Ok(())
    }

    /// Drop the state machine; returns false if there was none
    pub fn destroy(&mut self, addr: SocketAddr) -> bool {
        self.nodes
            .get_mut(&addr)
            .and_then(|node| node.sm.take())
            .is_some()
    }

    /// Create and initialise the state machine of every node, one at a time
    pub fn init_all(&mut self) -> SmfResult<()> {
        for addr in self.order.clone() {
            self.create_subfsm(addr)?;
            self.init(addr)?;
        }
        Ok(())
    }

    /// Finalise and destroy every live state machine. Nodes already torn
    /// down are skipped, so calling this twice is harmless.
    pub fn fini_all(&mut self) -> usize {
        let mut count = 0;
        for node in self.nodes.values_mut() {
            if let Some(mut sm) = node.sm.take() {
                sm.fini();
                count += 1;
            }
        }
        count
    }

    pub fn dispatch(&mut self, addr: SocketAddr, event: PfcpFsmEvent) -> SmfResult<PfcpFsmResult> {
        Ok(self.subfsm_mut(addr)?.dispatch(event))
    }

    pub fn subfsm(&self, addr: SocketAddr) -> Option<&PfcpFsm> {
        self.nodes.get(&addr).and_then(|node| node.sm.as_ref())
    }

    fn subfsm_mut(&mut self, addr: SocketAddr) -> SmfResult<&mut PfcpFsm> {
        self.nodes
            .get_mut(&addr)
            .and_then(|node| node.sm.as_mut())
            .ok_or(SmfError::NoSubFsm(addr))
    }

    pub fn is_associated(&self, addr: SocketAddr) -> bool {
        self.subfsm(addr).is_some_and(PfcpFsm::is_associated)
    }

    pub fn wants_association(&self, addr: SocketAddr) -> bool {
        self.subfsm(addr).is_some_and(PfcpFsm::wants_association)
    }

    /// Number of live state machines
    pub fn active_count(&self) -> usize {
        self.nodes.values().filter(|node| node.sm.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfcp_sm::PfcpState;
    use crate::timer::SmfTimerId;
    use ogs_pfcp::PfcpMessageType;

    fn upf(last: u8) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, last], 8805))
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut reg = PfcpNodeRegistry::new();
        assert!(reg.add(upf(7)));
        assert!(!reg.add(upf(7)));
        assert_eq!(reg.addrs(), &[upf(7)]);
    }

    #[test]
    fn test_lifecycle() {
        let mut reg = PfcpNodeRegistry::new();
        reg.add(upf(7));
        reg.add(upf(8));
        reg.init_all().unwrap();
        assert_eq!(reg.active_count(), 2);
        assert_eq!(reg.subfsm(upf(7)).map(|sm| sm.state), Some(PfcpState::WillAssociate));

        assert_eq!(reg.fini_all(), 2);
        assert_eq!(reg.fini_all(), 0);
        assert_eq!(reg.active_count(), 0);
        assert!(!reg.destroy(upf(7)));
    }

    #[test]
    fn test_dispatch_without_subfsm() {
        let mut reg = PfcpNodeRegistry::new();
        reg.add(upf(7));
        let err = reg
            .dispatch(upf(7), PfcpFsmEvent::Timer(SmfTimerId::PfcpAssociation))
            .unwrap_err();
        assert!(matches!(err, SmfError::NoSubFsm(addr) if addr == upf(7)));
        assert!(matches!(
            reg.create_subfsm(upf(9)),
            Err(SmfError::UnknownPeer(_))
        ));
    }

    #[test]
    fn test_association_through_registry() {
        let mut reg = PfcpNodeRegistry::new();
        reg.add(upf(7));
        reg.init_all().unwrap();
        assert!(!reg.is_associated(upf(7)));
        reg.dispatch(
            upf(7),
            PfcpFsmEvent::Message(PfcpMessageType::AssociationSetupRequest),
        )
        .unwrap();
        assert!(reg.is_associated(upf(7)));
        reg.finalize(upf(7)).unwrap();
        assert!(reg.destroy(upf(7)));
        assert!(!reg.is_associated(upf(7)));
    }

    #[test]
    fn test_association_limit_applies_to_new_subfsm() {
        let mut reg = PfcpNodeRegistry::new();
        reg.set_association_limit(1);
        reg.add(upf(7));
        reg.init_all().unwrap();
        assert!(reg.wants_association(upf(7)));

        reg.dispatch(upf(7), PfcpFsmEvent::Timer(SmfTimerId::PfcpAssociation))
            .unwrap();
        assert_eq!(reg.subfsm(upf(7)).map(|sm| sm.state), Some(PfcpState::Exception));
        assert!(!reg.wants_association(upf(7)));
        assert!(!reg.wants_association(upf(9)));
    }
}
