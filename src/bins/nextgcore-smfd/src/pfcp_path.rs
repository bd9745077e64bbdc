//! PFCP Path Management
//!
//! The N4 listener. Every datagram becomes an `SMF_EVT_N4_MESSAGE`
//! carrying the sender as the PFCP peer.

use std::net::SocketAddr;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::SmfResult;
use crate::event::SmfEvent;
use crate::path::UdpListener;
use crate::pkbuf::PkbufPool;

#[derive(Debug)]
pub struct PfcpPath {
    addr: SocketAddr,
    pool: PkbufPool,
    tx: UnboundedSender<SmfEvent>,
    listener: Option<UdpListener>,
}

impl PfcpPath {
    pub fn new(addr: SocketAddr, pool: PkbufPool, tx: UnboundedSender<SmfEvent>) -> Self {
        Self {
            addr,
            pool,
            tx,
            listener: None,
        }
    }

    pub fn open(&mut self) -> SmfResult<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let listener = UdpListener::open(
            "pfcp",
            self.addr,
            self.pool.clone(),
            self.tx.clone(),
            SmfEvent::n4_message,
        )?;
        self.listener = Some(listener);
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
    }

    /// Bound address while open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(UdpListener::local_addr)
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }
}
