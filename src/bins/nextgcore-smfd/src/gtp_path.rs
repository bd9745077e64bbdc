//! GTP Path Management
//!
//! The S5-C listener. Every datagram becomes an `SMF_EVT_S5C_MESSAGE`
//! carrying the sender as the GTP-C peer.

use std::net::SocketAddr;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::SmfResult;
use crate::event::SmfEvent;
use crate::path::UdpListener;
use crate::pkbuf::PkbufPool;

#[derive(Debug)]
pub struct GtpPath {
    addr: SocketAddr,
    pool: PkbufPool,
    tx: UnboundedSender<SmfEvent>,
    listener: Option<UdpListener>,
}

impl GtpPath {
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
            "gtp",
            self.addr,
            self.pool.clone(),
            self.tx.clone(),
            SmfEvent::s5c_message,
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
