//! Transport paths
//!
//! The top-level state machine opens and closes its listeners through
//! [`SmfPath`], so it can be driven without sockets. [`UdpPaths`] is the
//! real implementation: one UDP listener per protocol, each feeding the
//! shared event queue from its own receive task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::{SmfError, SmfResult};
use crate::event::SmfEvent;
use crate::gtp_path::GtpPath;
use crate::pfcp_path::PfcpPath;
use crate::pkbuf::{Pkbuf, PkbufPool};

/// Largest datagram either protocol is expected to carry
pub const MAX_DATAGRAM_LEN: usize = 8192;

/// First pause after a failed receive; doubled per consecutive failure
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);
const RECV_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

fn recv_backoff(consecutive_errors: u32) -> Duration {
    let shift = consecutive_errors.saturating_sub(1).min(16);
    RECV_ERROR_BACKOFF
        .saturating_mul(1 << shift)
        .min(RECV_ERROR_BACKOFF_MAX)
}

/// Listener control used by the state machine
pub trait SmfPath {
    fn open_gtp(&mut self) -> SmfResult<()>;
    fn open_pfcp(&mut self) -> SmfResult<()>;
    /// No-op when not open
    fn close_gtp(&mut self);
    /// No-op when not open
    fn close_pfcp(&mut self);
}

/// A bound UDP socket and the task draining it into the event queue
#[derive(Debug)]
pub struct UdpListener {
    name: &'static str,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    recv_task: JoinHandle<()>,
}

impl UdpListener {
    /// Bind `addr` and start receiving. `make_event` wraps each datagram.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        name: &'static str,
        addr: SocketAddr,
        pool: PkbufPool,
        tx: UnboundedSender<SmfEvent>,
        make_event: fn(SocketAddr, Pkbuf) -> SmfEvent,
    ) -> SmfResult<Self> {
        let open_err = |source| SmfError::TransportOpen {
            path: name,
            addr,
            source,
        };

        let std_socket = std::net::UdpSocket::bind(addr).map_err(open_err)?;
        std_socket.set_nonblocking(true).map_err(open_err)?;
        let socket = UdpSocket::from_std(std_socket).map_err(open_err)?;
        let local_addr = socket.local_addr().map_err(open_err)?;
        let socket = Arc::new(socket);

        let recv_socket = Arc::clone(&socket);
        let recv_task = tokio::spawn(async move {
            receive_loop(name, recv_socket, pool, tx, make_event).await;
        });

        log::info!("{} server() [{}]", name, local_addr);
        Ok(Self {
            name,
            socket,
            local_addr,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }

    pub fn close(self) {
        self.recv_task.abort();
        log::info!("{} server closed [{}]", self.name, self.local_addr);
    }
}

async fn receive_loop(
    name: &'static str,
    socket: Arc<UdpSocket>,
    pool: PkbufPool,
    tx: UnboundedSender<SmfEvent>,
    make_event: fn(SocketAddr, Pkbuf) -> SmfEvent,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    let mut errors = 0u32;
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                errors = 0;
                log::trace!("{} received {} bytes from {}", name, len, from);
                let pkbuf = pool.alloc(buf[..len].to_vec());
                if tx.send(make_event(from, pkbuf)).is_err() {
                    log::debug!("{} event queue closed", name);
                    break;
                }
            }
            Err(e) => {
                errors = errors.saturating_add(1);
                let pause = recv_backoff(errors);
                log::error!("{} recv_from() failed: {} (retry in {:?})", name, e, pause);
                tokio::time::sleep(pause).await;
            }
        }
    }
}

/// GTP-C and PFCP listeners over UDP
#[derive(Debug)]
pub struct UdpPaths {
    gtp: GtpPath,
    pfcp: PfcpPath,
}

impl UdpPaths {
    pub fn new(
        gtpc_addr: SocketAddr,
        pfcp_addr: SocketAddr,
        pool: PkbufPool,
        tx: UnboundedSender<SmfEvent>,
    ) -> Self {
        Self {
            gtp: GtpPath::new(gtpc_addr, pool.clone(), tx.clone()),
            pfcp: PfcpPath::new(pfcp_addr, pool, tx),
        }
    }

    pub fn gtp(&self) -> &GtpPath {
        &self.gtp
    }

    pub fn pfcp(&self) -> &PfcpPath {
        &self.pfcp
    }
}

impl SmfPath for UdpPaths {
    fn open_gtp(&mut self) -> SmfResult<()> {
        self.gtp.open()
    }

    fn open_pfcp(&mut self) -> SmfResult<()> {
        self.pfcp.open()
    }

    fn close_gtp(&mut self) {
        self.gtp.close();
    }

    fn close_pfcp(&mut self) {
        self.pfcp.close();
    }
}
