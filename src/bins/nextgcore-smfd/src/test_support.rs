//! Test doubles shared by the unit and property tests

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use ogs_diameter::GxMessage;
use ogs_gtp::v2::{
    BearerResourceCommand, CreateBearerResponse, CreateSessionRequest, DeleteBearerResponse,
    DeleteSessionRequest, Gtp2MessageType, UpdateBearerResponse,
};
use ogs_gtp::GtpXact;
use ogs_pfcp::{PfcpMessage, PfcpXact};

use crate::context::{SmfContext, SmfSess};
use crate::error::{SmfError, SmfResult};
use crate::handler::{GxHandler, N4Handler, NullSession, S5cHandler, SmfHandlers};
use crate::path::SmfPath;

pub fn sgw() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 3], 2123))
}

pub fn upf(last: u8) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, last], 8805))
}

/// Listener double that records what the state machine asked for
#[derive(Debug, Default)]
pub struct MockPath {
    pub gtp_open: bool,
    pub pfcp_open: bool,
    pub fail_gtp: bool,
    pub fail_pfcp: bool,
    /// Closes that actually closed an open GTP listener
    pub close_calls: usize,
}

impl MockPath {
    pub fn failing_gtp() -> Self {
        Self {
            fail_gtp: true,
            ..Default::default()
        }
    }

    pub fn failing_pfcp() -> Self {
        Self {
            fail_pfcp: true,
            ..Default::default()
        }
    }

    fn bind_error(path: &'static str, addr: SocketAddr) -> SmfError {
        SmfError::TransportOpen {
            path,
            addr,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        }
    }
}

impl SmfPath for MockPath {
    fn open_gtp(&mut self) -> SmfResult<()> {
        if self.fail_gtp {
            return Err(Self::bind_error("gtp", sgw()));
        }
        self.gtp_open = true;
        Ok(())
    }

    fn open_pfcp(&mut self) -> SmfResult<()> {
        if self.fail_pfcp {
            return Err(Self::bind_error("pfcp", upf(4)));
        }
        self.pfcp_open = true;
        Ok(())
    }

    fn close_gtp(&mut self) {
        if self.gtp_open {
            self.close_calls += 1;
        }
        self.gtp_open = false;
    }

    fn close_pfcp(&mut self) {
        self.pfcp_open = false;
    }
}

/// One handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub handler: &'static str,
    pub sess_id: Option<u64>,
    pub xact_id: Option<u64>,
}

/// Handler double: records every call and otherwise does nothing
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    reject_null: Vec<Gtp2MessageType>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `message_type` handlers refuse to run without a session
    pub fn rejecting_null(mut self, message_type: Gtp2MessageType) -> Self {
        self.reject_null.push(message_type);
        self
    }

    pub fn handlers(&self) -> SmfHandlers {
        SmfHandlers::new(
            Box::new(self.clone()),
            Box::new(self.clone()),
            Box::new(self.clone()),
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.calls().len()
    }

    fn record(&self, handler: &'static str, sess: Option<&SmfSess>, xact_id: Option<u64>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                handler,
                sess_id: sess.map(|s| s.id),
                xact_id,
            });
        }
    }
}

impl S5cHandler for Recorder {
    fn create_session_request(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _req: &CreateSessionRequest,
    ) {
        self.record("create_session_request", sess, Some(xact.id));
    }

    fn delete_session_request(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _req: &DeleteSessionRequest,
    ) {
        self.record("delete_session_request", sess, Some(xact.id));
    }

    fn create_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _rsp: &CreateBearerResponse,
    ) {
        self.record("create_bearer_response", sess, Some(xact.id));
    }

    fn update_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _rsp: &UpdateBearerResponse,
    ) {
        self.record("update_bearer_response", sess, Some(xact.id));
    }

    fn delete_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _rsp: &DeleteBearerResponse,
    ) {
        self.record("delete_bearer_response", sess, Some(xact.id));
    }

    fn bearer_resource_command(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _cmd: &BearerResourceCommand,
    ) {
        self.record("bearer_resource_command", sess, Some(xact.id));
    }

    fn null_session(&self, message_type: Gtp2MessageType) -> NullSession {
        if self.reject_null.contains(&message_type) {
            NullSession::Reject
        } else {
            NullSession::Accept
        }
    }
}

impl GxHandler for Recorder {
    fn cca_initial_request(
        &mut self,
        _ctx: &mut SmfContext,
        sess: &SmfSess,
        gtp_xact: Option<&GtpXact>,
        _cca: &GxMessage,
    ) {
        self.record("cca_initial_request", Some(sess), gtp_xact.map(|x| x.id));
    }

    fn cca_termination_request(
        &mut self,
        _ctx: &mut SmfContext,
        sess: &SmfSess,
        gtp_xact: Option<&GtpXact>,
        _cca: &GxMessage,
    ) {
        self.record("cca_termination_request", Some(sess), gtp_xact.map(|x| x.id));
    }

    fn re_auth_request(&mut self, _ctx: &mut SmfContext, sess: &SmfSess, _rar: &GxMessage) {
        self.record("re_auth_request", Some(sess), None);
    }
}

impl N4Handler for Recorder {
    fn association_setup_request(
        &mut self,
        _ctx: &mut SmfContext,
        _pnode: SocketAddr,
        xact: &PfcpXact,
        _req: &PfcpMessage,
    ) {
        self.record("association_setup_request", None, Some(xact.id));
    }

    fn association_setup_response(
        &mut self,
        _ctx: &mut SmfContext,
        _pnode: SocketAddr,
        xact: &PfcpXact,
        _rsp: &PfcpMessage,
    ) {
        self.record("association_setup_response", None, Some(xact.id));
    }

    fn message(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &PfcpXact,
        _msg: &PfcpMessage,
    ) -> bool {
        self.record("n4_message", sess, Some(xact.id));
        true
    }
}
