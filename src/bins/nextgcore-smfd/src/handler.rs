//! Message handler seams
//!
//! The dispatcher resolves the session and transaction for a message and
//! then hands it to one of these traits. What a handler does with it
//! (answering, allocating addresses, talking to the PCRF) is its own
//! business; nothing it returns feeds back into dispatch.

use std::net::SocketAddr;

use ogs_diameter::GxMessage;
use ogs_gtp::v2::{
    BearerResourceCommand, CreateBearerResponse, CreateSessionRequest, DeleteBearerResponse,
    DeleteSessionRequest, Gtp2MessageType, UpdateBearerResponse,
};
use ogs_gtp::GtpXact;
use ogs_pfcp::{PfcpMessage, PfcpXact};

use crate::context::{SmfContext, SmfSess};

/// Whether a handler wants to be called without a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullSession {
    /// Called with `None`; the handler answers with an error cause
    #[default]
    Accept,
    /// The dispatcher drops the message instead
    Reject,
}

/// S5-C (GTPv2-C) handlers
pub trait S5cHandler {
    fn create_session_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        req: &CreateSessionRequest,
    );

    fn delete_session_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        req: &DeleteSessionRequest,
    );

    fn create_bearer_response(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        rsp: &CreateBearerResponse,
    );

    fn update_bearer_response(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        rsp: &UpdateBearerResponse,
    );

    fn delete_bearer_response(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        rsp: &DeleteBearerResponse,
    );

    fn bearer_resource_command(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        cmd: &BearerResourceCommand,
    );

    fn null_session(&self, _message_type: Gtp2MessageType) -> NullSession {
        NullSession::Accept
    }
}

/// Gx handlers. Gx traffic always belongs to a session that started the
/// policy exchange, so the session is never optional here.
pub trait GxHandler {
    fn cca_initial_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: &SmfSess,
        gtp_xact: Option<&GtpXact>,
        cca: &GxMessage,
    );

    fn cca_termination_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: &SmfSess,
        gtp_xact: Option<&GtpXact>,
        cca: &GxMessage,
    );

    fn re_auth_request(&mut self, ctx: &mut SmfContext, sess: &SmfSess, rar: &GxMessage);
}

/// N4 (PFCP) handlers
pub trait N4Handler {
    fn association_setup_request(
        &mut self,
        ctx: &mut SmfContext,
        pnode: SocketAddr,
        xact: &PfcpXact,
        req: &PfcpMessage,
    );

    fn association_setup_response(
        &mut self,
        ctx: &mut SmfContext,
        pnode: SocketAddr,
        xact: &PfcpXact,
        rsp: &PfcpMessage,
    );

    /// Every other N4 message. Returns false when nothing handled it.
    fn message(
        &mut self,
        _ctx: &mut SmfContext,
        _sess: Option<&SmfSess>,
        _xact: &PfcpXact,
        _msg: &PfcpMessage,
    ) -> bool {
        false
    }
}

/// The handler set the dispatcher is built with
pub struct SmfHandlers {
    pub s5c: Box<dyn S5cHandler + Send>,
    pub gx: Box<dyn GxHandler + Send>,
    pub n4: Box<dyn N4Handler + Send>,
}

impl SmfHandlers {
    pub fn new(
        s5c: Box<dyn S5cHandler + Send>,
        gx: Box<dyn GxHandler + Send>,
        n4: Box<dyn N4Handler + Send>,
    ) -> Self {
        Self { s5c, gx, n4 }
    }
}

impl Default for SmfHandlers {
    fn default() -> Self {
        Self::new(
            Box::new(DefaultHandler),
            Box::new(DefaultHandler),
            Box::new(DefaultHandler),
        )
    }
}

// ============================================================================
// Default handlers
// ============================================================================

/// Handlers the daemon runs with: they log every message and keep the
/// session table in step with session creation and teardown.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

fn sess_name(sess: Option<&SmfSess>) -> String {
    sess.map_or_else(|| "-".to_string(), |s| format!("{:#x}", s.teid))
}

impl S5cHandler for DefaultHandler {
    fn create_session_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        req: &CreateSessionRequest,
    ) {
        let Some(sess) = sess else {
            log::error!("[{}] Create Session Request: no context", xact.gnode);
            return;
        };
        log::info!(
            "Create Session Request [teid={:#x}, imsi={}]",
            sess.teid,
            req.imsi().as_deref().unwrap_or("-")
        );
        if sess.imsi.is_none() {
            let mut updated = sess.clone();
            updated.imsi = req.imsi();
            ctx.sess_update(&updated);
        }
    }

    fn delete_session_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        xact: &GtpXact,
        _req: &DeleteSessionRequest,
    ) {
        let Some(sess) = sess else {
            log::error!("[{}] Delete Session Request: no context", xact.gnode);
            return;
        };
        log::info!("Delete Session Request [teid={:#x}]", sess.teid);
        ctx.sess_remove(sess.id);
    }

    fn create_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        _xact: &GtpXact,
        rsp: &CreateBearerResponse,
    ) {
        log::info!(
            "Create Bearer Response [teid={}, cause={:?}]",
            sess_name(sess),
            rsp.cause()
        );
    }

    fn update_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        _xact: &GtpXact,
        rsp: &UpdateBearerResponse,
    ) {
        log::info!(
            "Update Bearer Response [teid={}, cause={:?}]",
            sess_name(sess),
            rsp.cause()
        );
    }

    fn delete_bearer_response(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        _xact: &GtpXact,
        rsp: &DeleteBearerResponse,
    ) {
        log::info!(
            "Delete Bearer Response [teid={}, cause={:?}]",
            sess_name(sess),
            rsp.cause()
        );
    }

    fn bearer_resource_command(
        &mut self,
        _ctx: &mut SmfContext,
        sess: Option<&SmfSess>,
        _xact: &GtpXact,
        _cmd: &BearerResourceCommand,
    ) {
        log::info!("Bearer Resource Command [teid={}]", sess_name(sess));
    }
}

impl GxHandler for DefaultHandler {
    fn cca_initial_request(
        &mut self,
        _ctx: &mut SmfContext,
        sess: &SmfSess,
        _gtp_xact: Option<&GtpXact>,
        _cca: &GxMessage,
    ) {
        log::info!("Gx CCA-Initial [teid={:#x}]", sess.teid);
    }

    fn cca_termination_request(
        &mut self,
        ctx: &mut SmfContext,
        sess: &SmfSess,
        _gtp_xact: Option<&GtpXact>,
        _cca: &GxMessage,
    ) {
        log::info!("Gx CCA-Termination [teid={:#x}]", sess.teid);
        ctx.sess_remove(sess.id);
    }

    fn re_auth_request(&mut self, _ctx: &mut SmfContext, sess: &SmfSess, _rar: &GxMessage) {
        log::info!("Gx Re-Auth-Request [teid={:#x}]", sess.teid);
    }
}

impl N4Handler for DefaultHandler {
    fn association_setup_request(
        &mut self,
        _ctx: &mut SmfContext,
        pnode: SocketAddr,
        _xact: &PfcpXact,
        _req: &PfcpMessage,
    ) {
        log::info!("[{}] PFCP Association Setup Request", pnode);
    }

    fn association_setup_response(
        &mut self,
        _ctx: &mut SmfContext,
        pnode: SocketAddr,
        _xact: &PfcpXact,
        rsp: &PfcpMessage,
    ) {
        log::info!(
            "[{}] PFCP Association Setup Response [cause={:?}]",
            pnode,
            rsp.cause()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogs_gtp::v2::{Gtp2Body, Gtp2Header, Gtp2Ie, Gtp2Message};
    use ogs_gtp::v2::message::ie_type;

    fn sgw() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 3], 2123))
    }

    #[test]
    fn test_default_null_session_policy() {
        let handler = DefaultHandler;
        assert_eq!(
            handler.null_session(Gtp2MessageType::DeleteSessionRequest),
            NullSession::Accept
        );
    }

    #[test]
    fn test_default_handler_session_lifecycle() {
        let mut ctx = SmfContext::default();
        let sess = ctx.sess_add(sgw()).unwrap();

        let header = Gtp2Header::new_no_teid(Gtp2MessageType::CreateSessionRequest, 1);
        let xact = match ctx.gtp_xact.receive(sgw(), &header).unwrap() {
            ogs_gtp::XactMatch::New(x) => x,
            other => panic!("unexpected {other:?}"),
        };
        // IMSI 001010000000001 in TBCD
        let imsi = Gtp2Ie::new(
            ie_type::IMSI,
            0,
            vec![0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0xf1],
        );
        let msg = Gtp2Message::new(header, vec![imsi]);
        let Gtp2Body::CreateSessionRequest(ref req) = msg.body else {
            panic!("not a Create Session Request");
        };

        let mut handler = DefaultHandler;
        handler.create_session_request(&mut ctx, Some(&sess), &xact, req);
        assert!(ctx.sess_find(sess.id).unwrap().imsi.is_some());

        let dsr = DeleteSessionRequest { ies: Vec::new() };
        handler.delete_session_request(&mut ctx, Some(&sess), &xact, &dsr);
        assert_eq!(ctx.sess_count(), 0);
    }
}
