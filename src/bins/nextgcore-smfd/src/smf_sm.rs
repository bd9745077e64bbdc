//! SMF Main State Machine
//!
//! Owns the session context, the PFCP node registry, the handler set and
//! the listeners. Every inbound event goes through [`SmfFsm::dispatch`],
//! which decodes it, correlates it with a transaction, resolves its session
//! and calls the matching handler. The event is consumed by dispatch, so
//! its packet buffer is released exactly once on every path.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ogs_diameter::{CcRequestType, GxCommand, GxMessage};
use ogs_gtp::v2::{Gtp2Body, Gtp2Message, Gtp2MessageType};
use ogs_gtp::XactMatch as GtpXactMatch;
use ogs_pfcp::xact::XactMatch as PfcpXactMatch;
use ogs_pfcp::{PfcpMessage, PfcpMessageType};

use crate::context::{SmfContext, SmfSess};
use crate::error::{SmfError, SmfResult};
use crate::event::{SmfEvent, XactProtocol};
use crate::handler::{NullSession, SmfHandlers};
use crate::path::SmfPath;
use crate::pfcp_node::PfcpNodeRegistry;
use crate::pfcp_sm::PfcpFsmEvent;
use crate::pkbuf::Pkbuf;
use crate::timer::SmfTimerId;

/// SMF FSM states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmfState {
    #[default]
    Initial,
    Operational,
    Final,
}

impl SmfState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "smf_state_initial",
            Self::Operational => "smf_state_operational",
            Self::Final => "smf_state_final",
        }
    }
}

/// Result of SMF FSM event handling
#[derive(Debug)]
pub enum SmfFsmResult {
    /// A handler (or the peer state machine) took the event
    Handled,
    /// Logged and dropped without error
    Ignored,
    Transition(SmfState),
    /// Dropped; dispatch carries on
    Discarded(SmfError),
    /// The SMF cannot keep running
    Fatal(SmfError),
}

impl SmfFsmResult {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// SMF State Machine
pub struct SmfFsm<P: SmfPath> {
    state: SmfState,
    ctx: SmfContext,
    pfcp_nodes: PfcpNodeRegistry,
    handlers: SmfHandlers,
    path: P,
}

impl<P: SmfPath> SmfFsm<P> {
    /// Build the state machine for the given UPFs. Nothing is opened until
    /// [`init`](Self::init).
    pub fn new(
        ctx: SmfContext,
        upf_addrs: &[SocketAddr],
        handlers: SmfHandlers,
        path: P,
    ) -> Self {
        let mut pfcp_nodes = PfcpNodeRegistry::new();
        for addr in upf_addrs {
            if !pfcp_nodes.add(*addr) {
                log::warn!("UPF [{}] configured twice", addr);
            }
        }
        Self {
            state: SmfState::Initial,
            ctx,
            pfcp_nodes,
            handlers,
            path,
        }
    }

    /// Give up on a UPF after `max_attempts` association timer expiries.
    /// 0 keeps retrying.
    pub fn with_association_limit(mut self, max_attempts: u32) -> Self {
        self.pfcp_nodes.set_association_limit(max_attempts);
        self
    }

    /// Enter the operational state: open both listeners and bring up the
    /// per-UPF state machines. An error here is fatal.
    pub fn init(&mut self) -> SmfResult<()> {
        match self.dispatch(SmfEvent::Entry) {
            SmfFsmResult::Fatal(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Tear everything down. Safe to call more than once, and after a
    /// failed `init`.
    pub fn fini(&mut self) {
        self.dispatch(SmfEvent::Exit);
        self.state = SmfState::Final;
    }

    pub fn dispatch(&mut self, event: SmfEvent) -> SmfFsmResult {
        let result = match self.state {
            SmfState::Initial => self.handle_initial(event),
            SmfState::Operational => self.handle_operational(event),
            SmfState::Final => {
                log::debug!("smf_state_final: {}", event.name());
                SmfFsmResult::Ignored
            }
        };

        if let SmfFsmResult::Transition(new_state) = &result {
            let new_state = *new_state;
            log::debug!(
                "SMF state transition: {} -> {}",
                self.state.name(),
                new_state.name()
            );
            self.state = new_state;
            if new_state == SmfState::Operational {
                if let fatal @ SmfFsmResult::Fatal(_) = self.enter_operational() {
                    return fatal;
                }
            }
        }

        result
    }

    fn handle_initial(&mut self, event: SmfEvent) -> SmfFsmResult {
        match event {
            SmfEvent::Entry => SmfFsmResult::Transition(SmfState::Operational),
            other => {
                log::debug!("smf_state_initial: {}", other.name());
                SmfFsmResult::Ignored
            }
        }
    }

    fn handle_operational(&mut self, event: SmfEvent) -> SmfFsmResult {
        log::debug!("smf_state_operational: {}", event.name());

        match event {
            SmfEvent::Entry => self.enter_operational(),
            SmfEvent::Exit => {
                self.exit_operational();
                SmfFsmResult::Transition(SmfState::Final)
            }
            SmfEvent::S5cMessage { gnode, pkbuf } => self.handle_s5c_message(gnode, pkbuf),
            SmfEvent::GxMessage {
                sess_id,
                gtp_xact_id,
                message,
                pkbuf,
            } => self.handle_gx_message(sess_id, gtp_xact_id, message, pkbuf),
            SmfEvent::N4Message { pnode, pkbuf } => self.handle_n4_message(pnode, pkbuf),
            SmfEvent::N4Timer { pnode, timer_id } => self.handle_n4_timer(pnode, timer_id),
            SmfEvent::N4NoHeartbeat { pnode } => {
                self.dispatch_to_node(pnode, PfcpFsmEvent::NoHeartbeat)
            }
            SmfEvent::XactTimeout { protocol, xact_id } => {
                self.handle_xact_timeout(protocol, xact_id)
            }
        }
    }

    // ========================================================================
    // Entry / Exit
    // ========================================================================

    fn enter_operational(&mut self) -> SmfFsmResult {
        if let Err(e) = self.path.open_gtp() {
            log::error!("Can't establish S5C path: {}", e);
            return SmfFsmResult::Fatal(e);
        }
        if let Err(e) = self.path.open_pfcp() {
            log::error!("Can't establish N4-PFCP path: {}", e);
            return SmfFsmResult::Fatal(e);
        }
        if let Err(e) = self.pfcp_nodes.init_all() {
            log::error!("Can't start PFCP node state machines: {}", e);
            return SmfFsmResult::Fatal(e);
        }
        log::info!(
            "SMF operational with {} UPF(s)",
            self.pfcp_nodes.active_count()
        );
        SmfFsmResult::Handled
    }

    fn exit_operational(&mut self) {
        let nodes = self.pfcp_nodes.fini_all();
        let sessions = self.ctx.sess_remove_all();
        self.ctx.gtp_xact.clear();
        self.ctx.pfcp_xact.clear();
        self.path.close_gtp();
        self.path.close_pfcp();
        log::info!(
            "SMF stopped ({} PFCP node(s) finalized, {} session(s) removed)",
            nodes,
            sessions
        );
    }

    // ========================================================================
    // S5-C
    // ========================================================================

    fn handle_s5c_message(&mut self, gnode: Option<SocketAddr>, pkbuf: Pkbuf) -> SmfFsmResult {
        let message = match Gtp2Message::decode(pkbuf.data()) {
            Ok(message) => message,
            Err(e) => {
                log::error!("ogs_gtp2_parse_msg() failed: {}", e);
                return SmfFsmResult::Discarded(SmfError::gtp_decode(e));
            }
        };
        let teid = message.header.teid_or_zero();
        let message_type = message.message_type();

        let mut sess = match teid {
            0 => None,
            teid => self.ctx.sess_find_by_teid(teid),
        };
        if teid != 0 && sess.is_none() {
            log::warn!("No session for TEID {:#x} ({})", teid, message_type.name());
        }

        let Some(gnode) = sess.as_ref().map(|s| s.gnode).or(gnode) else {
            log::error!("No GTP-C peer for {}", message_type.name());
            return SmfFsmResult::Discarded(SmfError::SessionResolution(format!(
                "{} without session or peer",
                message_type.name()
            )));
        };

        let xact_match = match self.ctx.gtp_xact.receive(gnode, &message.header) {
            Ok(m) => m,
            Err(e) => {
                log::error!("[{}] ogs_gtp_xact_receive() failed: {}", gnode, e);
                return SmfFsmResult::Discarded(SmfError::gtp_correlation(e));
            }
        };
        let xact = xact_match.xact().clone();
        if let GtpXactMatch::Duplicate(_) = xact_match {
            log::warn!(
                "[{}] {} retransmitted (sqn={:#x}, count={})",
                gnode,
                message_type.name(),
                xact.sequence,
                xact.retransmit_count
            );
        }

        if message_type == Gtp2MessageType::CreateSessionRequest && teid == 0 {
            // A retransmission reuses the session its first copy created
            let existing = xact.sess_id.and_then(|id| self.ctx.sess_find(id));
            let created = match existing {
                Some(s) => s,
                None => match self.ctx.sess_add(gnode) {
                    Ok(s) => s,
                    Err(e) => {
                        log::error!("[{}] smf_sess_add() failed: {}", gnode, e);
                        self.drop_gtp_xact(&xact_match);
                        return SmfFsmResult::Discarded(e);
                    }
                },
            };
            sess = Some(created);
        }

        if let Some(ref s) = sess {
            self.ctx.gtp_xact.bind_session(xact.id, s.id);
        } else if self.handlers.s5c.null_session(message_type) == NullSession::Reject {
            log::error!("[{}] {}: no context (TEID {:#x})", gnode, message_type.name(), teid);
            self.drop_gtp_xact(&xact_match);
            return SmfFsmResult::Discarded(SmfError::SessionResolution(format!(
                "no session for TEID {teid:#x}"
            )));
        }

        let s5c = &mut self.handlers.s5c;
        let ctx = &mut self.ctx;
        let sess = sess.as_ref();
        match message.body {
            Gtp2Body::CreateSessionRequest(ref req) => {
                s5c.create_session_request(ctx, sess, &xact, req)
            }
            Gtp2Body::DeleteSessionRequest(ref req) => {
                s5c.delete_session_request(ctx, sess, &xact, req)
            }
            Gtp2Body::CreateBearerResponse(ref rsp) => {
                s5c.create_bearer_response(ctx, sess, &xact, rsp)
            }
            Gtp2Body::UpdateBearerResponse(ref rsp) => {
                s5c.update_bearer_response(ctx, sess, &xact, rsp)
            }
            Gtp2Body::DeleteBearerResponse(ref rsp) => {
                s5c.delete_bearer_response(ctx, sess, &xact, rsp)
            }
            Gtp2Body::BearerResourceCommand(ref cmd) => {
                s5c.bearer_resource_command(ctx, sess, &xact, cmd)
            }
            Gtp2Body::Other(other, _) => {
                log::warn!("Not implemented(type:{})", other.value());
                self.drop_gtp_xact(&xact_match);
                return SmfFsmResult::Ignored;
            }
        }

        if let GtpXactMatch::Response(_) = xact_match {
            self.ctx.gtp_xact.commit(xact.id);
        }
        SmfFsmResult::Handled
    }

    /// Close the transaction of a message no handler will see. A request
    /// will not be answered; a response still ends the exchange it answers.
    fn drop_gtp_xact(&mut self, xact_match: &GtpXactMatch) {
        match xact_match {
            GtpXactMatch::New(x) => {
                self.ctx.gtp_xact.abandon(x.id);
            }
            GtpXactMatch::Response(x) => {
                self.ctx.gtp_xact.commit(x.id);
            }
            // The first copy owns it
            GtpXactMatch::Duplicate(_) => {}
        }
    }

    // ========================================================================
    // Gx
    // ========================================================================

    fn handle_gx_message(
        &mut self,
        sess_id: u64,
        gtp_xact_id: Option<u64>,
        message: GxMessage,
        _pkbuf: Pkbuf,
    ) -> SmfFsmResult {
        let Some(sess) = self.ctx.sess_find(sess_id) else {
            log::error!("Gx message for unknown session {}", sess_id);
            return SmfFsmResult::Discarded(SmfError::SessionResolution(format!(
                "no session {sess_id}"
            )));
        };

        match message.command() {
            GxCommand::CreditControlAnswer => {
                if !message.is_success() {
                    log::error!(
                        "[teid={:#x}] Gx CCA failed [Result-Code:{:?}]",
                        sess.teid,
                        message.result_code
                    );
                    return SmfFsmResult::Ignored;
                }

                let gtp_xact = gtp_xact_id.and_then(|id| self.ctx.gtp_xact.find(id).cloned());
                let gx = &mut self.handlers.gx;
                match message.cc_request_type {
                    Some(CcRequestType::InitialRequest) => {
                        gx.cca_initial_request(&mut self.ctx, &sess, gtp_xact.as_ref(), &message)
                    }
                    Some(CcRequestType::TerminationRequest) => gx.cca_termination_request(
                        &mut self.ctx,
                        &sess,
                        gtp_xact.as_ref(),
                        &message,
                    ),
                    other => {
                        log::error!("Not implemented CC-Request-Type: {:?}", other);
                        return SmfFsmResult::Ignored;
                    }
                }
                SmfFsmResult::Handled
            }
            GxCommand::ReAuthRequest => {
                self.handlers
                    .gx
                    .re_auth_request(&mut self.ctx, &sess, &message);
                SmfFsmResult::Handled
            }
            GxCommand::Other { command_code, .. } => {
                log::error!("Invalid type [{}]", command_code);
                SmfFsmResult::Ignored
            }
        }
    }

    // ========================================================================
    // N4
    // ========================================================================

    fn handle_n4_message(&mut self, pnode: SocketAddr, pkbuf: Pkbuf) -> SmfFsmResult {
        if !self.pfcp_nodes.contains(pnode) {
            log::warn!("Unknown PFCP peer [{}]", pnode);
            return SmfFsmResult::Discarded(SmfError::UnknownPeer(pnode));
        }

        let message = match PfcpMessage::decode(pkbuf.data()) {
            Ok(message) => message,
            Err(e) => {
                log::error!("ogs_pfcp_parse_msg() failed: {}", e);
                return SmfFsmResult::Discarded(SmfError::pfcp_decode(e));
            }
        };

        let xact_match = match self.ctx.pfcp_xact.receive(pnode, &message.header) {
            Ok(m) => m,
            Err(e) => {
                log::error!("[{}] ogs_pfcp_xact_receive() failed: {}", pnode, e);
                return SmfFsmResult::Discarded(SmfError::pfcp_correlation(e));
            }
        };
        let xact = xact_match.xact().clone();
        if let PfcpXactMatch::Duplicate(_) = xact_match {
            log::warn!(
                "[{}] {} retransmitted (sqn={:#x})",
                pnode,
                message.message_type().name(),
                xact.sequence
            );
        }

        // No S flag means no session yet, which is not the same as SEID 0
        let sess: Option<SmfSess> = if message.header.seid_presence {
            message
                .header
                .seid
                .and_then(|seid| self.ctx.sess_find_by_seid(seid))
        } else {
            None
        };
        if let Some(ref s) = sess {
            self.ctx.pfcp_xact.bind_session(xact.id, s.id);
        }

        let message_type = message.message_type();
        let n4 = &mut self.handlers.n4;
        match message_type {
            PfcpMessageType::AssociationSetupRequest => {
                n4.association_setup_request(&mut self.ctx, pnode, &xact, &message);
            }
            PfcpMessageType::AssociationSetupResponse => {
                n4.association_setup_response(&mut self.ctx, pnode, &xact, &message);
            }
            PfcpMessageType::HeartbeatRequest
            | PfcpMessageType::HeartbeatResponse
            | PfcpMessageType::PfdManagementRequest
            | PfcpMessageType::PfdManagementResponse
            | PfcpMessageType::AssociationUpdateRequest
            | PfcpMessageType::AssociationUpdateResponse
            | PfcpMessageType::AssociationReleaseRequest
            | PfcpMessageType::AssociationReleaseResponse
            | PfcpMessageType::VersionNotSupportedResponse
            | PfcpMessageType::NodeReportRequest
            | PfcpMessageType::NodeReportResponse
            | PfcpMessageType::SessionSetDeletionRequest
            | PfcpMessageType::SessionSetDeletionResponse
            | PfcpMessageType::SessionSetModificationRequest
            | PfcpMessageType::SessionSetModificationResponse
            | PfcpMessageType::SessionEstablishmentRequest
            | PfcpMessageType::SessionEstablishmentResponse
            | PfcpMessageType::SessionModificationRequest
            | PfcpMessageType::SessionModificationResponse
            | PfcpMessageType::SessionDeletionRequest
            | PfcpMessageType::SessionDeletionResponse
            | PfcpMessageType::SessionReportRequest
            | PfcpMessageType::SessionReportResponse => {
                if !n4.message(&mut self.ctx, sess.as_ref(), &xact, &message) {
                    log::debug!("[{}] Not implemented {}", pnode, message_type.name());
                }
            }
            PfcpMessageType::Unknown(value) => {
                log::warn!("[{}] Not implemented(type:{})", pnode, value);
                if let PfcpXactMatch::New(_) = xact_match {
                    self.ctx.pfcp_xact.abandon(xact.id);
                }
                return SmfFsmResult::Ignored;
            }
        }

        if matches!(
            message_type,
            PfcpMessageType::AssociationSetupRequest | PfcpMessageType::AssociationSetupResponse
        ) {
            if let Err(e) = self
                .pfcp_nodes
                .dispatch(pnode, PfcpFsmEvent::Message(message_type))
            {
                log::error!("{}", e);
            }
        }

        if let PfcpXactMatch::Response(_) = xact_match {
            self.ctx.pfcp_xact.commit(xact.id);
        }
        SmfFsmResult::Handled
    }

    fn handle_n4_timer(&mut self, pnode: SocketAddr, timer_id: SmfTimerId) -> SmfFsmResult {
        self.dispatch_to_node(pnode, PfcpFsmEvent::Timer(timer_id))
    }

    fn dispatch_to_node(&mut self, pnode: SocketAddr, event: PfcpFsmEvent) -> SmfFsmResult {
        match self.pfcp_nodes.dispatch(pnode, event) {
            Ok(_) => SmfFsmResult::Handled,
            Err(e) => {
                log::error!("{} dropped: {}", event.name(), e);
                SmfFsmResult::Discarded(e)
            }
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn handle_xact_timeout(&mut self, protocol: XactProtocol, xact_id: u64) -> SmfFsmResult {
        let abandoned = match protocol {
            XactProtocol::Gtp => self.ctx.gtp_xact.abandon(xact_id).is_some(),
            XactProtocol::Pfcp => self.ctx.pfcp_xact.abandon(xact_id).is_some(),
        };
        if abandoned {
            log::warn!("{:?} transaction {} timed out", protocol, xact_id);
            SmfFsmResult::Handled
        } else {
            log::debug!("{:?} transaction {} already closed", protocol, xact_id);
            SmfFsmResult::Ignored
        }
    }

    /// Timeout events for every transaction older than `timeout`
    pub fn xact_timeouts(&self, now: Instant, timeout: Duration) -> Vec<SmfEvent> {
        let gtp = self
            .ctx
            .gtp_xact
            .expired(now, timeout)
            .into_iter()
            .map(|x| (XactProtocol::Gtp, x.id));
        let pfcp = self
            .ctx
            .pfcp_xact
            .expired(now, timeout)
            .into_iter()
            .map(|x| (XactProtocol::Pfcp, x.id));
        gtp.chain(pfcp)
            .map(|(protocol, xact_id)| SmfEvent::XactTimeout { protocol, xact_id })
            .collect()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SmfState {
        self.state
    }

    pub fn context(&self) -> &SmfContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SmfContext {
        &mut self.ctx
    }

    pub fn pfcp_nodes(&self) -> &PfcpNodeRegistry {
        &self.pfcp_nodes
    }

    pub fn path(&self) -> &P {
        &self.path
    }

    pub fn is_associated(&self, pnode: SocketAddr) -> bool {
        self.pfcp_nodes.is_associated(pnode)
    }

    /// The association timer for `pnode` should be re-armed
    pub fn wants_association(&self, pnode: SocketAddr) -> bool {
        self.pfcp_nodes.wants_association(pnode)
    }
}
