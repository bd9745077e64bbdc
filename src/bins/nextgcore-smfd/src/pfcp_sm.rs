//! PFCP (Packet Forwarding Control Protocol) State Machine
//!
//! One instance per configured UPF, tracking the N4 association with it.

use std::net::SocketAddr;

use ogs_pfcp::PfcpMessageType;

use crate::timer::SmfTimerId;

/// PFCP FSM states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PfcpState {
    #[default]
    Initial,
    /// Attempting to establish association
    WillAssociate,
    /// Association established
    Associated,
    /// Association attempts exhausted; only the peer can bring it back
    Exception,
    Final,
}

impl PfcpState {
    pub fn name(&self) -> &'static str {
        match self {
            PfcpState::Initial => "PFCP_STATE_INITIAL",
            PfcpState::WillAssociate => "PFCP_STATE_WILL_ASSOCIATE",
            PfcpState::Associated => "PFCP_STATE_ASSOCIATED",
            PfcpState::Exception => "PFCP_STATE_EXCEPTION",
            PfcpState::Final => "PFCP_STATE_FINAL",
        }
    }
}

/// Events a PFCP node state machine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PfcpFsmEvent {
    Entry,
    Exit,
    /// A message from the node, after correlation
    Message(PfcpMessageType),
    Timer(SmfTimerId),
    NoHeartbeat,
}

impl PfcpFsmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Entry => "OGS_FSM_ENTRY_SIG",
            Self::Exit => "OGS_FSM_EXIT_SIG",
            Self::Message(_) => "SMF_EVT_N4_MESSAGE",
            Self::Timer(_) => "SMF_EVT_N4_TIMER",
            Self::NoHeartbeat => "SMF_EVT_N4_NO_HEARTBEAT",
        }
    }
}

/// Result of PFCP FSM event handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PfcpFsmResult {
    Handled,
    Ignored,
    Transition(PfcpState),
}

/// PFCP State Machine for UPF node
#[derive(Debug, Clone)]
pub struct PfcpFsm {
    pub state: PfcpState,
    pub pnode: SocketAddr,
    /// Set when the node comes back after losing its association
    pub restoration_required: bool,
    /// Association timer expiries since entering WillAssociate
    pub association_attempts: u32,
    /// 0 retries forever
    pub max_association_attempts: u32,
}

impl PfcpFsm {
    pub fn new(pnode: SocketAddr) -> Self {
        Self {
            state: PfcpState::Initial,
            pnode,
            restoration_required: false,
            association_attempts: 0,
            max_association_attempts: 0,
        }
    }

    pub fn with_association_limit(mut self, max_attempts: u32) -> Self {
        self.max_association_attempts = max_attempts;
        self
    }

    pub fn init(&mut self) {
        log::debug!("[{}] pfcp_state_initial", self.pnode);
        self.dispatch(PfcpFsmEvent::Entry);
    }

    pub fn fini(&mut self) {
        if self.state == PfcpState::Final {
            return;
        }
        self.dispatch(PfcpFsmEvent::Exit);
        log::debug!("[{}] pfcp_state_final", self.pnode);
        self.state = PfcpState::Final;
    }

    pub fn dispatch(&mut self, event: PfcpFsmEvent) -> PfcpFsmResult {
        let result = match self.state {
            PfcpState::Initial => self.handle_initial(event),
            PfcpState::WillAssociate => self.handle_will_associate(event),
            PfcpState::Associated => self.handle_associated(event),
            PfcpState::Exception => self.handle_exception(event),
            PfcpState::Final => PfcpFsmResult::Ignored,
        };

        if let PfcpFsmResult::Transition(new_state) = result {
            self.transition_to(new_state);
        }

        result
    }

    /// Run the exit action of the current state, switch, then run the entry
    /// action of the new one
    fn transition_to(&mut self, state: PfcpState) {
        let from = self.state;
        self.handle_state(from, PfcpFsmEvent::Exit);
        log::debug!(
            "[{}] PFCP state transition: {} -> {}",
            self.pnode,
            from.name(),
            state.name()
        );
        self.state = state;
        self.handle_state(state, PfcpFsmEvent::Entry);
    }

    fn handle_state(&mut self, state: PfcpState, event: PfcpFsmEvent) {
        match state {
            PfcpState::WillAssociate => self.handle_will_associate(event),
            PfcpState::Associated => self.handle_associated(event),
            PfcpState::Exception => self.handle_exception(event),
            PfcpState::Initial | PfcpState::Final => PfcpFsmResult::Ignored,
        };
    }

    fn handle_initial(&mut self, event: PfcpFsmEvent) -> PfcpFsmResult {
        match event {
            PfcpFsmEvent::Entry => PfcpFsmResult::Transition(PfcpState::WillAssociate),
            _ => PfcpFsmResult::Ignored,
        }
    }

    fn handle_will_associate(&mut self, event: PfcpFsmEvent) -> PfcpFsmResult {
        log::debug!("[{}] pfcp_state_will_associate: {}", self.pnode, event.name());

        match event {
            PfcpFsmEvent::Entry => {
                self.association_attempts = 0;
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Exit => PfcpFsmResult::Handled,
            PfcpFsmEvent::Timer(SmfTimerId::PfcpAssociation) => {
                self.association_attempts += 1;
                if self.max_association_attempts != 0
                    && self.association_attempts >= self.max_association_attempts
                {
                    log::error!(
                        "[{}] No association after {} attempt(s)",
                        self.pnode,
                        self.association_attempts
                    );
                    return PfcpFsmResult::Transition(PfcpState::Exception);
                }
                log::warn!("[{}] Retry association with peer", self.pnode);
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Timer(timer_id) => {
                log::warn!("[{}] {} while not associated", self.pnode, timer_id.name());
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Message(
                PfcpMessageType::AssociationSetupRequest
                | PfcpMessageType::AssociationSetupResponse,
            ) => PfcpFsmResult::Transition(PfcpState::Associated),
            PfcpFsmEvent::Message(message_type) => {
                log::warn!(
                    "[{}] cannot handle PFCP message type[{}] before association",
                    self.pnode,
                    message_type.value()
                );
                PfcpFsmResult::Ignored
            }
            PfcpFsmEvent::NoHeartbeat => PfcpFsmResult::Ignored,
        }
    }

    fn handle_associated(&mut self, event: PfcpFsmEvent) -> PfcpFsmResult {
        log::debug!("[{}] pfcp_state_associated: {}", self.pnode, event.name());

        match event {
            PfcpFsmEvent::Entry => {
                log::info!("PFCP associated [{}]", self.pnode);
                if self.restoration_required {
                    log::warn!("[{}] PFCP restoration", self.pnode);
                    self.restoration_required = false;
                }
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Exit => {
                log::info!("PFCP de-associated [{}]", self.pnode);
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Message(
                PfcpMessageType::AssociationSetupRequest
                | PfcpMessageType::AssociationSetupResponse,
            ) => {
                log::warn!("[{}] PFCP already associated", self.pnode);
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Message(_) => PfcpFsmResult::Handled,
            PfcpFsmEvent::Timer(SmfTimerId::PfcpAssociation) => PfcpFsmResult::Ignored,
            PfcpFsmEvent::Timer(timer_id) => {
                log::debug!("[{}] {}", self.pnode, timer_id.name());
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::NoHeartbeat => {
                log::warn!("No Heartbeat from UPF [{}]", self.pnode);
                self.restoration_required = true;
                PfcpFsmResult::Transition(PfcpState::WillAssociate)
            }
        }
    }

    fn handle_exception(&mut self, event: PfcpFsmEvent) -> PfcpFsmResult {
        match event {
            PfcpFsmEvent::Entry => {
                log::error!("[{}] PFCP in exception state", self.pnode);
                PfcpFsmResult::Handled
            }
            PfcpFsmEvent::Exit => PfcpFsmResult::Handled,
            // The UPF may still set up the association itself
            PfcpFsmEvent::Message(
                PfcpMessageType::AssociationSetupRequest
                | PfcpMessageType::AssociationSetupResponse,
            ) => {
                self.restoration_required = true;
                PfcpFsmResult::Transition(PfcpState::Associated)
            }
            _ => PfcpFsmResult::Ignored,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.state == PfcpState::Associated
    }

    /// The association timer should be kept running
    pub fn wants_association(&self) -> bool {
        self.state == PfcpState::WillAssociate
    }
}
