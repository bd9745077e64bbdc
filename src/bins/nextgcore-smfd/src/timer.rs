//! SMF Timer Management
//!
//! Timer expiries are not handled where they fire: each armed timer sleeps
//! on the runtime and then posts an [`SmfEvent::N4Timer`] onto the event
//! queue, so the dispatch loop sees it in order with everything else.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::event::SmfEvent;

// ============================================================================
// Timer IDs
// ============================================================================

/// SMF timer identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmfTimerId {
    /// PFCP association timer
    PfcpAssociation,
    /// PFCP no heartbeat timer
    PfcpNoHeartbeat,
    /// PFCP no establishment response timer
    PfcpNoEstablishmentResponse,
    /// PFCP no deletion response timer
    PfcpNoDeletionResponse,
}

impl SmfTimerId {
    /// Get timer name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PfcpAssociation => "SMF_TIMER_PFCP_ASSOCIATION",
            Self::PfcpNoHeartbeat => "SMF_TIMER_PFCP_NO_HEARTBEAT",
            Self::PfcpNoEstablishmentResponse => "SMF_TIMER_PFCP_NO_ESTABLISHMENT_RESPONSE",
            Self::PfcpNoDeletionResponse => "SMF_TIMER_PFCP_NO_DELETION_RESPONSE",
        }
    }
}

// ============================================================================
// Timer Configuration
// ============================================================================

/// Timer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub enabled: bool,
    /// Expiries before the owner gives up, 0 for unlimited. Only the
    /// association timer is bounded.
    pub max_count: u32,
    pub duration: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_count: 0,
            duration: Duration::ZERO,
        }
    }
}

impl TimerConfig {
    pub fn new(max_count: u32, duration_secs: u64) -> Self {
        Self {
            enabled: true,
            max_count,
            duration: Duration::from_secs(duration_secs),
        }
    }
}

/// SMF timer configurations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmfTimerConfigs {
    pub pfcp_association: TimerConfig,
    pub pfcp_no_heartbeat: TimerConfig,
    pub pfcp_no_establishment_response: TimerConfig,
    pub pfcp_no_deletion_response: TimerConfig,
}

impl Default for SmfTimerConfigs {
    fn default() -> Self {
        Self {
            pfcp_association: TimerConfig::new(0, 3),
            pfcp_no_heartbeat: TimerConfig::new(0, 10),
            pfcp_no_establishment_response: TimerConfig::new(0, 3),
            pfcp_no_deletion_response: TimerConfig::new(0, 3),
        }
    }
}

impl SmfTimerConfigs {
    pub fn get(&self, timer_id: SmfTimerId) -> &TimerConfig {
        match timer_id {
            SmfTimerId::PfcpAssociation => &self.pfcp_association,
            SmfTimerId::PfcpNoHeartbeat => &self.pfcp_no_heartbeat,
            SmfTimerId::PfcpNoEstablishmentResponse => &self.pfcp_no_establishment_response,
            SmfTimerId::PfcpNoDeletionResponse => &self.pfcp_no_deletion_response,
        }
    }
}

// ============================================================================
// Timer Service
// ============================================================================

/// Arms one-shot timers that report back through the event queue
#[derive(Debug, Clone)]
pub struct TimerService {
    tx: UnboundedSender<SmfEvent>,
    configs: SmfTimerConfigs,
}

impl TimerService {
    pub fn new(tx: UnboundedSender<SmfEvent>, configs: SmfTimerConfigs) -> Self {
        Self { tx, configs }
    }

    /// Arm `timer_id` for `pnode`.
    ///
    /// Returns `None` when the timer is disabled. Dropping the handle does
    /// not cancel the timer; call `abort()` on it to do that. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, pnode: SocketAddr, timer_id: SmfTimerId) -> Option<JoinHandle<()>> {
        let config = self.configs.get(timer_id);
        if !config.enabled {
            log::warn!("Timer {} is not enabled", timer_id.name());
            return None;
        }

        let duration = config.duration;
        let tx = self.tx.clone();
        log::debug!(
            "[{}] started {} ({:?})",
            pnode,
            timer_id.name(),
            duration
        );
        Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The queue is gone once the daemon is shutting down
            if tx.send(SmfEvent::n4_timer(pnode, timer_id)).is_err() {
                log::debug!("[{}] {} expired after shutdown", pnode, timer_id.name());
            }
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================
