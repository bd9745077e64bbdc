//! SMF configuration
//!
//! Loaded from the `smf:` section of the YAML file given with `-c`.
//! Every section is optional and falls back to its default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use ogs_gtp::v2::TeidPool;
use ogs_gtp::GTPV2_C_UDP_PORT;
use ogs_pfcp::PFCP_UDP_PORT;
use serde::Deserialize;

use crate::context::{SmfContext, SMF_DEFAULT_MAX_SESS};
use crate::error::{SmfError, SmfResult};
use crate::timer::{SmfTimerConfigs, TimerConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub smf: SmfConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmfConfig {
    pub gtpc: ServerSection,
    pub pfcp: PfcpSection,
    pub teid: TeidSection,
    pub max_sess: usize,
    pub xact: XactSection,
    pub timer: TimerSection,
}

impl Default for SmfConfig {
    fn default() -> Self {
        Self {
            gtpc: ServerSection::default(),
            pfcp: PfcpSection::default(),
            teid: TeidSection::default(),
            max_sess: SMF_DEFAULT_MAX_SESS,
            xact: XactSection::default(),
            timer: TimerSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddrEntry {
    pub address: IpAddr,
    pub port: Option<u16>,
}

impl AddrEntry {
    fn socket_addr(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.address, self.port.unwrap_or(default_port))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub server: Vec<AddrEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PfcpSection {
    pub server: Vec<AddrEntry>,
    pub client: PfcpClientSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PfcpClientSection {
    pub upf: Vec<AddrEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeidSection {
    pub base: u32,
    pub max: u32,
}

impl Default for TeidSection {
    fn default() -> Self {
        Self {
            base: 1,
            max: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XactSection {
    pub capacity: usize,
    pub timeout_secs: u64,
}

impl Default for XactSection {
    fn default() -> Self {
        Self {
            capacity: 8192,
            timeout_secs: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerSection {
    pub pfcp_association_secs: u64,
    /// Association attempts before the node is given up on, 0 for no limit
    pub pfcp_association_max_count: u32,
    pub pfcp_no_heartbeat_secs: u64,
}

impl Default for TimerSection {
    fn default() -> Self {
        Self {
            pfcp_association_secs: 3,
            pfcp_association_max_count: 0,
            pfcp_no_heartbeat_secs: 10,
        }
    }
}

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 4));

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> SmfResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SmfError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SmfResult<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| SmfError::Config(e.to_string()))?;
        config.smf.validate()?;
        Ok(config)
    }
}

impl SmfConfig {
    fn validate(&self) -> SmfResult<()> {
        if self.teid.base == 0 || self.teid.base > self.teid.max {
            return Err(SmfError::Config(format!(
                "invalid TEID range {}..={}",
                self.teid.base, self.teid.max
            )));
        }
        if self.max_sess == 0 || self.xact.capacity == 0 {
            return Err(SmfError::Config(
                "max_sess and xact.capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gtpc_addr(&self) -> SocketAddr {
        self.gtpc
            .server
            .first()
            .map_or(SocketAddr::new(DEFAULT_ADDR, GTPV2_C_UDP_PORT), |e| {
                e.socket_addr(GTPV2_C_UDP_PORT)
            })
    }

    pub fn pfcp_addr(&self) -> SocketAddr {
        self.pfcp
            .server
            .first()
            .map_or(SocketAddr::new(DEFAULT_ADDR, PFCP_UDP_PORT), |e| {
                e.socket_addr(PFCP_UDP_PORT)
            })
    }

    pub fn upf_addrs(&self) -> Vec<SocketAddr> {
        self.pfcp
            .client
            .upf
            .iter()
            .map(|e| e.socket_addr(PFCP_UDP_PORT))
            .collect()
    }

    pub fn xact_timeout(&self) -> Duration {
        Duration::from_secs(self.xact.timeout_secs)
    }

    pub fn timer_configs(&self) -> SmfTimerConfigs {
        SmfTimerConfigs {
            pfcp_association: TimerConfig::new(
                self.timer.pfcp_association_max_count,
                self.timer.pfcp_association_secs,
            ),
            pfcp_no_heartbeat: TimerConfig::new(0, self.timer.pfcp_no_heartbeat_secs),
            ..Default::default()
        }
    }

    /// Build an empty context sized by this configuration
    pub fn context(&self) -> SmfResult<SmfContext> {
        let pool = TeidPool::with_range(self.teid.base, self.teid.max)
            .map_err(|e| SmfError::Config(e.to_string()))?;
        Ok(SmfContext::new(pool, self.max_sess, self.xact.capacity))
    }
}
