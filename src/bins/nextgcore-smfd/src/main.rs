//! NextGCore SMF (Session Management Function)
//!
//! EPC control plane of the SMF: GTPv2-C over S5-C towards the SGW-C,
//! PFCP over N4 towards the UPFs and Gx towards the PCRF. All inbound
//! traffic and timer expiries are funnelled into one event queue and
//! dispatched, one at a time, by the top-level state machine.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod gtp_path;
pub mod handler;
pub mod path;
pub mod pfcp_node;
pub mod pfcp_path;
pub mod pfcp_sm;
pub mod pkbuf;
pub mod smf_sm;
pub mod timer;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use config::Config;
use event::SmfEvent;
use handler::SmfHandlers;
use path::UdpPaths;
use pkbuf::PkbufPool;
use smf_sm::SmfFsm;
use timer::{SmfTimerId, TimerService};

/// NextGCore SMF - Session Management Function
#[derive(Parser, Debug)]
#[command(name = "nextgcore-smfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "EPC Session Management Function (S5-C, N4, Gx)", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/smf.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,
}

/// Global shutdown flag
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// How often expired transactions are swept
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    log::info!("NextGCore SMF v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let config = if std::path::Path::new(&args.config).exists() {
        log::info!("Loading configuration from {}", args.config);
        Config::from_file(&args.config).context("Failed to load configuration")?
    } else {
        log::warn!("Configuration file not found: {}, using defaults", args.config);
        Config::default()
    };
    let smf_config = &config.smf;

    let (tx, mut rx) = mpsc::unbounded_channel::<SmfEvent>();
    let pool = PkbufPool::new();
    let paths = UdpPaths::new(
        smf_config.gtpc_addr(),
        smf_config.pfcp_addr(),
        pool.clone(),
        tx.clone(),
    );

    let ctx = smf_config.context().context("Invalid SMF context configuration")?;
    log::info!("SMF context initialized (max_sess={})", smf_config.max_sess);

    let upf_addrs = smf_config.upf_addrs();
    let timer_configs = smf_config.timer_configs();
    let mut smf_sm = SmfFsm::new(ctx, &upf_addrs, SmfHandlers::default(), paths)
        .with_association_limit(timer_configs.pfcp_association.max_count);
    smf_sm.init().context("Failed to start SMF")?;
    log::info!("NextGCore SMF ready");

    let timers = TimerService::new(tx, timer_configs);
    for addr in &upf_addrs {
        timers.start(*addr, SmfTimerId::PfcpAssociation);
    }

    run_event_loop(
        &mut smf_sm,
        &mut rx,
        &timers,
        &pool,
        smf_config.xact_timeout(),
        shutdown,
    )
    .await;

    log::info!("Shutting down...");
    smf_sm.fini();
    log::info!(
        "Packet buffers: {} allocated, {} released",
        pool.alloc_count(),
        pool.free_count()
    );

    log::info!("NextGCore SMF stopped");
    Ok(())
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.store(true, Ordering::SeqCst);
        SHUTDOWN.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

fn is_shutting_down(shutdown: &AtomicBool) -> bool {
    shutdown.load(Ordering::SeqCst) || SHUTDOWN.load(Ordering::SeqCst)
}

/// Single consumer of the event queue
async fn run_event_loop(
    smf_sm: &mut SmfFsm<UdpPaths>,
    rx: &mut mpsc::UnboundedReceiver<SmfEvent>,
    timers: &TimerService,
    pool: &PkbufPool,
    xact_timeout: Duration,
    shutdown: Arc<AtomicBool>,
) {
    log::debug!("Entering event loop");

    let mut maintenance = tokio::time::interval(MAINTENANCE_INTERVAL);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    log::warn!("Event queue closed");
                    break;
                };

                // Keep retrying the association until the UPF answers or the
                // node runs out of attempts
                let retry = match event {
                    SmfEvent::N4Timer { pnode, timer_id: SmfTimerId::PfcpAssociation } => Some(pnode),
                    _ => None,
                };

                let result = smf_sm.dispatch(event);
                if result.is_fatal() {
                    log::error!("Fatal event result: {:?}", result);
                    break;
                }

                if let Some(pnode) = retry {
                    if smf_sm.wants_association(pnode) {
                        timers.start(pnode, SmfTimerId::PfcpAssociation);
                    }
                }
            }

            _ = maintenance.tick() => {
                if is_shutting_down(&shutdown) {
                    break;
                }

                for event in smf_sm.xact_timeouts(Instant::now(), xact_timeout) {
                    smf_sm.dispatch(event);
                }

                log::trace!(
                    "sessions={} packet buffers in use={}",
                    smf_sm.context().sess_count(),
                    pool.in_use()
                );
            }
        }
    }

    log::debug!("Exiting event loop");
}
