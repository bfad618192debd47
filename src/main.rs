//! Pool cover controller entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                    │
//! │                                                            │
//! │  GpiodLines / NoHardware   FileStore   MonotonicClock      │
//! │  (LinePort)                (Storage)   (Clock)             │
//! │  LogEventSink (EventSink)                                  │
//! │                                                            │
//! │  ────────────── Port Trait Boundary ──────────────         │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │         CoverService (control loop)              │      │
//! │  │  Sequencer · LimiterGuard · MotorDriver          │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                                                            │
//! │  ControlLoop (tick thread · ChangeNotifier · shutdown)     │
//! └────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use poolcover::adapters::gpio;
use poolcover::adapters::log_sink::LogEventSink;
use poolcover::adapters::persist::FileStore;
use poolcover::adapters::time::MonotonicClock;
use poolcover::app::service::CoverService;
use poolcover::config::CoverConfig;
use poolcover::runtime::ControlLoop;

const CONFIG_ENV: &str = "POOLCOVER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "poolcover.json";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("poolcover v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let path = config_path();
    let config = CoverConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    // ── 3. Adapters ───────────────────────────────────────────
    let store = FileStore::open(&config.storage_dir)
        .with_context(|| format!("opening store at {}", config.storage_dir))?;
    let lines = gpio::acquire(&config);

    // ── 4. Control loop ───────────────────────────────────────
    let service = CoverService::new(
        config,
        lines,
        Box::new(store),
        Box::new(MonotonicClock::new()),
        Box::new(LogEventSink::new()),
    );
    let control = ControlLoop::new(service);
    control.spawn().context("starting control loop thread")?;
    info!("Initial state: {}", serde_json::to_string(&control.state())?);

    // ── 5. Wait for SIGINT / SIGTERM ──────────────────────────
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    runtime.block_on(shutdown_signal())?;

    // ── 6. Cleanup ────────────────────────────────────────────
    control.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    use tokio::signal;

    let ctrl_c = async { signal::ctrl_c().await.context("installing Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("installing SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        r = ctrl_c => {
            r?;
            info!("Received Ctrl+C, shutting down...");
        },
        r = terminate => {
            r?;
            info!("Received SIGTERM, shutting down...");
        },
    }
    Ok(())
}
