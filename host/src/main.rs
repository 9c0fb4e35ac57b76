use anyhow::Result;
use tracing::info;

mod config;
mod rtt_link;
mod sim;

use config::{HostConfig, Mode};

fn init_tracing() {
    // Default INFO; allow override via RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // try_init also installs the log bridge, so stepdrive-control's log records show up
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut cfg = HostConfig::load_default()?;
    if std::env::args().skip(1).any(|arg| arg == "--simulate") {
        cfg.mode = Mode::Simulate;
    }

    info!("stepdrive host starting in {:?} mode", cfg.mode);
    match cfg.mode {
        Mode::Probe => rtt_link::run(&cfg).await,
        Mode::Simulate => sim::run(&cfg).await,
    }
}
