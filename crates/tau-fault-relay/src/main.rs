use anyhow::Result;
use clap::Parser;
use tau_fault_relay::{run_relay_server, RelayCli, RelayConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = RelayConfig::try_from(RelayCli::parse())?;
    run_relay_server(config).await
}
