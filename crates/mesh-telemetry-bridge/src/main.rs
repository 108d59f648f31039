use anyhow::Result;
use clap::Parser;
use mesh_core::config::BridgeConfig;
use mesh_core::telemetry::{LogConfig, init_tracing_with};
use mesh_telemetry_bridge::bootstrap::BridgeBootstrapper;

#[derive(Parser)]
#[command(name = "mesh-telemetry-bridge")]
#[command(about = "Relays mesh agent telemetry from NATS into VictoriaMetrics")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = BridgeConfig::load_config(args.config.as_deref())?;

    init_tracing_with(&LogConfig::from(&cfg.log));

    if let Some(path) = args.config.as_deref() {
        tracing::info!("Loaded config file: {}", path);
    } else {
        tracing::info!("Config: using default search (current dir)");
    }

    let running = BridgeBootstrapper::new(cfg).start().await?;
    running.wait_for_shutdown().await
}
