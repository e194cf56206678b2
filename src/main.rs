use std::path::PathBuf;

use clap::{Parser, Subcommand};
use groundlevel::{commands, log_format};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "groundlevel", about = "Ground elevation query service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve {
        #[arg(long, env = "GROUNDLEVEL_CONFIG", default_value = "config.toml")]
        config: PathBuf,
        #[arg(long, env = "GROUNDLEVEL_INTERFACE", default_value = "0.0.0.0")]
        interface: String,
        #[arg(long, env = "GROUNDLEVEL_PORT", default_value_t = 8080)]
        port: u16,
        #[arg(long, env = "GROUNDLEVEL_RASTER_POOL_CAPACITY", default_value_t = 64)]
        raster_pool_capacity: u64,
    },
    /// Load and validate the dataset configuration, then exit.
    Validate {
        #[arg(long, env = "GROUNDLEVEL_CONFIG", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .event_format(log_format::TargetFirstFormat)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            interface,
            port,
            raster_pool_capacity,
        } => commands::handle_serve(config, interface, port, raster_pool_capacity).await,
        Command::Validate { config } => commands::handle_validate(config),
    }
}
