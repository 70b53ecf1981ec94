//! services/atlas/src/bin/atlas.rs

use atlas_lib::{
    adapters::RestGateway,
    cli::{Cli, Shell},
    config::Config,
    error::AppError,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api_url = %config.api_url, "Configuration loaded.");

    // --- 2. Initialize the Gateway Adapter ---
    let gateway = Arc::new(RestGateway::from_config(&config)?);
    let shell = Shell::new(gateway, config.tunables());

    // --- 3. Run the Command ---
    match shell.run(cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
}
