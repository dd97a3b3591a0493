//! `flagrun-server` binary.

use clap::Parser;
use flagrun_config::{CliArgs, Config};
use flagrun_server::{NoGameplay, Server, ServerError, load_world};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("{e}");
        eprintln!("flagrun-server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let args = CliArgs::parse();
    let config_dir = match &args.config {
        Some(dir) => dir.clone(),
        None => Config::default_dir()?,
    };
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    flagrun_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));
    tracing::info!(
        "Starting flagrun server (config: {}, tick: {} ms)",
        config_dir.display(),
        config.network.tick_interval_ms
    );

    let world = load_world(&config)?;
    let server = Server::new(&config, world, Box::new(NoGameplay))?;

    let network = server.network();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, shutting down");
                network.shutdown();
            }
            Err(e) => tracing::warn!("Cannot listen for interrupt: {e}"),
        }
    });

    server.run().await
}
