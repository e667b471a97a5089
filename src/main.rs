use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use megagate::{Config, MegaCmdStorage, Result, WebServer};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = megagate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        megagate::logging::init_console_only(&config.logging.level);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    info!("megagate - MEGA storage proxy");

    let storage = MegaCmdStorage::login(&config.mega).await?;
    let server = WebServer::new(&config, Arc::new(storage))?;
    info!("Server configured on {}", server.addr());

    server.run().await
}
