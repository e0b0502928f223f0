use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod safety;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs, Command};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    if let Some(path) = crate::config::load_env_file(None) {
        info!("Loaded environment from {}", path.display());
    }

    let args = CliArgs::parse();

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // validate() guarantees a URL is present
    let database_url = config.database.url.clone().unwrap_or_default();
    let database = match db::connect(&database_url, config.database.pool_size).await {
        Ok(database) => database,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    if args.command == Some(Command::Seed) {
        let result = db::seed::seed_customers(database.as_ref()).await;
        database.close().await;
        let total = result?;
        info!("Seeding finished: customers has {} rows", total);
        return Ok(());
    }

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = match LlmManager::new(&config.llm) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to initialize LLM manager: {}", e);
            database.close().await;
            return Err(e.into());
        }
    };

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, Arc::clone(&database), llm_manager)?);

    info!("Starting SQL agent on {}:{}", web_config.host, web_config.port);
    let served = web::run_server(web_config, app_state).await;

    database.close().await;
    match served {
        Ok(()) => {
            info!("Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
