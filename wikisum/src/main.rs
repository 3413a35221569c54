/*
wikisum - HTTP server binary.
Loads configuration, prepares the database and serves the summary API.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use common::{init_db_pool, run_migrations, Config};
use wikisum::orchestrator::{Orchestrator, Pipeline};
use wikisum::server::{launch_rocket, AppState};
use wikisum::storage::SummaryStore;
use wikisum::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "wikisum", about = "Wikipedia summary service")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: text or json
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,
}

/// `config.default.toml` from the working directory, with `--config FILE` (or a local
/// `config.toml`) merged over it.
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = match explicit {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p)
        }
        None => {
            let p = PathBuf::from("config.toml");
            if p.exists() { Some(p) } else { None }
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.clone()).await?;

    let format = args.log_format.as_deref().unwrap_or(&config.logging.format);
    init_tracing(args.log_level.as_deref(), &config.logging.level, format, std::io::stdout);
    info!(override = ?args.config, "configuration loaded");

    // Resolve and log the absolute DB path before connecting
    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let db_pool = match init_db_pool(&db_path_abs).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };

    if config
        .admin
        .as_ref()
        .and_then(|a| a.auto_migrate)
        .unwrap_or(false)
    {
        info!("Auto-migrate enabled: running DB migrations");
        run_migrations(&db_pool).await?;
        info!("DB migrations completed");
    }

    let pipeline = Pipeline::from_config(&config).context("failed to build summary pipeline")?;
    let orchestrator = Orchestrator::new(SummaryStore::new(db_pool), pipeline);
    let state = AppState::new(Arc::new(orchestrator));

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state, &config).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
