//! panelpress HTTP server

use clap::Parser;
use panelpress::{Config, JobController, run_with_shutdown};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Serve the panelpress conversion API.
#[derive(Parser, Debug)]
#[command(
    name = "panelpress-server",
    version,
    about = "Serve the panelpress manga conversion API"
)]
struct Args {
    /// Configuration file (JSON). Built-in defaults are used when absent.
    #[arg(env = "PANELPRESS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "panelpress=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            Config::from_file(&path)?
        }
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    for dir in [
        &config.storage.scratch_dir,
        &config.storage.output_dir,
        &config.storage.upload_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let controller = JobController::from_config(Arc::new(config));
    run_with_shutdown(controller).await?;

    tracing::info!("panelpress-server stopped");
    Ok(())
}
