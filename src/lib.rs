//! # panelpress
//!
//! Backend for turning manga titles into e-reader documents.
//!
//! A job takes a title from the content catalog, a scraper URL or a local
//! upload, fetches it unit by unit (one volume, or the whole title), merges
//! chapters into a single page sequence, hands the result to an external
//! converter and packages whatever came out into one downloadable artifact.
//!
//! Only one job runs at a time. Submitting while a job is running fails
//! immediately with [`Error::Busy`]; nothing is queued.
//!
//! ## Quick Start
//!
//! ```no_run
//! use panelpress::{Config, ConvertRequest, JobController, JobEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = JobController::from_config(Arc::new(Config::default()));
//!
//!     let mut job = controller.start(ConvertRequest::catalog("Berserk", "801513ba", 1, 2))?;
//!     while let Some(event) = job.next_event().await {
//!         match event {
//!             JobEvent::Done(artifact) => println!("ready: {}", artifact),
//!             other => println!("{}: {}", other.kind(), other.message()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Content catalog client
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job controller, store and pipeline
pub mod jobs;
/// Chapter merging
pub mod merge;
/// Final artifact packaging
pub mod packaging;
/// Work unit planning
pub mod planner;
/// External process supervision with retry
pub mod runner;
/// Downloader and converter integrations
pub mod tools;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::{CatalogClient, CatalogDetails, CatalogEntry};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, MergeError, Result, ToHttpStatus};
pub use jobs::{Artifact, JobController, JobHandle};
pub use runner::{CommandRunner, CommandSpec, OutputSink, RunOutcome};
pub use tools::{CliConverter, CliDownloader, Converter, Downloader};
pub use types::{
    ContentSource, ConvertOptions, ConvertRequest, JobEvent, JobId, JobInfo, JobStatus, Stage,
    UnitRange,
};

/// Serve the REST API until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// A job still running at shutdown is abandoned along with its scratch directory.
pub async fn run_with_shutdown(controller: JobController) -> Result<()> {
    let config = controller.config().clone();
    api::start_api_server(controller, config, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
