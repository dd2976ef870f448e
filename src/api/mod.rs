//! REST API server module
//!
//! A thin transport over the [`JobController`]: it accepts conversion
//! requests, exposes job progress (live as server-sent events or by
//! polling), serves finished artifacts and proxies catalog lookups.

use crate::catalog::CatalogClient;
use crate::jobs::JobController;
use crate::{Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// All routes are nested under `/api/v1`.
///
/// # Routes
///
/// ## Jobs
/// - `POST /jobs` - Start a job in the background (202, or 409 when busy)
/// - `POST /jobs/stream` - Start a job and stream its events as SSE
/// - `GET /jobs` - List retained jobs
/// - `GET /jobs/:id` - Job snapshot
/// - `GET /jobs/:id/events?since=N` - Events after offset N
///
/// ## Artifacts
/// - `GET /artifacts/:name` - Download a finished artifact
///
/// ## Catalog
/// - `GET /catalog/search?title=` - Search titles
/// - `GET /catalog/:id?language=` - Volume and chapter bounds
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        // Jobs
        .route("/jobs", post(routes::create_job))
        .route("/jobs", get(routes::list_jobs))
        .route("/jobs/stream", post(routes::stream_job))
        .route("/jobs/:id", get(routes::get_job))
        .route("/jobs/:id/events", get(routes::job_events))
        // Artifacts
        .route("/artifacts/:name", get(routes::download_artifact))
        // Catalog
        .route("/catalog/search", get(routes::search_catalog))
        .route("/catalog/:id", get(routes::catalog_details))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Runs until `shutdown` resolves, then finishes in-flight requests.
///
/// # Example
///
/// ```no_run
/// use panelpress::{Config, JobController};
/// use std::sync::Arc;
///
/// # async fn example() -> panelpress::Result<()> {
/// let config = Arc::new(Config::default());
/// let controller = JobController::from_config(config.clone());
/// panelpress::api::start_api_server(controller, config, std::future::pending()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    controller: JobController,
    config: Arc<Config>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind_address = config.api.bind_address;
    let catalog = CatalogClient::new(&config.catalog)?;
    let app = create_router(AppState::new(controller, catalog, config));

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
