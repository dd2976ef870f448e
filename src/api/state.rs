//! Application state for the API server

use crate::catalog::CatalogClient;
use crate::jobs::JobController;
use crate::Config;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Job controller owning the execution gate
    pub controller: JobController,

    /// Catalog client for search and bounds lookups
    pub catalog: CatalogClient,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(controller: JobController, catalog: CatalogClient, config: Arc<Config>) -> Self {
        Self {
            controller,
            catalog,
            config,
        }
    }
}
