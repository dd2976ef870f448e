//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission, snapshots and event polling
//! - [`artifacts`] - Artifact download
//! - [`catalog`] - Catalog search and title bounds
//! - [`system`] - Health and OpenAPI

use crate::types::JobId;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

mod artifacts;
mod catalog;
mod jobs;
mod system;

pub use artifacts::*;
pub use catalog::*;
pub use jobs::*;
pub use system::*;

/// Response body for an accepted background job
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobAccepted {
    /// Identifier to poll
    pub job_id: JobId,
}

/// Query parameters for event polling
#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Number of events already seen
    #[serde(default)]
    pub since: usize,
}

/// Query parameters for catalog search
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free-text title
    pub title: String,
}

/// Query parameters for title bounds
#[derive(Debug, Deserialize, IntoParams)]
pub struct DetailsQuery {
    /// Language selector (falls back to configuration)
    pub language: Option<String>,
}
