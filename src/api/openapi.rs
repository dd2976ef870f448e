//! OpenAPI documentation and schema generation

use utoipa::OpenApi;

/// OpenAPI documentation for the panelpress REST API
///
/// Served as JSON from `/api/v1/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "panelpress REST API",
        version = "0.1.0",
        description = "Convert manga volumes from a catalog, a web page or a local upload into e-reader documents",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::create_job,
        crate::api::routes::stream_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::job_events,

        // Artifacts
        crate::api::routes::download_artifact,

        // Catalog
        crate::api::routes::search_catalog,
        crate::api::routes::catalog_details,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::JobEvent,
        crate::types::JobInfo,
        crate::types::Stage,
        crate::types::ContentSource,
        crate::types::UnitRange,
        crate::types::ChapterBounds,
        crate::types::ConvertOptions,
        crate::types::ConvertRequest,
        crate::catalog::CatalogEntry,
        crate::catalog::CatalogDetails,
        crate::api::routes::JobAccepted,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Conversion jobs and their progress"),
        (name = "artifacts", description = "Finished documents"),
        (name = "catalog", description = "Remote catalog lookups"),
        (name = "system", description = "Health and API documentation")
    )
)]
pub struct ApiDoc;
