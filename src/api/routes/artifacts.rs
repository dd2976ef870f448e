//! Artifact retrieval

use crate::api::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// `Content-Disposition` value for a download named `display_name`
fn attachment(display_name: &str) -> String {
    let escaped: String = display_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", escaped)
}

/// GET /artifacts/:name - Download a finished artifact
#[utoipa::path(
    get,
    path = "/api/v1/artifacts/{name}",
    tag = "artifacts",
    params(
        ("name" = String, Path, description = "External artifact name from the DONE event")
    ),
    responses(
        (status = 200, description = "Artifact bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown artifact", body = crate::error::ApiError)
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let artifact = match state.controller.artifact(&name) {
        Ok(artifact) => artifact,
        Err(e) => return e.into_response(),
    };

    let file = match tokio::fs::File::open(&artifact.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(artifact = %name, path = ?artifact.path, "artifact file is gone");
            return crate::error::Error::ArtifactNotFound(name).into_response();
        }
        Err(e) => return crate::error::Error::Io(e).into_response(),
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&artifact.display_name)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response();
    if let Some(length) = length {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, length.into());
    }
    response
}
