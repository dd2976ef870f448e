//! Job submission and progress

use super::{EventsQuery, JobAccepted};
use crate::api::AppState;
use crate::error::Error;
use crate::types::{ConvertRequest, JobEvent, JobId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

fn parse_id(id: &str) -> Result<JobId, Error> {
    id.parse()
        .map_err(|_| Error::InvalidRequest(format!("not a job id: {}", id)))
}

/// Render one job event as an SSE frame named after its kind
pub(crate) fn sse_frame(event: &JobEvent) -> SseEvent {
    let frame = SseEvent::default().event(event.kind());
    match serde_json::to_string(event) {
        Ok(json) => frame.data(json),
        Err(e) => {
            tracing::warn!("Failed to serialize job event to JSON: {}", e);
            frame.data(event.message())
        }
    }
}

/// POST /jobs - Start a job in the background
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = ConvertRequest,
    responses(
        (status = 202, description = "Job accepted", body = JobAccepted),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 409, description = "Another job is running", body = crate::error::ApiError)
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> Response {
    match state.controller.start(request) {
        // Progress is recorded in the job store; the channel is not needed
        Ok(handle) => {
            (StatusCode::ACCEPTED, Json(JobAccepted { job_id: handle.id })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /jobs/stream - Start a job and stream its events
#[utoipa::path(
    post,
    path = "/api/v1/jobs/stream",
    tag = "jobs",
    request_body = ConvertRequest,
    responses(
        (
            status = 200,
            description = "Job events (text/event-stream), ending with DONE or ERROR",
            content_type = "text/event-stream"
        ),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 409, description = "Another job is running", body = crate::error::ApiError)
    )
)]
pub async fn stream_job(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> Response {
    let handle = match state.controller.start(request) {
        Ok(handle) => handle,
        Err(e) => return e.into_response(),
    };

    let stream = handle
        .into_stream()
        .map(|event| Ok::<_, Infallible>(sse_frame(&event)));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// GET /jobs - List retained jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "Jobs, newest first", body = Vec<crate::types::JobInfo>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.jobs())
}

/// GET /jobs/:id - Job snapshot
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job information", body = crate::types::JobInfo),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match parse_id(&id).and_then(|id| state.controller.job(id)) {
        Ok(job) => Json(job).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /jobs/:id/events - Events after an offset, for polling clients
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/events",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID"),
        EventsQuery
    ),
    responses(
        (status = 200, description = "Events recorded after `since`", body = Vec<JobEvent>),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Response {
    match parse_id(&id).and_then(|id| state.controller.events_since(id, query.since)) {
        Ok(events) => Json(events).into_response(),
        Err(e) => e.into_response(),
    }
}
