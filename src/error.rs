//! Error types for panelpress
//!
//! This module provides the crate-wide error type, including:
//! - Domain-specific error types (merge failures, busy gate, missing jobs)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for panelpress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for panelpress
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another job currently holds the execution gate
    #[error("another conversion is already running, try again when it finishes")]
    Busy,

    /// Job not found in the job store
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Artifact not found in the artifact registry
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Chapter merge error
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// Packaging the final artifact failed
    #[error("packaging error: {0}")]
    Packaging(String),

    /// The pipeline ran to completion without producing any document
    #[error("no documents were produced: {0}")]
    EmptyResult(String),

    /// The conversion request is malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Content catalog returned an unexpected response
    #[error("catalog error: {0}")]
    Catalog(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading source page collections
#[derive(Debug, Error)]
pub enum MergeError {
    /// Archive could not be opened or read
    #[error("failed to open archive {archive}: {reason}")]
    OpenFailed {
        /// The archive that could not be opened
        archive: PathBuf,
        /// The reason opening failed
        reason: String,
    },

    /// Archive extraction failed part way through
    #[error("extraction failed for {archive}: {reason}")]
    ExtractionFailed {
        /// The archive that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The path is neither a directory nor a supported archive
    #[error("unsupported page collection {path}")]
    Unsupported {
        /// The offending path
        path: PathBuf,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "busy",
///     "message": "another conversion is already running, try again when it finishes"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "busy")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidRequest(_) => 400,

            // 404 Not Found
            Error::JobNotFound(_) => 404,
            Error::ArtifactNotFound(_) => 404,

            // 409 Conflict - the execution gate is held
            Error::Busy => 409,

            // 422 Unprocessable Entity - the request ran but yielded nothing usable
            Error::EmptyResult(_) => 422,
            Error::Merge(_) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Packaging(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
            Error::Catalog(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Busy => "busy",
            Error::JobNotFound(_) => "job_not_found",
            Error::ArtifactNotFound(_) => "artifact_not_found",
            Error::Merge(e) => match e {
                MergeError::OpenFailed { .. } => "archive_open_failed",
                MergeError::ExtractionFailed { .. } => "extraction_failed",
                MergeError::Unsupported { .. } => "unsupported_collection",
            },
            Error::Packaging(_) => "packaging_error",
            Error::EmptyResult(_) => "empty_result",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Catalog(_) => "catalog_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Merge(MergeError::OpenFailed { archive, .. })
            | Error::Merge(MergeError::ExtractionFailed { archive, .. }) => {
                Some(serde_json::json!({
                    "archive": archive,
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_conflict() {
        let error = Error::Busy;
        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), "busy");
    }

    #[test]
    fn missing_resources_map_to_not_found() {
        assert_eq!(Error::JobNotFound("x".into()).status_code(), 404);
        assert_eq!(Error::ArtifactNotFound("y".into()).status_code(), 404);
        assert_eq!(
            Error::ArtifactNotFound("y".into()).error_code(),
            "artifact_not_found"
        );
    }

    #[test]
    fn merge_errors_carry_archive_details() {
        let error = Error::Merge(MergeError::OpenFailed {
            archive: PathBuf::from("/scratch/ch2.cbz"),
            reason: "invalid Zip archive".into(),
        });
        assert_eq!(error.status_code(), 422);

        let api: ApiError = error.into();
        assert_eq!(api.error.code, "archive_open_failed");
        let details = api.error.details.expect("details should be present");
        assert_eq!(details["archive"], "/scratch/ch2.cbz");
    }

    #[test]
    fn config_error_details_name_the_key() {
        let error = Error::Config {
            message: "must be at least 1".into(),
            key: Some("retry.max_attempts".into()),
        };
        let api: ApiError = error.into();
        assert_eq!(api.error.code, "config_error");
        assert_eq!(api.error.details.unwrap()["key"], "retry.max_attempts");
    }

    #[test]
    fn api_error_skips_empty_details_when_serialized() {
        let json = serde_json::to_value(ApiError::not_found("job 42")).unwrap();
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "job 42 not found");
        assert!(json["error"].get("details").is_none());
    }
}
