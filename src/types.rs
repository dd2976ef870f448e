//! Core types for panelpress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    /// Create a fresh random JobId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Eight-character prefix used for scratch directory names
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job status
///
/// There is no queued state: the execution gate rejects new work instead of
/// enqueuing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Pipeline is executing
    Running,
    /// Terminal: an artifact is available
    Finished,
    /// Terminal: the job failed with an error
    Failed,
}

impl JobStatus {
    /// Whether this status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// Pipeline stage, used in stage announcements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fetching page images
    Download,
    /// Combining chapters into one page sequence
    Merge,
    /// Running the converter
    Convert,
    /// Removing scratch directories
    Cleanup,
    /// Producing the final artifact
    Package,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Merge => "merge",
            Stage::Convert => "convert",
            Stage::Cleanup => "cleanup",
            Stage::Package => "package",
        };
        f.write_str(name)
    }
}

/// Progress event emitted during a job
///
/// A job's events form a single ordered sequence that ends with exactly one
/// `Done` or `Error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "message", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEvent {
    /// Stage announcement
    Status(String),
    /// A line of subprocess output
    Log(String),
    /// Recoverable problem (retry, skipped unit, corrupt chapter)
    Warning(String),
    /// Terminal failure description
    Error(String),
    /// Terminal success carrying the artifact's external name
    Done(String),
}

impl JobEvent {
    /// Whether this event ends the job's event sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done(_) | JobEvent::Error(_))
    }

    /// Event kind as sent on the wire (`STATUS`, `LOG`, ...)
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::Status(_) => "STATUS",
            JobEvent::Log(_) => "LOG",
            JobEvent::Warning(_) => "WARNING",
            JobEvent::Error(_) => "ERROR",
            JobEvent::Done(_) => "DONE",
        }
    }

    /// Event text
    pub fn message(&self) -> &str {
        match self {
            JobEvent::Status(m)
            | JobEvent::Log(m)
            | JobEvent::Warning(m)
            | JobEvent::Error(m)
            | JobEvent::Done(m) => m,
        }
    }
}

/// Where a job's raw content comes from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSource {
    /// Remote content catalog identifier
    Catalog {
        /// Catalog identifier
        id: String,
    },
    /// Web page to scrape
    Url {
        /// Page URL
        url: String,
    },
    /// File or directory already on local disk
    Local {
        /// Path to the document, archive or directory
        #[schema(value_type = String)]
        path: PathBuf,
    },
}

impl ContentSource {
    /// Whether this source supports volume ranges
    pub fn is_ranged(&self) -> bool {
        matches!(self, ContentSource::Catalog { .. })
    }
}

/// Inclusive range of volumes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnitRange {
    /// First volume
    pub start: u32,
    /// Last volume (inclusive)
    pub end: u32,
}

impl UnitRange {
    /// Number of units in this range
    pub fn len(&self) -> u64 {
        u64::from(self.end.saturating_sub(self.start)) + 1
    }

    /// Ranges are never empty once validated
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Optional chapter bounds applied inside every volume
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChapterBounds {
    /// First chapter (catalog numbering, may be fractional like "10.5")
    #[serde(default)]
    pub start: Option<String>,
    /// Last chapter (inclusive)
    #[serde(default)]
    pub end: Option<String>,
}

/// Per-request converter options; unset values fall back to configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConvertOptions {
    /// Device profile (e.g. "KPW5")
    #[serde(default)]
    pub profile: Option<String>,
    /// Output format (e.g. "MOBI", "EPUB")
    #[serde(default)]
    pub format: Option<String>,
    /// Right-to-left reading mode
    #[serde(default)]
    pub manga_mode: Option<bool>,
    /// Upscale small pages
    #[serde(default)]
    pub upscale: Option<bool>,
}

/// A conversion request as accepted by the job controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConvertRequest {
    /// Title used to name the artifact
    pub title: String,
    /// Where content comes from
    pub source: ContentSource,
    /// Volume range (catalog sources only)
    #[serde(default)]
    pub range: Option<UnitRange>,
    /// Chapter bounds inside each volume
    #[serde(default)]
    pub chapters: Option<ChapterBounds>,
    /// Catalog language selector (falls back to configuration)
    #[serde(default)]
    pub language: Option<String>,
    /// Merge all chapters of a unit into a single page sequence
    #[serde(default)]
    pub combine: bool,
    /// Converter options
    #[serde(default)]
    pub options: ConvertOptions,
}

impl ConvertRequest {
    /// Request for a catalog id and an inclusive volume range
    pub fn catalog(title: impl Into<String>, id: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            title: title.into(),
            source: ContentSource::Catalog { id: id.into() },
            range: Some(UnitRange { start, end }),
            chapters: None,
            language: None,
            combine: true,
            options: ConvertOptions::default(),
        }
    }

    /// Request for a local document, archive or directory
    pub fn local(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            source: ContentSource::Local { path: path.into() },
            range: None,
            chapters: None,
            language: None,
            combine: false,
            options: ConvertOptions::default(),
        }
    }

    /// Check the request before a job is created
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidRequest("title must not be empty".into()));
        }
        if let Some(range) = &self.range {
            if range.start > range.end {
                return Err(Error::InvalidRequest(format!(
                    "volume range start {} is after end {}",
                    range.start, range.end
                )));
            }
            if !self.source.is_ranged() {
                return Err(Error::InvalidRequest(
                    "volume ranges are only supported for catalog sources".into(),
                ));
            }
        }
        match &self.source {
            ContentSource::Catalog { id } if id.trim().is_empty() => {
                Err(Error::InvalidRequest("catalog id must not be empty".into()))
            }
            ContentSource::Catalog { id } if !is_catalog_id(id) => {
                Err(Error::InvalidRequest(format!("malformed catalog id: {}", id)))
            }
            ContentSource::Url { url }
                if !url.starts_with("http://") && !url.starts_with("https://") =>
            {
                Err(Error::InvalidRequest(format!("not an http(s) url: {}", url)))
            }
            _ => Ok(()),
        }
    }
}

/// Whether `id` looks like a catalog identifier (ASCII letters, digits and `-`)
///
/// Identifiers end up in URL paths, so anything else is refused.
pub fn is_catalog_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Snapshot of a job as exposed to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Job ID
    pub id: JobId,
    /// Title from the request
    pub title: String,
    /// Current status
    pub status: JobStatus,
    /// Every event emitted so far, in order
    pub log: Vec<JobEvent>,
    /// External artifact name (finished jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description (failed jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job was accepted
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
