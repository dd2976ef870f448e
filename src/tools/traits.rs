//! Traits and request types for the external downloader and converter

use crate::runner::{OutputSink, RunOutcome};
use crate::types::{ChapterBounds, ContentSource};
use async_trait::async_trait;
use std::path::PathBuf;

/// One download invocation: a source, a destination, and optional bounds
#[derive(Clone, Debug)]
pub struct DownloadTarget {
    /// Content to fetch (catalog id or web page)
    pub source: ContentSource,
    /// Directory the downloader populates
    pub dest: PathBuf,
    /// Single volume to fetch (catalog sources)
    pub volume: Option<u32>,
    /// Chapter bounds inside the volume
    pub chapters: Option<ChapterBounds>,
    /// Language selector
    pub language: String,
}

/// One converter invocation over one or more sources
#[derive(Clone, Debug)]
pub struct ConversionTarget {
    /// Device profile
    pub profile: String,
    /// Output format
    pub format: String,
    /// Right-to-left reading mode
    pub manga_mode: bool,
    /// Upscale small pages
    pub upscale: bool,
    /// Directory the converter writes documents into
    pub output_dir: PathBuf,
    /// Directories, archives or documents to convert
    pub sources: Vec<PathBuf>,
}

/// Fetches raw page images into a scratch directory
///
/// An empty destination after a successful run is a valid outcome (the
/// requested volume may not exist in the chosen language); callers detect it
/// by inspecting the directory.
///
/// # Examples
///
/// ```no_run
/// use panelpress::tools::{CliDownloader, DownloadTarget, Downloader};
/// use panelpress::runner::{CommandRunner, OutputSink};
/// use panelpress::types::ContentSource;
/// use std::time::Duration;
///
/// # struct Quiet;
/// # impl OutputSink for Quiet { fn log(&self, _: &str) {} fn warning(&self, _: &str) {} }
/// # async fn example() {
/// let runner = CommandRunner::new(3, Duration::from_secs(5));
/// let downloader = CliDownloader::new("mangadex-dl", "gallery-dl", runner);
/// let target = DownloadTarget {
///     source: ContentSource::Catalog { id: "a1c7c817".into() },
///     dest: "/scratch/unit-1/download".into(),
///     volume: Some(1),
///     chapters: None,
///     language: "en".into(),
/// };
/// let outcome = downloader.download(&target, &Quiet).await;
/// # }
/// ```
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Run one download, streaming tool output into `sink`
    async fn download(&self, target: &DownloadTarget, sink: &dyn OutputSink) -> RunOutcome;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Turns page collections into finished e-reader documents
///
/// Non-zero exit or an empty output directory is the converter-failure signal.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Run one conversion, streaming tool output into `sink`
    async fn convert(&self, target: &ConversionTarget, sink: &dyn OutputSink) -> RunOutcome;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
