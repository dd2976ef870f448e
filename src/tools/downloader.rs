//! CLI downloader using the external `mangadex-dl` and `gallery-dl` binaries

use super::traits::{DownloadTarget, Downloader};
use crate::runner::{CommandRunner, CommandSpec, OutputSink, RunOutcome};
use crate::types::ContentSource;
use async_trait::async_trait;
use std::path::PathBuf;

/// Title page URL handed to the catalog downloader
const CATALOG_TITLE_URL: &str = "https://mangadex.org/title";

/// Downloader dispatching to the catalog downloader or the page scraper
///
/// Catalog sources go to `mangadex-dl` with volume, chapter and language
/// bounds; URL sources go to `gallery-dl`. Every invocation is supervised by
/// the [`CommandRunner`].
pub struct CliDownloader {
    catalog_binary: PathBuf,
    scraper_binary: PathBuf,
    runner: CommandRunner,
}

impl CliDownloader {
    /// Create a downloader with explicit binary paths
    pub fn new(
        catalog_binary: impl Into<PathBuf>,
        scraper_binary: impl Into<PathBuf>,
        runner: CommandRunner,
    ) -> Self {
        Self {
            catalog_binary: catalog_binary.into(),
            scraper_binary: scraper_binary.into(),
            runner,
        }
    }

    /// Build the argument vector for one target
    ///
    /// Returns `None` for local sources, which never go through a downloader.
    pub fn command_for(&self, target: &DownloadTarget) -> Option<CommandSpec> {
        match &target.source {
            ContentSource::Catalog { id } => {
                let mut spec = CommandSpec::new("downloader", &self.catalog_binary)
                    .arg(format!("{}/{}", CATALOG_TITLE_URL, id))
                    .arg("--path")
                    .arg(&target.dest)
                    .arg("--language")
                    .arg(&target.language)
                    .arg("--save-as")
                    .arg("cbz")
                    .arg("--no-group-name");
                if let Some(volume) = target.volume {
                    let volume = volume.to_string();
                    spec = spec
                        .arg("--start-volume")
                        .arg(&volume)
                        .arg("--end-volume")
                        .arg(&volume);
                }
                if let Some(bounds) = &target.chapters {
                    if let Some(start) = &bounds.start {
                        spec = spec.arg("--start-chapter").arg(start);
                    }
                    if let Some(end) = &bounds.end {
                        spec = spec.arg("--end-chapter").arg(end);
                    }
                }
                Some(spec)
            }
            ContentSource::Url { url } => Some(
                CommandSpec::new("scraper", &self.scraper_binary)
                    .arg("--directory")
                    .arg(&target.dest)
                    .arg(url),
            ),
            ContentSource::Local { .. } => None,
        }
    }
}

#[async_trait]
impl Downloader for CliDownloader {
    async fn download(&self, target: &DownloadTarget, sink: &dyn OutputSink) -> RunOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&target.dest).await {
            sink.warning(&format!(
                "cannot create download directory {}: {}",
                target.dest.display(),
                e
            ));
            return RunOutcome {
                succeeded: false,
                attempts: 0,
            };
        }

        match self.command_for(target) {
            Some(spec) => self.runner.run(&spec, sink).await,
            None => {
                sink.warning("local sources are not downloaded");
                RunOutcome {
                    succeeded: false,
                    attempts: 0,
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "cli-downloader"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChapterBounds;
    use std::time::Duration;

    fn downloader() -> CliDownloader {
        CliDownloader::new(
            "/usr/bin/mangadex-dl",
            "/usr/bin/gallery-dl",
            CommandRunner::new(1, Duration::ZERO),
        )
    }

    fn args(spec: &CommandSpec) -> Vec<String> {
        spec.arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn catalog_target_limits_to_one_volume() {
        let target = DownloadTarget {
            source: ContentSource::Catalog { id: "abc-123".into() },
            dest: PathBuf::from("/scratch/u1/download"),
            volume: Some(4),
            chapters: None,
            language: "en".into(),
        };
        let spec = downloader().command_for(&target).unwrap();

        assert_eq!(spec.program(), &PathBuf::from("/usr/bin/mangadex-dl"));
        let args = args(&spec);
        assert_eq!(args[0], "https://mangadex.org/title/abc-123");
        let start = args.iter().position(|a| a == "--start-volume").unwrap();
        assert_eq!(args[start + 1], "4");
        let end = args.iter().position(|a| a == "--end-volume").unwrap();
        assert_eq!(args[end + 1], "4");
        assert!(!args.contains(&"--start-chapter".to_string()));
    }

    #[test]
    fn chapter_bounds_are_forwarded() {
        let target = DownloadTarget {
            source: ContentSource::Catalog { id: "abc".into() },
            dest: PathBuf::from("/scratch/d"),
            volume: Some(1),
            chapters: Some(ChapterBounds {
                start: Some("3".into()),
                end: Some("7.5".into()),
            }),
            language: "pt-br".into(),
        };
        let args = args(&downloader().command_for(&target).unwrap());

        let lang = args.iter().position(|a| a == "--language").unwrap();
        assert_eq!(args[lang + 1], "pt-br");
        let start = args.iter().position(|a| a == "--start-chapter").unwrap();
        assert_eq!(args[start + 1], "3");
        let end = args.iter().position(|a| a == "--end-chapter").unwrap();
        assert_eq!(args[end + 1], "7.5");
    }

    #[test]
    fn url_target_goes_to_scraper() {
        let target = DownloadTarget {
            source: ContentSource::Url {
                url: "https://example.com/chapter-1".into(),
            },
            dest: PathBuf::from("/scratch/d"),
            volume: None,
            chapters: None,
            language: "en".into(),
        };
        let spec = downloader().command_for(&target).unwrap();
        assert_eq!(spec.label(), "scraper");
        assert_eq!(
            args(&spec),
            vec!["--directory", "/scratch/d", "https://example.com/chapter-1"]
        );
    }

    #[test]
    fn local_target_has_no_command() {
        let target = DownloadTarget {
            source: ContentSource::Local {
                path: PathBuf::from("/uploads/x.cbz"),
            },
            dest: PathBuf::from("/scratch/d"),
            volume: None,
            chapters: None,
            language: "en".into(),
        };
        assert!(downloader().command_for(&target).is_none());
    }
}
