//! Shared fakes for exercising the job controller without external tools

use super::JobController;
use crate::config::Config;
use crate::runner::{OutputSink, RunOutcome};
use crate::tools::{ConversionTarget, Converter, DownloadTarget, Downloader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Writes `pages` page images per chapter archive for each configured volume
#[derive(Default)]
pub(crate) struct FakeDownloader {
    /// volume -> page count of each chapter
    pub(crate) volumes: HashMap<u32, Vec<usize>>,
    pub(crate) failing: Vec<u32>,
    pub(crate) panics: bool,
    pub(crate) calls: Mutex<Vec<DownloadTarget>>,
    /// When set, every download waits for a notification before writing
    pub(crate) hold: Option<Arc<tokio::sync::Notify>>,
    /// Sibling unit directories that still existed when a download began
    pub(crate) leftovers: Mutex<Vec<std::path::PathBuf>>,
}

impl FakeDownloader {
    pub(crate) fn with_volumes(volumes: &[(u32, &[usize])]) -> Self {
        Self {
            volumes: volumes.iter().map(|(v, c)| (*v, c.to_vec())).collect(),
            ..Self::default()
        }
    }
}

pub(crate) fn write_chapter(path: &Path, pages: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default();
    for page in 1..=pages {
        writer.start_file(format!("{:03}.jpg", page), options).unwrap();
        writer.write_all(b"jpeg").unwrap();
    }
    writer.finish().unwrap();
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, target: &DownloadTarget, sink: &dyn OutputSink) -> RunOutcome {
        self.calls.lock().unwrap().push(target.clone());
        // dest is <units>/<unit-NNN>/download
        let unit_dir = target.dest.parent().unwrap();
        if let Ok(entries) = std::fs::read_dir(unit_dir.parent().unwrap()) {
            let mut leftovers = self.leftovers.lock().unwrap();
            for entry in entries {
                let path = entry.unwrap().path();
                if path != unit_dir {
                    leftovers.push(path);
                }
            }
        }
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        if self.panics {
            panic!("downloader exploded");
        }
        let volume = target.volume.unwrap_or(1);
        if self.failing.contains(&volume) {
            sink.warning("downloader failed after 3 attempts");
            return RunOutcome {
                succeeded: false,
                attempts: 3,
            };
        }
        std::fs::create_dir_all(&target.dest).unwrap();
        for (i, pages) in self.volumes.get(&volume).into_iter().flatten().enumerate() {
            let name = format!("Vol. {} Ch. {}.cbz", volume, i + 1);
            write_chapter(&target.dest.join(name), *pages);
            sink.log(&format!("saved chapter {}", i + 1));
        }
        RunOutcome {
            succeeded: true,
            attempts: 1,
        }
    }

    fn name(&self) -> &'static str {
        "fake-downloader"
    }
}

/// Writes one document per source, named after the source like kcc does
#[derive(Default)]
pub(crate) struct FakeConverter {
    pub(crate) calls: Mutex<Vec<ConversionTarget>>,
    /// Write the documents, then report failure
    pub(crate) fails_after_writing: bool,
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, target: &ConversionTarget, sink: &dyn OutputSink) -> RunOutcome {
        self.calls.lock().unwrap().push(target.clone());
        std::fs::create_dir_all(&target.output_dir).unwrap();
        for source in &target.sources {
            let base = if source.is_dir() {
                source.file_name()
            } else {
                source.file_stem()
            };
            let base = base.unwrap().to_string_lossy();
            let name = format!("{}.{}", base, target.format.to_lowercase());
            std::fs::write(target.output_dir.join(&name), b"ebook").unwrap();
            sink.log(&format!("wrote {}", name));
        }
        if self.fails_after_writing {
            sink.warning("converter failed after 3 attempts");
        }
        RunOutcome {
            succeeded: !self.fails_after_writing,
            attempts: if self.fails_after_writing { 3 } else { 1 },
        }
    }

    fn name(&self) -> &'static str {
        "fake-converter"
    }
}

pub(crate) struct Fixture {
    pub(crate) dir: TempDir,
    pub(crate) config: Arc<Config>,
    pub(crate) downloader: Arc<FakeDownloader>,
    pub(crate) converter: Arc<FakeConverter>,
    pub(crate) controller: JobController,
}

pub(crate) fn fixture(downloader: FakeDownloader) -> Fixture {
    fixture_with(downloader, FakeConverter::default(), |_| {})
}

/// Fixture with a custom converter and config tweaks
pub(crate) fn fixture_with(
    downloader: FakeDownloader,
    converter: FakeConverter,
    configure: impl FnOnce(&mut Config),
) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.scratch_dir = dir.path().join("scratch");
    config.storage.output_dir = dir.path().join("processed");
    config.storage.upload_dir = dir.path().join("uploads");
    configure(&mut config);
    let config = Arc::new(config);
    let downloader = Arc::new(downloader);
    let converter = Arc::new(converter);
    let controller = JobController::new(config.clone(), downloader.clone(), converter.clone());
    Fixture {
        dir,
        config,
        downloader,
        converter,
        controller,
    }
}

