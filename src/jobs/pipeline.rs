//! The per-job pipeline: plan, then download, merge, convert and clean up
//! each unit in turn, then package whatever was produced.

use super::artifacts::ArtifactRegistry;
use super::reporter::ProgressReporter;
use crate::config::Config;
use crate::error::{Error, MergeError, Result};
use crate::merge::{self, MergeOptions, PageCollection, UnitContents};
use crate::packaging::Packager;
use crate::planner::{self, WorkUnit};
use crate::runner::OutputSink;
use crate::tools::{ConversionTarget, Converter, DownloadTarget, Downloader};
use crate::types::{ConvertRequest, Stage};
use crate::utils::{self, SourceKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnitOutcome {
    /// The converter produced this many documents
    Converted(usize),
    /// Nothing usable came out of the unit
    Skipped,
}

pub(crate) struct Pipeline {
    pub(crate) config: Arc<Config>,
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) converter: Arc<dyn Converter>,
    pub(crate) artifacts: Arc<ArtifactRegistry>,
    pub(crate) reporter: ProgressReporter,
    pub(crate) request: ConvertRequest,
    /// Root of this job's scratch space, removed by the controller
    pub(crate) scratch: PathBuf,
}

impl Pipeline {
    /// Run every stage and return the external artifact name
    pub(crate) async fn run(self) -> Result<String> {
        tokio::fs::create_dir_all(&self.scratch).await?;
        let collected = self.scratch.join("collected");
        tokio::fs::create_dir_all(&collected).await?;

        let plan = planner::plan_units(&self.request, &self.scratch.join("units"));
        let total = plan.total();
        debug!(job_id = %self.reporter.job_id(), units = total, "planned work units");

        let mut produced = 0;
        for unit in plan {
            let outcome = self.process_unit(&unit, &collected).await;

            // Unit scratch is removed whatever the outcome, before the next unit
            match unit.cleanup().await {
                Ok(()) => self
                    .reporter
                    .stage(Stage::Cleanup, format!("scratch of {} removed", unit.label())),
                Err(e) => warn!(
                    job_id = %self.reporter.job_id(),
                    unit = unit.ordinal,
                    error = %e,
                    "unit cleanup failed"
                ),
            }

            match outcome? {
                UnitOutcome::Converted(count) => produced += count,
                UnitOutcome::Skipped => {}
            }
        }

        if produced == 0 {
            return Err(Error::EmptyResult(format!(
                "none of the {} requested unit(s) for {} produced a document",
                total,
                self.request.title
            )));
        }

        self.reporter.stage(
            Stage::Package,
            format!("{} document(s) for {}", produced, self.request.title),
        );
        let packager = Packager::new(
            self.scratch.join("staging"),
            &self.config.storage.output_dir,
        );
        let artifact = packager
            .package(&collected, self.reporter.job_id(), &self.request.title)
            .await?;
        Ok(self
            .artifacts
            .register(self.reporter.job_id(), artifact.path, artifact.display_name))
    }

    async fn process_unit(&self, unit: &WorkUnit, collected: &Path) -> Result<UnitOutcome> {
        let label = unit.label();

        if unit.needs_download() {
            self.reporter
                .stage(Stage::Download, format!("{} of {}", label, self.request.title));
            let target = DownloadTarget {
                source: unit.source.clone(),
                dest: unit.download_dir(),
                volume: unit.volume,
                chapters: unit.chapters.clone(),
                language: self
                    .request
                    .language
                    .clone()
                    .unwrap_or_else(|| self.config.conversion.language.clone()),
            };
            let outcome = self.downloader.download(&target, &self.reporter).await;
            if !outcome.succeeded {
                self.reporter
                    .warning(&format!("download of {} failed, skipping it", label));
                return Ok(UnitOutcome::Skipped);
            }
        }

        let contents = unit_contents(&unit.input_path())?;
        if contents.is_empty() {
            self.reporter
                .warning(&format!("no pages found for {}, skipping it", label));
            return Ok(UnitOutcome::Skipped);
        }

        let mut invocations: Vec<Vec<PathBuf>> =
            contents.documents.iter().map(|doc| vec![doc.clone()]).collect();
        if !contents.collections.is_empty() {
            if self.request.combine {
                if let Some(merged) = self.merge(unit, contents.collections).await? {
                    invocations.push(vec![merged]);
                }
            } else {
                invocations.push(
                    contents
                        .collections
                        .iter()
                        .map(|c| c.path().to_path_buf())
                        .collect(),
                );
            }
        }

        let mut produced = 0;
        for (run, sources) in invocations.into_iter().enumerate() {
            self.reporter.stage(
                Stage::Convert,
                format!("{} ({} source(s))", label, sources.len()),
            );
            // Each invocation writes into its own directory
            let output_dir = unit.output_dir().join(format!("run-{:02}", run + 1));
            let target = self.conversion_target(&output_dir, sources);
            let outcome = self.converter.convert(&target, &self.reporter).await;
            if !outcome.succeeded {
                self.reporter.warning(&format!(
                    "conversion of {} failed, discarding its output",
                    label
                ));
                utils::remove_dir_if_exists(&output_dir).await?;
                continue;
            }
            produced += collect_documents(&output_dir, collected).await?;
        }

        if produced == 0 {
            self.reporter.warning(&format!(
                "converter produced nothing for {}, skipping it",
                label
            ));
            return Ok(UnitOutcome::Skipped);
        }
        Ok(UnitOutcome::Converted(produced))
    }

    /// Merge collections into the unit's merge directory
    ///
    /// Returns `None` when no collection yielded a page.
    async fn merge(
        &self,
        unit: &WorkUnit,
        collections: Vec<PageCollection>,
    ) -> Result<Option<PathBuf>> {
        self.reporter.stage(
            Stage::Merge,
            format!("{} chapter(s) of {}", collections.len(), unit.label()),
        );

        let target = unit.merge_dir();
        let options = MergeOptions {
            page_digits: self.config.conversion.page_digits,
            chapter_prefix: self.config.conversion.chapter_prefix,
        };
        let sink = self.reporter.clone();
        let dest = target.clone();
        let report = tokio::task::spawn_blocking(move || {
            merge::merge_collections(&collections, &dest, &options, &sink)
        })
        .await
        .map_err(|e| Error::Other(format!("merge task failed: {}", e)))??;

        if report.pages == 0 {
            self.reporter
                .warning(&format!("no readable pages in {}", unit.label()));
            return Ok(None);
        }
        self.reporter.log(&format!(
            "merged {} page(s) from {} chapter(s)",
            report.pages, report.merged
        ));
        Ok(Some(target))
    }

    fn conversion_target(&self, output_dir: &Path, sources: Vec<PathBuf>) -> ConversionTarget {
        let defaults = &self.config.conversion;
        let options = &self.request.options;
        ConversionTarget {
            profile: options.profile.clone().unwrap_or_else(|| defaults.profile.clone()),
            format: options.format.clone().unwrap_or_else(|| defaults.format.clone()),
            manga_mode: options.manga_mode.unwrap_or(defaults.manga_mode),
            upscale: options.upscale.unwrap_or(defaults.upscale),
            output_dir: output_dir.to_path_buf(),
            sources,
        }
    }
}

/// Move every file a successful conversion wrote into `collected`
async fn collect_documents(output_dir: &Path, collected: &Path) -> Result<usize> {
    let documents = utils::list_files(output_dir)?;
    for document in &documents {
        let Some(name) = document.file_name() else {
            continue;
        };
        let dest = utils::unique_path(&collected.join(name))?;
        utils::move_file(document, &dest).await?;
    }
    Ok(documents.len())
}

/// Contents of a unit's input, which may be a directory or a single local file
fn unit_contents(input: &Path) -> Result<UnitContents> {
    if input.is_dir() || !input.exists() {
        return merge::discover(input);
    }
    let mut contents = UnitContents::default();
    match utils::classify(input) {
        SourceKind::Document => contents.documents.push(input.to_path_buf()),
        SourceKind::Archive(kind) => contents.collections.push(PageCollection::Archive {
            path: input.to_path_buf(),
            kind,
        }),
        SourceKind::Image | SourceKind::Other => {
            return Err(Error::Merge(MergeError::Unsupported {
                path: input.to_path_buf(),
            }));
        }
    }
    Ok(contents)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn single_local_files_are_classified() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("book.pdf");
        let cbz = dir.path().join("book.cbz");
        let txt = dir.path().join("notes.txt");
        for f in [&pdf, &cbz, &txt] {
            std::fs::write(f, b"x").unwrap();
        }

        assert_eq!(unit_contents(&pdf).unwrap().documents, vec![pdf.clone()]);
        assert_eq!(unit_contents(&cbz).unwrap().collections.len(), 1);
        assert!(matches!(
            unit_contents(&txt),
            Err(Error::Merge(MergeError::Unsupported { .. }))
        ));
    }

    #[tokio::test]
    async fn collected_documents_never_overwrite_each_other() {
        let dir = TempDir::new().unwrap();
        let (out, collected) = (dir.path().join("out"), dir.path().join("collected"));
        std::fs::create_dir_all(&out).unwrap();
        std::fs::create_dir_all(&collected).unwrap();
        std::fs::write(out.join("Vol. 1.mobi"), b"new").unwrap();
        std::fs::write(collected.join("Vol. 1.mobi"), b"old").unwrap();

        assert_eq!(collect_documents(&out, &collected).await.unwrap(), 1);
        assert_eq!(std::fs::read(collected.join("Vol. 1.mobi")).unwrap(), b"old");
        assert_eq!(std::fs::read(collected.join("Vol. 1 (1).mobi")).unwrap(), b"new");
    }

    #[test]
    fn missing_input_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(unit_contents(&dir.path().join("never-downloaded")).unwrap().is_empty());
    }
}
