//! Packaging of converter output into the final artifact
//!
//! One produced document is delivered as is. Several documents are bundled
//! into a single zip archive. Either way the artifact is moved to the output
//! directory under a job-prefixed name, away from any scratch directory a
//! later job might delete.

use crate::error::{Error, Result};
use crate::types::JobId;
use crate::utils;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The artifact after it has been moved to the output directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// Stored location inside the output directory
    pub path: PathBuf,
    /// File name presented to the caller
    pub display_name: String,
    /// Whether several documents were bundled
    pub bundled: bool,
}

/// Directories used by the packaging stage
#[derive(Clone, Debug)]
pub struct Packager {
    staging_dir: PathBuf,
    output_dir: PathBuf,
}

impl Packager {
    /// Create a packager; `staging_dir` holds bundles while they are written
    pub fn new(staging_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Package every file in `documents_dir`
    ///
    /// Fails with [`Error::EmptyResult`] if the directory holds no files, and
    /// with [`Error::Packaging`] if the staging directory lies inside it.
    pub async fn package(
        &self,
        documents_dir: &Path,
        job_id: JobId,
        title: &str,
    ) -> Result<PackagedArtifact> {
        let documents = utils::collect_files(documents_dir)?;
        debug!(?documents_dir, count = documents.len(), "packaging documents");

        let (source, display_name, bundled) = match documents.as_slice() {
            [] => {
                return Err(Error::EmptyResult(format!(
                    "converter produced no documents for {}",
                    title
                )));
            }
            [single] => {
                let name = single
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        Error::Packaging(format!("unnamed document {}", single.display()))
                    })?;
                (single.clone(), name, false)
            }
            _ => {
                let display = format!("{}.zip", utils::sanitize_file_name(title));
                let bundle = self.write_bundle(documents_dir, &display).await?;
                (bundle, display, true)
            }
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let stored_name = format!("{}_{}", job_id, display_name);
        let stored = utils::unique_path(&self.output_dir.join(stored_name))?;
        utils::move_file(&source, &stored).await?;

        // A rename suffix from unique_path belongs to the display name too
        let display_name = stored
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .and_then(|n| n.strip_prefix(&format!("{}_", job_id)).map(str::to_string))
            .unwrap_or(display_name);

        info!(%job_id, path = ?stored, bundled, "artifact packaged");
        Ok(PackagedArtifact {
            path: stored,
            display_name,
            bundled,
        })
    }

    async fn write_bundle(&self, documents_dir: &Path, display: &str) -> Result<PathBuf> {
        let staging = absolute(&self.staging_dir)?;
        if staging.starts_with(absolute(documents_dir)?) {
            return Err(Error::Packaging(format!(
                "staging directory {} lies inside the directory being archived",
                staging.display()
            )));
        }
        tokio::fs::create_dir_all(&staging).await?;
        let bundle = utils::unique_path(&staging.join(display))?;

        let root = documents_dir.to_path_buf();
        let dest = bundle.clone();
        tokio::task::spawn_blocking(move || zip_directory(&root, &dest))
            .await
            .map_err(|e| Error::Packaging(format!("bundle task failed: {}", e)))??;
        Ok(bundle)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Write every file below `root` into a zip at `dest`, keyed by relative path
fn zip_directory(root: &Path, dest: &Path) -> Result<()> {
    let packaging = |e: zip::result::ZipError| Error::Packaging(e.to_string());

    let file = std::fs::File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in utils::collect_files(root)? {
        let relative = path
            .strip_prefix(root)
            .map_err(|e| Error::Packaging(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        writer.start_file(relative, options).map_err(packaging)?;
        let mut input = std::fs::File::open(&path)?;
        std::io::copy(&mut input, &mut writer)?;
    }
    writer.finish().map_err(packaging)?.flush()?;
    Ok(())
}
