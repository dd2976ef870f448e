//! Chapter merging
//!
//! A unit's download directory holds one or more page collections: chapter
//! archives (`.cbz`, `.cb7`, `.cbr`, ...) or folders of loose images. The
//! merge engine flattens them into one directory whose file names are a
//! zero-padded global page counter, so that lexical order of the merged
//! directory equals reading order across every input collection.
//!
//! ```text
//! download/Vol. 1 Ch. 1.cbz  (3 pages)  ─┐
//! download/Vol. 1 Ch. 2.cbz  (2 pages)  ─┼─►  merge/000001.jpg .. 000005.png
//! ```
//!
//! A collection that cannot be opened is skipped with a warning; the
//! remaining collections are still merged.

mod extract;


use crate::error::{Error, Result};
use crate::runner::OutputSink;
use crate::utils::{self, ArchiveKind, SourceKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One ordered sequence of page images
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageCollection {
    /// Images lying directly inside a directory
    Directory(PathBuf),
    /// Images packed inside an archive
    Archive {
        /// Archive path
        path: PathBuf,
        /// Container format
        kind: ArchiveKind,
    },
}

impl PageCollection {
    /// Path of the directory or archive
    pub fn path(&self) -> &Path {
        match self {
            PageCollection::Directory(path) => path,
            PageCollection::Archive { path, .. } => path,
        }
    }
}

/// What a download directory contains, in reading order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitContents {
    /// Page collections, natural-sorted by path
    pub collections: Vec<PageCollection>,
    /// Whole documents that bypass merging
    pub documents: Vec<PathBuf>,
}

impl UnitContents {
    /// Whether the directory held no page material and no documents
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.documents.is_empty()
    }
}

/// Scan `root` recursively and group its files into collections and documents
///
/// Every archive is its own collection. Loose images are grouped by the
/// directory they sit in. Files of other types (metadata sidecars) are ignored.
pub fn discover(root: &Path) -> Result<UnitContents> {
    if !root.exists() {
        return Ok(UnitContents::default());
    }

    let mut contents = UnitContents::default();
    let mut image_dirs = BTreeSet::new();
    let mut collections = Vec::new();

    for file in utils::collect_files(root)? {
        match utils::classify(&file) {
            SourceKind::Archive(kind) => {
                collections.push(PageCollection::Archive { path: file, kind })
            }
            SourceKind::Document => contents.documents.push(file),
            SourceKind::Image => {
                if let Some(parent) = file.parent() {
                    image_dirs.insert(parent.to_path_buf());
                }
            }
            SourceKind::Other => debug!(?file, "ignoring non-page file"),
        }
    }
    collections.extend(image_dirs.into_iter().map(PageCollection::Directory));
    collections.sort_by(|a, b| {
        utils::natural_cmp(&a.path().to_string_lossy(), &b.path().to_string_lossy())
    });
    contents.collections = collections;
    Ok(contents)
}

/// Naming of merged pages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Width of the zero-padded page counter
    pub page_digits: usize,
    /// Prefix each page with `cNNNN_`, the 1-based index of its collection
    pub chapter_prefix: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            page_digits: 6,
            chapter_prefix: false,
        }
    }
}

impl MergeOptions {
    /// Target file name for the `counter`-th page of collection `chapter`
    pub fn page_name(&self, chapter: usize, counter: usize, extension: Option<&str>) -> String {
        let mut name = if self.chapter_prefix {
            format!("c{:04}_{:0width$}", chapter, counter, width = self.page_digits)
        } else {
            format!("{:0width$}", counter, width = self.page_digits)
        };
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(&ext.to_ascii_lowercase());
        }
        name
    }
}

/// Outcome of a merge
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Pages written to the target directory
    pub pages: usize,
    /// Collections that contributed pages
    pub merged: usize,
    /// Collections skipped because they could not be read
    pub skipped: Vec<PathBuf>,
}

/// Merge `collections`, in order, into `target`
///
/// Pages of each collection are taken in natural filename order. Archives are
/// unpacked into a private directory next to `target`, never inside it.
/// Unreadable collections are reported to `sink` and skipped; only failures
/// writing into `target` itself abort the merge.
pub fn merge_collections(
    collections: &[PageCollection],
    target: &Path,
    options: &MergeOptions,
    sink: &dyn OutputSink,
) -> Result<MergeReport> {
    std::fs::create_dir_all(target)?;
    let staging_root = target.parent().unwrap_or(target);

    let mut report = MergeReport::default();
    let mut counter = 0usize;

    for (index, collection) in collections.iter().enumerate() {
        // Keeps the extraction directory alive while its pages are copied
        let mut extracted: Option<tempfile::TempDir> = None;

        let pages = match collection {
            PageCollection::Directory(dir) => image_files(dir, false),
            PageCollection::Archive { path, kind } => {
                let staging = tempfile::Builder::new()
                    .prefix(".extract-")
                    .tempdir_in(staging_root)?;
                let pages = extract::extract_archive(path, *kind, staging.path())
                    .map_err(Error::Merge)
                    .and_then(|()| image_files(staging.path(), true));
                extracted = Some(staging);
                pages
            }
        };

        let pages = match pages {
            Ok(pages) if !pages.is_empty() => pages,
            Ok(_) => {
                debug!(collection = ?collection.path(), "collection holds no pages");
                continue;
            }
            Err(e) => {
                warn!(
                    collection = ?collection.path(),
                    error = %e,
                    "skipping unreadable collection"
                );
                sink.warning(&format!(
                    "skipping unreadable chapter {}: {}",
                    display_name(collection.path()),
                    e
                ));
                report.skipped.push(collection.path().to_path_buf());
                continue;
            }
        };

        for page in &pages {
            counter += 1;
            let extension = page.extension().and_then(|e| e.to_str());
            let dest = target.join(options.page_name(index + 1, counter, extension));
            std::fs::copy(page, &dest)?;
        }
        report.pages += pages.len();
        report.merged += 1;
        drop(extracted);
    }

    info!(
        ?target,
        pages = report.pages,
        merged = report.merged,
        skipped = report.skipped.len(),
        "merge complete"
    );
    Ok(report)
}

/// Natural-sorted page images under `dir`
fn image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let files = if recursive {
        utils::collect_files(dir)?
    } else {
        utils::list_files(dir)?
    };
    Ok(files
        .into_iter()
        .filter(|f| utils::classify(f) == SourceKind::Image)
        .collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
