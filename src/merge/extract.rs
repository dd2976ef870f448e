//! Page extraction from chapter archives
//!
//! Each extractor unpacks one archive into a private directory. Entry names
//! are sanitized so nothing lands outside the destination.

use crate::error::MergeError;
use crate::utils::ArchiveKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

type ExtractResult = std::result::Result<(), MergeError>;

/// Unpack `archive` into `dest`, dispatching on the archive kind
pub(crate) fn extract_archive(archive: &Path, kind: ArchiveKind, dest: &Path) -> ExtractResult {
    debug!(?archive, ?kind, ?dest, "extracting chapter archive");
    std::fs::create_dir_all(dest).map_err(|e| extraction_failed(archive, e))?;
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::SevenZip => extract_7z(archive, dest),
        ArchiveKind::Rar => extract_rar(archive, dest),
    }
}

fn open_failed(archive: &Path, reason: impl ToString) -> MergeError {
    MergeError::OpenFailed {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extraction_failed(archive: &Path, reason: impl ToString) -> MergeError {
    MergeError::ExtractionFailed {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Keep only normal components of an entry name
fn sanitize_entry(name: &Path) -> Option<PathBuf> {
    let cleaned: PathBuf = name
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if cleaned.as_os_str().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> ExtractResult {
    let file = std::fs::File::open(archive).map_err(|e| open_failed(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| open_failed(archive, e))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| extraction_failed(archive, e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name().and_then(sanitize_entry) else {
            debug!(?archive, name = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| extraction_failed(archive, e))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|e| extraction_failed(archive, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| extraction_failed(archive, e))?;
    }
    Ok(())
}

fn extract_7z(archive: &Path, dest: &Path) -> ExtractResult {
    sevenz_rust::decompress_file(archive, dest).map_err(|e| open_failed(archive, e))?;

    // sevenz_rust writes entry names as given; reject anything that escaped
    let root = dest
        .canonicalize()
        .map_err(|e| extraction_failed(archive, e))?;
    for file in crate::utils::collect_files(dest).map_err(|e| extraction_failed(archive, e))? {
        let resolved = file
            .canonicalize()
            .map_err(|e| extraction_failed(archive, e))?;
        if !resolved.starts_with(&root) {
            return Err(extraction_failed(
                archive,
                format!("entry escapes destination: {}", file.display()),
            ));
        }
    }
    Ok(())
}

fn extract_rar(archive: &Path, dest: &Path) -> ExtractResult {
    let mut at_header = unrar::Archive::new(archive)
        .open_for_processing()
        .map_err(|e| open_failed(archive, e))?;

    loop {
        let at_file = match at_header.read_header() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(extraction_failed(archive, e)),
        };

        let header = at_file.entry();
        let target = if header.is_directory() {
            None
        } else {
            sanitize_entry(Path::new(&header.filename)).map(|rel| dest.join(rel))
        };

        at_header = match target {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| extraction_failed(archive, e))?;
                }
                at_file
                    .extract_to(&path)
                    .map_err(|e| extraction_failed(archive, e))?
            }
            None => at_file.skip().map_err(|e| extraction_failed(archive, e))?,
        };
    }
    Ok(())
}
