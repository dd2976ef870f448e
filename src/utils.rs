//! Utility functions for file classification, ordering and directory handling

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Extensions of page images the converter accepts
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Extensions of already-paginated documents that bypass merging
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "epub", "mobi", "azw3"];

/// Archive container formats for page collections
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    /// ZIP / CBZ
    Zip,
    /// 7-Zip / CB7
    SevenZip,
    /// RAR / CBR
    Rar,
}

/// What a path on disk represents to the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Loose page image
    Image,
    /// Archive holding page images
    Archive(ArchiveKind),
    /// Whole document passed to the converter unmodified
    Document,
    /// Anything else (sidecar metadata, covers in unknown formats, ...)
    Other,
}

fn lower_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classify a file by its extension
///
/// # Examples
///
/// ```
/// use panelpress::utils::{classify, ArchiveKind, SourceKind};
/// use std::path::Path;
///
/// assert_eq!(classify(Path::new("ch01/003.JPG")), SourceKind::Image);
/// assert_eq!(classify(Path::new("Vol. 2 Ch. 9.cbz")), SourceKind::Archive(ArchiveKind::Zip));
/// assert_eq!(classify(Path::new("book.pdf")), SourceKind::Document);
/// assert_eq!(classify(Path::new("info.json")), SourceKind::Other);
/// ```
#[must_use]
pub fn classify(path: &Path) -> SourceKind {
    let Some(ext) = lower_extension(path) else {
        return SourceKind::Other;
    };
    match ext.as_str() {
        "zip" | "cbz" => SourceKind::Archive(ArchiveKind::Zip),
        "7z" | "cb7" => SourceKind::Archive(ArchiveKind::SevenZip),
        "rar" | "cbr" => SourceKind::Archive(ArchiveKind::Rar),
        e if IMAGE_EXTENSIONS.contains(&e) => SourceKind::Image,
        e if DOCUMENT_EXTENSIONS.contains(&e) => SourceKind::Document,
        _ => SourceKind::Other,
    }
}

/// Compare two strings treating runs of ASCII digits as numbers
///
/// Non-digit characters compare case-insensitively; `"page2"` sorts before
/// `"page10"`. Equal numeric values with different zero padding fall back to
/// comparing the raw strings so the order stays total.
///
/// ```
/// use panelpress::utils::natural_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(natural_cmp("Ch. 2", "Ch. 10"), Ordering::Less);
/// assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let lt = ln.trim_start_matches('0');
                let rt = rn.trim_start_matches('0');
                let ord = lt.len().cmp(&rt.len()).then_with(|| lt.cmp(rt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Natural-sort paths by their path relative to a common root
pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
}

/// Recursively collect every regular file below `dir`
///
/// The result is natural-sorted by path so nested chapter folders keep their
/// order (`ch2/001.jpg` before `ch10/001.jpg`).
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read directory {}: {}", dir.display(), e),
            ))
        })?;

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                visit_dir(&path, files)?;
            } else if path.is_file() {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(dir, &mut files)?;
    sort_naturally(&mut files);
    Ok(files)
}

/// List the regular files directly inside `dir`, natural-sorted
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    sort_naturally(&mut files);
    Ok(files)
}

/// Remove a directory tree, treating "already gone" as success
pub async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Replace characters that are unsafe in file names
///
/// ```
/// use panelpress::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("One Piece: Vol/1"), "One Piece_ Vol_1");
/// assert_eq!(sanitize_file_name("  "), "untitled");
/// ```
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Maximum number of ` (n)` suffixes tried by [`unique_path`]
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Return `path`, or the first free `stem (n).ext` sibling if it is taken
pub fn unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Other(format!("cannot extract file stem of {}", path.display())))?;
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let name = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::Other(format!(
        "no free file name for {} after {} attempts",
        path.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

/// Move a file, falling back to copy + delete across filesystems
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await?;
            Ok(())
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn natural_order_sorts_numbers_by_value() {
        let mut names = vec!["p10.jpg", "p2.jpg", "p1.jpg", "P3.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["p1.jpg", "p2.jpg", "P3.jpg", "p10.jpg"]);
    }

    #[test]
    fn natural_order_handles_fractional_chapters() {
        let mut names = vec!["Ch. 10.5", "Ch. 10", "Ch. 9", "Ch. 11"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Ch. 9", "Ch. 10", "Ch. 10.5", "Ch. 11"]);
    }

    #[test]
    fn natural_order_is_total_for_zero_padding() {
        assert_ne!(natural_cmp("001", "1"), Ordering::Equal);
        assert_eq!(natural_cmp("001", "001"), Ordering::Equal);
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify(Path::new("A.CBR")), SourceKind::Archive(ArchiveKind::Rar));
        assert_eq!(classify(Path::new("a.cb7")), SourceKind::Archive(ArchiveKind::SevenZip));
        assert_eq!(classify(Path::new("x.WebP")), SourceKind::Image);
        assert_eq!(classify(Path::new("book.EPUB")), SourceKind::Document);
        assert_eq!(classify(Path::new("noext")), SourceKind::Other);
    }

    #[test]
    fn collect_files_recurses_in_natural_order() {
        let dir = TempDir::new().unwrap();
        for sub in ["ch10", "ch2"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join("1.png"), b"x").unwrap();
        }
        std::fs::write(dir.path().join("cover.jpg"), b"x").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rel, vec!["ch2/1.png", "ch10/1.png", "cover.jpg"]);
    }

    #[test]
    fn list_files_of_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_dir_if_exists_tolerates_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("unit-1");
        std::fs::create_dir_all(target.join("download")).unwrap();

        remove_dir_if_exists(&target).await.unwrap();
        assert!(!target.exists());
        remove_dir_if_exists(&target).await.unwrap();
    }

    #[test]
    fn unique_path_appends_counter() {
        let dir = TempDir::new().unwrap();
        let wanted = dir.path().join("Title.zip");
        assert_eq!(unique_path(&wanted).unwrap(), wanted);

        std::fs::write(&wanted, b"x").unwrap();
        std::fs::write(dir.path().join("Title (1).zip"), b"x").unwrap();
        assert_eq!(unique_path(&wanted).unwrap(), dir.path().join("Title (2).zip"));
    }

    #[tokio::test]
    async fn move_file_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.mobi");
        std::fs::write(&from, b"doc").unwrap();
        let to = dir.path().join("nested/out/a.mobi");

        move_file(&from, &to).await.unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"doc");
    }
}
