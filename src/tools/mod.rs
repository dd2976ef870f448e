//! External tool adapters
//!
//! The pipeline talks to the downloader and converter through the
//! [`Downloader`] and [`Converter`] traits, so tests and alternative backends
//! can stand in for the real binaries.
//!
//! - [`CliDownloader`]: `mangadex-dl` for catalog ids, `gallery-dl` for web pages
//! - [`CliConverter`]: Kindle Comic Converter's `kcc-c2e`
//!
//! Binaries are resolved from configuration first, then from `PATH` using
//! the `which` crate.

mod converter;
mod downloader;
mod traits;

pub use converter::CliConverter;
pub use downloader::CliDownloader;
pub use traits::{ConversionTarget, Converter, DownloadTarget, Downloader};

use crate::config::Config;
use crate::runner::CommandRunner;
use std::path::{Path, PathBuf};

/// Default catalog downloader binary name
pub const DEFAULT_DOWNLOADER: &str = "mangadex-dl";
/// Default page scraper binary name
pub const DEFAULT_SCRAPER: &str = "gallery-dl";
/// Default converter binary name
pub const DEFAULT_CONVERTER: &str = "kcc-c2e";

/// Resolve the binary to execute
///
/// An explicit path always wins. Otherwise `PATH` is searched when allowed;
/// failing that the bare name is returned and the launch failure surfaces
/// through the runner's retry warnings.
pub fn resolve_binary(explicit: Option<&Path>, default_name: &str, search_path: bool) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if search_path {
        match which::which(default_name) {
            Ok(found) => return found,
            Err(_) => {
                tracing::warn!(binary = default_name, "binary not found in PATH");
            }
        }
    }
    PathBuf::from(default_name)
}

impl CliDownloader {
    /// Build the downloader from configuration
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self::new(
            resolve_binary(tools.downloader_path.as_deref(), DEFAULT_DOWNLOADER, tools.search_path),
            resolve_binary(tools.scraper_path.as_deref(), DEFAULT_SCRAPER, tools.search_path),
            CommandRunner::from_config(&config.retry),
        )
    }
}

impl CliConverter {
    /// Build the converter from configuration
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self::new(
            resolve_binary(tools.converter_path.as_deref(), DEFAULT_CONVERTER, tools.search_path),
            CommandRunner::from_config(&config.retry),
        )
    }
}
