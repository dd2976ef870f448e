//! Configuration types for panelpress

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration
///
/// Fields are organised into sub-configs:
/// - [`storage`](StorageConfig): scratch, output and upload directories
/// - [`tools`](ToolsConfig): external downloader and converter binaries
/// - [`retry`](RetryConfig): supervision policy for external processes
/// - [`conversion`](ConversionConfig): converter defaults
/// - [`jobs`](JobsConfig): job store retention
/// - [`catalog`](CatalogConfig): remote content catalog
/// - [`api`](ApiConfig): HTTP server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Directory layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry policy for downloader and converter invocations
    #[serde(default)]
    pub retry: RetryConfig,

    /// Converter defaults
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Job store settings
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Remote content catalog
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults, so `{}` is a valid file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".into(),
                key: Some("retry.max_attempts".into()),
            });
        }
        if self.conversion.page_digits == 0 || self.conversion.page_digits > 12 {
            return Err(Error::Config {
                message: format!(
                    "page_digits must be between 1 and 12, got {}",
                    self.conversion.page_digits
                ),
                key: Some("conversion.page_digits".into()),
            });
        }
        if self.jobs.max_units == 0 {
            return Err(Error::Config {
                message: "max_units must be at least 1".into(),
                key: Some("jobs.max_units".into()),
            });
        }
        Ok(())
    }
}

/// Scratch and output directory layout
///
/// Everything below `scratch_dir` is shared mutable state guarded by the
/// execution gate; `output_dir` holds finished artifacts.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Scratch directory for downloads, merges and converter output (default: "scratch")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Stable artifact directory (default: "processed")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding locally supplied source files (default: "uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            output_dir: default_output_dir(),
            upload_dir: default_upload_dir(),
        }
    }
}

/// External tool paths (downloader, scraper, converter)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to the catalog downloader (auto-detected as `mangadex-dl` if None)
    #[serde(default)]
    pub downloader_path: Option<PathBuf>,

    /// Path to the web page scraper (auto-detected as `gallery-dl` if None)
    #[serde(default)]
    pub scraper_path: Option<PathBuf>,

    /// Path to the image-to-document converter (auto-detected as `kcc-c2e` if None)
    #[serde(default)]
    pub converter_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            scraper_path: None,
            converter_path: None,
            search_path: true,
        }
    }
}

/// Retry configuration for external process invocations
///
/// The cool-down is fixed: every retry waits the same interval.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (default: 5 seconds)
    #[serde(default = "default_cooldown", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub cooldown: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            cooldown: default_cooldown(),
        }
    }
}

/// Converter defaults applied when a request leaves an option unset
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversionConfig {
    /// Device profile (default: "KPW5")
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Output format (default: "MOBI")
    #[serde(default = "default_format")]
    pub format: String,

    /// Right-to-left manga mode (default: true)
    #[serde(default = "default_true")]
    pub manga_mode: bool,

    /// Upscale small pages to the device resolution (default: false)
    #[serde(default)]
    pub upscale: bool,

    /// Catalog language selector (default: "en")
    #[serde(default = "default_language")]
    pub language: String,

    /// Width of the zero-padded page counter in merged collections (default: 6)
    #[serde(default = "default_page_digits")]
    pub page_digits: usize,

    /// Prefix merged page names with the chapter index (default: false)
    #[serde(default)]
    pub chapter_prefix: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            format: default_format(),
            manga_mode: true,
            upscale: false,
            language: default_language(),
            page_digits: default_page_digits(),
            chapter_prefix: false,
        }
    }
}

/// Job store settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobsConfig {
    /// Number of terminal jobs kept before the oldest are evicted (default: 50)
    #[serde(default = "default_retain_finished")]
    pub retain_finished: usize,

    /// Largest number of volumes one request may cover (default: 500)
    #[serde(default = "default_max_units")]
    pub max_units: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retain_finished: default_retain_finished(),
            max_units: default_max_units(),
        }
    }
}

/// Remote content catalog configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogConfig {
    /// API base URL (default: "https://api.mangadex.org")
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Cover image base URL (default: "https://uploads.mangadex.org/covers")
    #[serde(default = "default_cover_url")]
    pub cover_base_url: String,

    /// Request timeout (default: 15 seconds)
    #[serde(default = "default_catalog_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Maximum number of search results (default: 10)
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            cover_base_url: default_cover_url(),
            timeout: default_catalog_timeout(),
            search_limit: default_search_limit(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

// Default value functions
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("scratch")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("processed")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cooldown() -> Duration {
    Duration::from_secs(5)
}

fn default_profile() -> String {
    "KPW5".into()
}

fn default_format() -> String {
    "MOBI".into()
}

fn default_language() -> String {
    "en".into()
}

fn default_page_digits() -> usize {
    6
}

fn default_retain_finished() -> usize {
    50
}

fn default_max_units() -> u64 {
    500
}

fn default_catalog_url() -> String {
    "https://api.mangadex.org".into()
}

fn default_cover_url() -> String {
    "https://uploads.mangadex.org/covers".into()
}

fn default_catalog_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_search_limit() -> u32 {
    10
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.cooldown, Duration::from_secs(5));
        assert_eq!(config.conversion.profile, "KPW5");
        assert_eq!(config.conversion.page_digits, 6);
        assert_eq!(config.storage.output_dir, PathBuf::from("processed"));
        assert_eq!(config.api.bind_address.port(), 8080);
    }

    #[test]
    fn cooldown_is_read_as_seconds() {
        let config: Config =
            serde_json::from_str(r#"{"retry": {"max_attempts": 2, "cooldown": 12}}"#).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.cooldown, Duration::from_secs(12));
    }

    #[test]
    fn zero_attempts_is_rejected_with_key() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("retry.max_attempts"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn page_digits_out_of_range_is_rejected() {
        let mut config = Config::default();
        config.conversion.page_digits = 13;
        assert!(config.validate().is_err());
        config.conversion.page_digits = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_units_is_rejected() {
        let mut config = Config::default();
        config.jobs.max_units = 0;
        let Err(Error::Config { key, .. }) = config.validate() else {
            panic!("expected a config error");
        };
        assert_eq!(key.as_deref(), Some("jobs.max_units"));
    }

    #[test]
    fn from_file_reads_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": {"scratch_dir": "/tmp/pp-scratch"}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.storage.scratch_dir,
            PathBuf::from("/tmp/pp-scratch")
        );
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(Error::Config { .. })
        ));
    }
}
