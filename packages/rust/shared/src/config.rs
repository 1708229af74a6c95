//! Application configuration for listharvest.
//!
//! User config lives at `~/.listharvest/listharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "listharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".listharvest";

/// Browser-like user agent; the listing site serves reduced markup to bots.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

// ---------------------------------------------------------------------------
// Config structs (matching listharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing site access.
    #[serde(default)]
    pub site: SiteConfig,

    /// Link batching.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Media collection.
    #[serde(default)]
    pub media: MediaConfig,

    /// Blob store buckets.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Page-layout selection.
    #[serde(default)]
    pub layouts: LayoutsConfig,

    /// Log sink settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// User-Agent sent with page and media requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bound on explicit waits for dynamic content, in seconds.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Delay between polls while waiting, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Results shown per listing page by the source site.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            page_size: default_page_size(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_wait_timeout_secs() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_page_size() -> u32 {
    120
}

/// `[batching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Links per manifest.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

/// `[media]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Key prefix for uploaded media.
    #[serde(default = "default_media_prefix")]
    pub key_prefix: String,

    /// Lower bound of the pause between uploads, in milliseconds.
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the pause between uploads, in milliseconds.
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_media_prefix(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
        }
    }
}

fn default_media_prefix() -> String {
    "images".into()
}
fn default_delay_min_ms() -> u64 {
    500
}
fn default_delay_max_ms() -> u64 {
    2000
}

/// Blob store backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory per bucket under `root`.
    File,
    /// Amazon S3, credentials from the environment.
    S3,
    /// Process-local, lost on exit.
    Memory,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Root directory for the file backend.
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// AWS region for the S3 backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Bucket holding link manifests.
    #[serde(default = "default_links_bucket")]
    pub links_bucket: String,

    /// Bucket holding output artifacts and media.
    #[serde(default = "default_data_bucket")]
    pub data_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            root: default_storage_root(),
            region: None,
            links_bucket: default_links_bucket(),
            data_bucket: default_data_bucket(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_storage_root() -> String {
    "var/blobs".into()
}
fn default_links_bucket() -> String {
    "craigslist-post-links".into()
}
fn default_data_bucket() -> String {
    "craigslist-post-data".into()
}

/// `[layouts]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutsConfig {
    /// Cities still served with the legacy listing layout.
    #[serde(default)]
    pub legacy_cities: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `listharvest=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for pagination traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Bound on waits for counts, anchors, and controls.
    pub wait_timeout: Duration,
    /// Results per listing page.
    pub page_size: u32,
    /// Cities routed to the legacy layout.
    pub legacy_cities: Vec<String>,
}

impl From<&AppConfig> for TraversalConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            wait_timeout: Duration::from_secs(config.site.wait_timeout_secs),
            page_size: config.site.page_size,
            legacy_cities: config.layouts.legacy_cities.clone(),
        }
    }
}

/// Runtime configuration for link batching.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Bucket the manifests are written to.
    pub bucket: String,
}

impl From<&AppConfig> for BatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batching.batch_size,
            bucket: config.storage.links_bucket.clone(),
        }
    }
}

/// Runtime configuration for item extraction and publishing.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Bound on the wait for an item page to render its title.
    pub wait_timeout: Duration,
    /// Bucket manifests are read from.
    pub links_bucket: String,
    /// Bucket records and media are written to.
    pub data_bucket: String,
    pub media_prefix: String,
    pub media_delay_min: Duration,
    pub media_delay_max: Duration,
}

impl From<&AppConfig> for ExtractConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            wait_timeout: Duration::from_secs(config.site.wait_timeout_secs),
            links_bucket: config.storage.links_bucket.clone(),
            data_bucket: config.storage.data_bucket.clone(),
            media_prefix: config.media.key_prefix.clone(),
            media_delay_min: Duration::from_millis(config.media.delay_min_ms),
            media_delay_max: Duration::from_millis(config.media.delay_max_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.listharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.listharvest/listharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.batching.batch_size == 0 {
        return Err(HarvestError::config("batching.batch_size must be at least 1"));
    }
    if config.site.page_size == 0 {
        return Err(HarvestError::config("site.page_size must be at least 1"));
    }
    if config.media.delay_min_ms > config.media.delay_max_ms {
        return Err(HarvestError::config(format!(
            "media.delay_min_ms ({}) exceeds media.delay_max_ms ({})",
            config.media.delay_min_ms, config.media.delay_max_ms
        )));
    }
    if config.storage.links_bucket.is_empty() || config.storage.data_bucket.is_empty() {
        return Err(HarvestError::config("storage bucket names must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("batch_size = 10"));
        assert!(toml_str.contains("craigslist-post-links"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.site.page_size, 120);
        assert_eq!(parsed.storage.backend, StorageBackend::File);
        assert!(parsed.layouts.legacy_cities.is_empty());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[storage]
backend = "memory"

[layouts]
legacy_cities = ["atlanta", "chicago"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.data_bucket, "craigslist-post-data");
        assert_eq!(config.layouts.legacy_cities.len(), 2);
        assert_eq!(config.batching.batch_size, 10);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let traversal = TraversalConfig::from(&app);
        assert_eq!(traversal.wait_timeout, Duration::from_secs(10));
        assert_eq!(traversal.page_size, 120);

        let extract = ExtractConfig::from(&app);
        assert_eq!(extract.media_prefix, "images");
        assert_eq!(extract.media_delay_min, Duration::from_millis(500));
        assert_eq!(extract.media_delay_max, Duration::from_millis(2000));

        let batch = BatchConfig::from(&app);
        assert_eq!(batch.batch_size, 10);
        assert_eq!(batch.bucket, "craigslist-post-links");
    }

    #[test]
    fn validation_rejects_zero_batch() {
        let mut config = AppConfig::default();
        config.batching.batch_size = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn validation_rejects_inverted_delay() {
        let mut config = AppConfig::default();
        config.media.delay_min_ms = 3000;
        assert!(validate_config(&config).is_err());
    }
}
