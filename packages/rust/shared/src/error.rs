//! Error types for listharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all listharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a page or media asset.
    #[error("network error: {0}")]
    Network(String),

    /// The navigator could not load a URL.
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A bounded wait expired before its condition held.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// A structural query found nothing where an element was required.
    #[error("element not found: {locator}")]
    ElementMissing { locator: String },

    /// A required field could not be read from an item page.
    #[error("could not extract {field} from {url}")]
    Extraction { url: String, field: String },

    /// The page-advance control was missing or not activatable.
    #[error("page-advance failed for {target} on page {page}: {message}")]
    NavigationControl {
        target: String,
        page: u32,
        message: String,
    },

    /// HTML, selector, or URL parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Blob store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON or CSV (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a navigation error for `url`.
    pub fn navigation(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an extraction error for a missing or malformed field.
    pub fn extraction(url: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            field: field.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable short name of the error variant, logged as `error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Network(_) => "network",
            Self::Navigation { .. } => "navigation",
            Self::Timeout { .. } => "timeout",
            Self::ElementMissing { .. } => "element_missing",
            Self::Extraction { .. } => "extraction",
            Self::NavigationControl { .. } => "navigation_control",
            Self::Parse { .. } => "parse",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Io { .. } => "io",
        }
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
