//! Core domain types for harvested listings.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

/// Pattern recovering `(city, category, post_id)` from an item URL.
static POST_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(.+)\.craigslist\.org.*/([a-z]+)/d/.+/([0-9]+)\.html")
        .expect("static post link pattern")
});

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One listing source (a city's search page) to traverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Listing URL as given by the caller.
    pub url: Url,
    /// City identifier, the first label of the listing host.
    pub city: String,
}

impl Target {
    /// Parse a listing URL, deriving the city from its host.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)
            .map_err(|e| HarvestError::parse(format!("invalid target URL '{raw}': {e}")))?;

        let city = url
            .host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .ok_or_else(|| HarvestError::parse(format!("target URL '{raw}' has no host")))?
            .to_string();

        Ok(Self { url, city })
    }
}

// ---------------------------------------------------------------------------
// PostLink
// ---------------------------------------------------------------------------

/// A discovered item URL plus the identity recovered from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostLink {
    pub url: String,
    pub city: String,
    pub category: String,
    pub post_id: String,
}

impl PostLink {
    /// Parse an item URL. Fails if it does not follow the item URL pattern.
    pub fn parse(url: &str) -> Result<Self> {
        let caps = POST_LINK_RE
            .captures(url)
            .ok_or_else(|| HarvestError::extraction(url, "post_link"))?;

        Ok(Self {
            url: url.to_string(),
            city: caps[1].to_string(),
            category: caps[2].to_string(),
            post_id: caps[3].to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// JSON body of a persisted link batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBody {
    pub post_links: Vec<String>,
}

// ---------------------------------------------------------------------------
// ExtractedRecord
// ---------------------------------------------------------------------------

/// Structured data extracted from one item page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub city: String,
    pub category: String,
    pub post_id: String,
    pub time_posted: String,
    pub last_updated: String,
    pub time_downloaded: String,
    pub title: String,
    pub body_text: String,
    pub latitude: String,
    pub longitude: String,
    /// Blob store keys of the media assets that uploaded successfully.
    pub image_s3_keys: Vec<String>,
}

impl ExtractedRecord {
    /// Column names in output order.
    pub const FIELD_NAMES: [&'static str; 11] = [
        "city",
        "category",
        "post_id",
        "time_posted",
        "last_updated",
        "time_downloaded",
        "title",
        "body_text",
        "latitude",
        "longitude",
        "image_s3_keys",
    ];

    /// Field names of this record, in key order.
    pub fn field_names(&self) -> Vec<&'static str> {
        Self::FIELD_NAMES.to_vec()
    }

    /// Flatten the record into cell values aligned with [`Self::FIELD_NAMES`].
    ///
    /// The media key list is rendered as a JSON array in a single cell.
    pub fn to_row(&self) -> Result<Vec<String>> {
        Ok(vec![
            self.city.clone(),
            self.category.clone(),
            self.post_id.clone(),
            self.time_posted.clone(),
            self.last_updated.clone(),
            self.time_downloaded.clone(),
            self.title.clone(),
            self.body_text.clone(),
            self.latitude.clone(),
            self.longitude.clone(),
            serde_json::to_string(&self.image_s3_keys)?,
        ])
    }
}

// ---------------------------------------------------------------------------
// MediaAsset
// ---------------------------------------------------------------------------

/// A media URL and the storage key it uploads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub source_url: String,
    pub key: String,
}
