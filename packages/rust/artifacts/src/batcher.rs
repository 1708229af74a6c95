//! Link batching and manifest persistence.
//!
//! Links are split into consecutive fixed-size batches. Each batch is written
//! as `{"post_links": [...]}` under
//! `{YYYY_MM_DD}/{HH}/{cities joined by "_"}/{sequence:05}.json`, with the
//! sequence starting at 1. Keys depend only on the hour-truncated clock, the
//! city set, and the sequence, so re-running in the same hour overwrites.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use listharvest_shared::{BatchConfig, HarvestError, ManifestBody, Result};
use listharvest_storage::Storage;

use crate::{DAY_FORMAT, HOUR_FORMAT};

/// One manifest: a contiguous slice of the discovered links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBatch {
    pub key: String,
    pub links: Vec<String>,
}

/// Split `links` into consecutive chunks of `batch_size`, preserving order.
///
/// The last chunk holds the remainder. An empty input yields no chunks.
pub fn partition(links: &[String], batch_size: usize) -> Result<Vec<Vec<String>>> {
    if batch_size == 0 {
        return Err(HarvestError::config("batch_size must be greater than zero"));
    }
    Ok(links.chunks(batch_size).map(<[String]>::to_vec).collect())
}

/// Storage key for manifest `sequence` of `cities` at `now`.
pub fn manifest_key(now: DateTime<Utc>, cities: &[String], sequence: usize) -> String {
    format!(
        "{}/{}/{}/{sequence:05}.json",
        now.format(DAY_FORMAT),
        now.format(HOUR_FORMAT),
        cities.join("_")
    )
}

/// Distinct cities in first-seen order.
pub fn dedup_cities<I, S>(cities: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for city in cities {
        let city = city.into();
        if !seen.contains(&city) {
            seen.push(city);
        }
    }
    seen
}

/// Partition `links` and write each batch as a manifest.
///
/// Returns the written batches in sequence order.
#[instrument(skip(storage, links, config), fields(links = links.len(), bucket = %config.bucket))]
pub async fn write_manifests(
    storage: &Storage,
    links: &[String],
    cities: &[String],
    config: &BatchConfig,
    now: DateTime<Utc>,
) -> Result<Vec<LinkBatch>> {
    let mut batches = Vec::new();

    for (i, chunk) in partition(links, config.batch_size)?.into_iter().enumerate() {
        let sequence = i + 1;
        let key = manifest_key(now, cities, sequence);
        let body = serde_json::to_vec(&ManifestBody {
            post_links: chunk.clone(),
        })?;

        storage.put(&config.bucket, &key, body).await?;
        debug!(%key, size = chunk.len(), "wrote manifest");

        batches.push(LinkBatch {
            key,
            links: chunk,
        });
    }

    info!(manifests = batches.len(), "link batching complete");
    Ok(batches)
}

/// Load a manifest's links from `bucket`.
pub async fn read_manifest(storage: &Storage, bucket: &str, key: &str) -> Result<Vec<String>> {
    let raw = storage.get(bucket, key).await?;
    let body: ManifestBody = serde_json::from_slice(&raw)
        .map_err(|e| HarvestError::parse(format!("malformed manifest '{key}': {e}")))?;
    Ok(body.post_links)
}
