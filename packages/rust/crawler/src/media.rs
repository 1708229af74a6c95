//! Media download and upload to the blob store.
//!
//! Each asset is fetched and stored independently; a failed asset is logged
//! and left out of the record's key list.

use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use listharvest_shared::{ExtractConfig, HarvestError, MediaAsset, Result, SiteConfig};
use listharvest_storage::Storage;

/// Characters kept verbatim in media keys.
static UNSAFE_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_. -]").expect("static key pattern"));

/// Derive the storage key for a media URL: `{prefix}/{sanitized path}`.
pub fn media_key(prefix: &str, source_url: &str) -> Result<String> {
    let url = Url::parse(source_url)
        .map_err(|e| HarvestError::parse(format!("invalid media URL '{source_url}': {e}")))?;

    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        return Err(HarvestError::parse(format!(
            "media URL '{source_url}' has no path"
        )));
    }

    let sanitized = UNSAFE_KEY_CHARS.replace_all(path, "_");
    Ok(format!("{}/{sanitized}", prefix.trim_end_matches('/')))
}

// ---------------------------------------------------------------------------
// MediaFetcher
// ---------------------------------------------------------------------------

/// HTTP client for media bytes.
#[derive(Clone)]
pub struct MediaFetcher {
    client: Client,
}

impl MediaFetcher {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(site.user_agent.as_str())
            .timeout(Duration::from_secs(site.request_timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download the raw bytes at `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Network(format!("{url}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Keys stored and assets dropped for one item.
#[derive(Debug, Default)]
pub struct MediaOutcome {
    pub keys: Vec<String>,
    pub failed: usize,
}

/// Fetches discovered media and writes it to the data bucket.
pub struct MediaUploader<'a> {
    fetcher: &'a MediaFetcher,
    storage: &'a Storage,
    config: &'a ExtractConfig,
}

impl<'a> MediaUploader<'a> {
    pub fn new(fetcher: &'a MediaFetcher, storage: &'a Storage, config: &'a ExtractConfig) -> Self {
        Self {
            fetcher,
            storage,
            config,
        }
    }

    /// Fetch and store one asset.
    pub async fn upload(&self, source_url: &str) -> Result<MediaAsset> {
        let key = media_key(&self.config.media_prefix, source_url)?;
        let body = self.fetcher.fetch(source_url).await?;
        self.storage
            .put(&self.config.data_bucket, &key, body)
            .await?;

        Ok(MediaAsset {
            source_url: source_url.to_string(),
            key,
        })
    }

    /// Upload every link in order, pausing a random interval between assets.
    pub async fn upload_all(&self, item_url: &str, links: &[String]) -> MediaOutcome {
        let mut outcome = MediaOutcome::default();

        for (i, link) in links.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause()).await;
            }

            match self.upload(link).await {
                Ok(asset) => {
                    debug!(key = %asset.key, bucket = %self.config.data_bucket, "uploaded media");
                    outcome.keys.push(asset.key);
                }
                Err(e) => {
                    warn!(
                        url = %item_url,
                        media_url = %link,
                        error_kind = e.kind(),
                        error = %e,
                        "media upload failed, dropping asset"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    fn pause(&self) -> Duration {
        let min = self.config.media_delay_min.as_millis() as u64;
        let max = self.config.media_delay_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_config() -> ExtractConfig {
        ExtractConfig {
            wait_timeout: Duration::from_millis(20),
            links_bucket: "links".into(),
            data_bucket: "data".into(),
            media_prefix: "images".into(),
            media_delay_min: Duration::ZERO,
            media_delay_max: Duration::ZERO,
        }
    }

    #[test]
    fn key_uses_sanitized_path() {
        let key = media_key(
            "images",
            "https://images.craigslist.org/00a0a_kDnR3e8Rx4Ez_0CI0t2_600x450.jpg",
        )
        .unwrap();
        assert_eq!(key, "images/00a0a_kDnR3e8Rx4Ez_0CI0t2_600x450.jpg");
    }

    #[test]
    fn key_replaces_unsafe_characters() {
        let key = media_key("images", "https://cdn.example.org/d/e%20f:g.jpg?x=1").unwrap();
        assert_eq!(key, "images/d_e_20f_g.jpg");
    }

    #[test]
    fn key_requires_a_path() {
        assert!(media_key("images", "https://images.craigslist.org/").is_err());
        assert!(media_key("images", "not a url").is_err());
    }

    #[tokio::test]
    async fn failed_assets_are_dropped_not_fatal() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/ok_1.jpg"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/missing.jpg"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/ok_2.jpg"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![4]))
            .mount(&server)
            .await;

        let storage = Storage::in_memory(&["links", "data"]);
        let fetcher = MediaFetcher::new(&SiteConfig::default()).unwrap();
        let config = extract_config();
        let uploader = MediaUploader::new(&fetcher, &storage, &config);

        let links: Vec<String> = ["ok_1.jpg", "missing.jpg", "ok_2.jpg"]
            .iter()
            .map(|p| format!("{}/{p}", server.uri()))
            .collect();
        let outcome = uploader
            .upload_all("https://boston.craigslist.org/x.html", &links)
            .await;

        assert_eq!(outcome.keys, vec!["images/ok_1.jpg", "images/ok_2.jpg"]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(storage.get("data", "images/ok_1.jpg").await.unwrap(), vec![1, 2, 3]);
        assert!(storage.get("data", "images/missing.jpg").await.is_err());
    }

    #[test]
    fn pause_stays_within_bounds() {
        let storage = Storage::in_memory(&["data"]);
        let fetcher = MediaFetcher::new(&SiteConfig::default()).unwrap();
        let config = ExtractConfig {
            media_delay_min: Duration::from_millis(500),
            media_delay_max: Duration::from_millis(2000),
            ..extract_config()
        };
        let uploader = MediaUploader::new(&fetcher, &storage, &config);
        for _ in 0..50 {
            let pause = uploader.pause();
            assert!(pause >= Duration::from_millis(500) && pause <= Duration::from_millis(2000));
        }
    }
}
