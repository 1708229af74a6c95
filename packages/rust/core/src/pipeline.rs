//! End-to-end invocations: `discover` (targets → manifests) and `extract`
//! (manifest → records → published artifact).
//!
//! Each invocation owns one navigator session and releases it on every exit
//! path, including fatal ones.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use listharvest_artifacts::{Aggregator, PublishOutcome, dedup_cities, read_manifest, write_manifests};
use listharvest_crawler::{
    ItemExtractor, ItemFailure, LayoutRegistry, MediaFetcher, MediaUploader, Navigator,
    traverse_target,
};
use listharvest_shared::{
    AppConfig, BatchConfig, ExtractConfig, HarvestError, Result, Target, TraversalConfig,
};
use listharvest_storage::Storage;

// ---------------------------------------------------------------------------
// Events and responses
// ---------------------------------------------------------------------------

/// Input of a discovery invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub city_links: Vec<String>,
}

/// Input of an extraction invocation. Only the first manifest key is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionEvent {
    #[serde(rename = "Items")]
    pub items: Vec<String>,
}

/// Status returned by an extraction invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub status_code: u16,
}

impl ExtractionResponse {
    /// At least one record was published.
    pub const PUBLISHED: Self = Self { status_code: 200 };
    /// No record was collected; nothing was written.
    pub const EMPTY: Self = Self { status_code: 404 };
}

/// Result of [`discover`].
#[derive(Debug)]
pub struct DiscoveryResult {
    /// Manifest keys written, in sequence order.
    pub manifest_keys: Vec<String>,
    pub cities: Vec<String>,
    pub links: usize,
    pub elapsed: Duration,
}

/// Result of [`extract`].
#[derive(Debug)]
pub struct ExtractionResult {
    pub response: ExtractionResponse,
    pub manifest_key: String,
    /// Key of the published artifact, if any.
    pub output_key: Option<String>,
    pub records: usize,
    pub failures: Vec<ItemFailure>,
    pub media_uploaded: usize,
    pub media_failed: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a target's links have all been collected.
    fn target_done(&self, city: &str, links: usize, current: usize, total: usize);
    /// Called after each item extraction attempt.
    fn item_done(&self, url: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn target_done(&self, _city: &str, _links: usize, _current: usize, _total: usize) {}
    fn item_done(&self, _url: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Session release
// ---------------------------------------------------------------------------

/// Close the navigator session. A close failure is logged, never raised, so
/// it cannot mask the invocation's own outcome.
async fn release<N>(nav: &mut N)
where
    N: Navigator + ?Sized,
{
    if let Err(e) = nav.close().await {
        warn!(error_kind = e.kind(), error = %e, "failed to close navigator session");
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Traverse every target in order and write the collected links as manifests.
///
/// A page-advance failure on any target aborts the whole invocation; no
/// manifests are written for targets completed before it.
#[instrument(skip_all, fields(targets = event.city_links.len()))]
pub async fn discover<N>(
    nav: &mut N,
    storage: &Storage,
    event: &DiscoveryEvent,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<DiscoveryResult>
where
    N: Navigator + ?Sized,
{
    let start = Instant::now();

    let outcome = collect_links(nav, event, &TraversalConfig::from(config), progress).await;
    release(nav).await;
    let (cities, links) = outcome?;

    progress.phase("Writing manifests");
    let batches = write_manifests(
        storage,
        &links,
        &cities,
        &BatchConfig::from(config),
        Utc::now(),
    )
    .await?;

    let result = DiscoveryResult {
        links: batches.iter().map(|b| b.links.len()).sum(),
        manifest_keys: batches.into_iter().map(|b| b.key).collect(),
        cities,
        elapsed: start.elapsed(),
    };

    info!(
        links = result.links,
        manifests = result.manifest_keys.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "discovery complete"
    );

    Ok(result)
}

async fn collect_links<N>(
    nav: &mut N,
    event: &DiscoveryEvent,
    config: &TraversalConfig,
    progress: &dyn ProgressReporter,
) -> Result<(Vec<String>, Vec<String>)>
where
    N: Navigator + ?Sized,
{
    let targets = event
        .city_links
        .iter()
        .map(|link| Target::parse(link))
        .collect::<Result<Vec<_>>>()?;

    let layouts = LayoutRegistry::new(&config.legacy_cities);
    let mut links = Vec::new();

    progress.phase("Traversing listings");
    for (i, target) in targets.iter().enumerate() {
        let found = traverse_target(nav, target, layouts.for_city(&target.city), config).await?;
        progress.target_done(&found.city, found.links.len(), i + 1, targets.len());
        links.extend(found.links);
    }

    let cities = dedup_cities(targets.iter().map(|t| t.city.as_str()));
    Ok((cities, links))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every item of the event's first manifest and publish the records.
///
/// Per-item failures are collected, not raised. Returns
/// [`ExtractionResponse::EMPTY`] without writing anything when no record was
/// produced.
#[instrument(skip_all, fields(manifest = event.items.first().map(String::as_str).unwrap_or("")))]
pub async fn extract<N>(
    nav: &mut N,
    storage: &Storage,
    fetcher: &MediaFetcher,
    event: &ExtractionEvent,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<ExtractionResult>
where
    N: Navigator + ?Sized,
{
    let start = Instant::now();
    let extract_config = ExtractConfig::from(config);

    let outcome =
        extract_manifest(nav, storage, fetcher, event, &extract_config, progress).await;
    release(nav).await;
    let (manifest_key, report) = outcome?;

    progress.phase("Publishing records");
    let mut aggregator = Aggregator::new();
    for record in report.records {
        aggregator.push(record);
    }
    let records = aggregator.len();

    let (response, output_key) = match aggregator
        .publish(storage, &extract_config.data_bucket, Utc::now())
        .await?
    {
        PublishOutcome::Published { key, .. } => (ExtractionResponse::PUBLISHED, Some(key)),
        PublishOutcome::Empty => (ExtractionResponse::EMPTY, None),
    };

    let result = ExtractionResult {
        response,
        manifest_key,
        output_key,
        records,
        failures: report.failures,
        media_uploaded: report.media_uploaded,
        media_failed: report.media_failed,
        elapsed: start.elapsed(),
    };

    for failure in &result.failures {
        info!(url = %failure.url, error_kind = failure.error.kind(), "item not extracted");
    }
    info!(
        status_code = result.response.status_code,
        records = result.records,
        failed = result.failures.len(),
        media_uploaded = result.media_uploaded,
        media_failed = result.media_failed,
        elapsed_ms = result.elapsed.as_millis(),
        "extraction complete"
    );

    Ok(result)
}

async fn extract_manifest<N>(
    nav: &mut N,
    storage: &Storage,
    fetcher: &MediaFetcher,
    event: &ExtractionEvent,
    config: &ExtractConfig,
    progress: &dyn ProgressReporter,
) -> Result<(String, listharvest_crawler::ExtractionReport)>
where
    N: Navigator + ?Sized,
{
    let manifest_key = event
        .items
        .first()
        .ok_or_else(|| HarvestError::config("extraction event has no manifest keys"))?
        .clone();
    if event.items.len() > 1 {
        warn!(
            ignored = event.items.len() - 1,
            "only the first manifest key is processed per invocation"
        );
    }

    progress.phase("Reading manifest");
    let links = read_manifest(storage, &config.links_bucket, &manifest_key).await?;
    info!(%manifest_key, links = links.len(), "manifest loaded");

    progress.phase("Extracting items");
    let extractor = ItemExtractor::new(config, MediaUploader::new(fetcher, storage, config));
    let total = links.len();
    let report = extractor
        .extract_all(nav, &links, |current, url| progress.item_done(url, current, total))
        .await;

    Ok((manifest_key, report))
}

#[cfg(test)]
mod tests {
    use listharvest_crawler::MemoryNavigator;
    use listharvest_shared::{ManifestBody, SiteConfig};

    use super::*;

    const LISTING: &str = "https://boston.craigslist.org/search/fuo";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.site.wait_timeout_secs = 0;
        config.batching.batch_size = 2;
        config.media.delay_min_ms = 0;
        config.media.delay_max_ms = 0;
        config.storage.links_bucket = "links".into();
        config.storage.data_bucket = "data".into();
        config
    }

    fn storage() -> Storage {
        Storage::in_memory(&["links", "data"])
    }

    fn fetcher() -> MediaFetcher {
        MediaFetcher::new(&SiteConfig::default()).unwrap()
    }

    fn item_url(id: u32) -> String {
        format!("https://boston.craigslist.org/gbs/fuo/d/item-{id}/{id}.html")
    }

    fn item_page(id: u32) -> String {
        format!(
            r#"<html><body>
            <h1 class="postingtitle"><span id="titletextonly">Item {id}</span></h1>
            <time class="date timeago" datetime="2024-01-20T09:15:00-0500">jan 20</time>
            <section id="postingbody">Item number {id}.</section>
            <div id="map" data-latitude="42.35" data-longitude="-71.06"></div>
            </body></html>"#
        )
    }

    fn listing_page(count: &str, ids: &[u32], next: Option<&str>) -> String {
        let mut html = format!(r#"<html><body><span class="cl-page-number">{count}</span>"#);
        for id in ids {
            html.push_str(&format!(
                r#"<a class="cl-app-anchor text-only posting-title" href="/gbs/fuo/d/item-{id}/{id}.html">Item {id}</a>"#
            ));
        }
        if let Some(next) = next {
            html.push_str(&format!(
                r#"<button class="bd-button cl-next-page icon-only" data-href="{next}">next</button>"#
            ));
        }
        html.push_str("</body></html>");
        html
    }

    async fn seed_manifest(storage: &Storage, key: &str, links: Vec<String>) {
        let body = serde_json::to_vec(&ManifestBody { post_links: links }).unwrap();
        storage.put("links", key, body).await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn discovery_writes_manifests_and_closes_session() {
        let mut config = config();
        config.site.page_size = 3;

        let mut nav = MemoryNavigator::new()
            .with_page(LISTING, listing_page("1 - 3 of 5", &[1, 2, 3], Some("?s=3")))
            .with_page(format!("{LISTING}?s=3"), listing_page("4 - 5 of 5", &[4, 5], None));
        let storage = storage();
        let event = DiscoveryEvent {
            city_links: vec![LISTING.into()],
        };

        let result = discover(&mut nav, &storage, &event, &config, &SilentProgress)
            .await
            .unwrap();

        assert!(nav.is_closed());
        assert_eq!(result.links, 5);
        assert_eq!(result.cities, vec!["boston"]);
        assert_eq!(result.manifest_keys.len(), 3);
        assert!(result.manifest_keys[0].ends_with("/boston/00001.json"));

        let mut restored = Vec::new();
        for key in &result.manifest_keys {
            restored.extend(read_manifest(&storage, "links", key).await.unwrap());
        }
        assert_eq!(restored, (1..=5).map(item_url).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn navigation_control_failure_aborts_and_closes_session() {
        let chicago = "https://chicago.craigslist.org/search/fuo";
        let mut nav = MemoryNavigator::new()
            .with_page(LISTING, listing_page("1 - 2 of 2", &[1, 2], None))
            .with_page(chicago, listing_page("1 - 120 of 300", &[3], None));
        let storage = storage();
        let event = DiscoveryEvent {
            city_links: vec![LISTING.into(), chicago.into()],
        };

        let err = discover(&mut nav, &storage, &event, &config(), &SilentProgress)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "navigation_control");
        assert!(nav.is_closed());
        assert!(storage.list("links", None).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn partial_failures_still_publish() {
        let storage = storage();
        let links: Vec<String> = (1..=10).map(item_url).collect();
        seed_manifest(&storage, "2024_01_25/02/boston/00001.json", links).await;

        let mut nav = MemoryNavigator::new();
        for id in (1..=10).filter(|id| ![2, 5, 9].contains(id)) {
            nav = nav.with_page(item_url(id), item_page(id));
        }

        let event = ExtractionEvent {
            items: vec!["2024_01_25/02/boston/00001.json".into()],
        };
        let result = extract(&mut nav, &storage, &fetcher(), &event, &config(), &SilentProgress)
            .await
            .unwrap();

        assert!(nav.is_closed());
        assert_eq!(result.response, ExtractionResponse::PUBLISHED);
        assert_eq!(result.records, 7);
        assert_eq!(result.failures.len(), 3);

        let key = result.output_key.unwrap();
        assert!(key.starts_with("data/fuo/"));
        assert!(key.ends_with("/boston/1.csv"));

        let body = storage.get("data", &key).await.unwrap();
        let mut reader = csv::Reader::from_reader(body.as_slice());
        assert_eq!(reader.records().count(), 7);
    }

    #[tokio::test]
    async fn zero_yield_reports_404_and_writes_nothing() {
        let storage = storage();
        seed_manifest(&storage, "m.json", vec![item_url(1), item_url(2)]).await;

        let mut nav = MemoryNavigator::new();
        let event = ExtractionEvent {
            items: vec!["m.json".into()],
        };
        let result = extract(&mut nav, &storage, &fetcher(), &event, &config(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.response, ExtractionResponse::EMPTY);
        assert_eq!(result.output_key, None);
        assert!(storage.list("data", None).await.unwrap().is_empty());
        assert!(nav.is_closed());
    }

    #[tokio::test]
    async fn missing_items_is_config_error() {
        let mut nav = MemoryNavigator::new();
        let event = ExtractionEvent { items: vec![] };
        let err = extract(&mut nav, &storage(), &fetcher(), &event, &config(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(nav.is_closed());
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal() {
        let mut nav = MemoryNavigator::new();
        let event = ExtractionEvent {
            items: vec!["nope.json".into()],
        };
        let err = extract(&mut nav, &storage(), &fetcher(), &event, &config(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert!(nav.is_closed());
    }

    #[test]
    fn events_use_wire_field_names() {
        let event: ExtractionEvent = serde_json::from_str(r#"{"Items": ["a.json"]}"#).unwrap();
        assert_eq!(event.items, vec!["a.json"]);

        let event: DiscoveryEvent =
            serde_json::from_str(r#"{"city_links": ["https://boston.craigslist.org/search/fuo"]}"#)
                .unwrap();
        assert_eq!(event.city_links.len(), 1);

        let json = serde_json::to_string(&ExtractionResponse::EMPTY).unwrap();
        assert_eq!(json, r#"{"status_code":404}"#);
    }
}
