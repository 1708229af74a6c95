//! Item extraction: one structured record (plus media) per item page.
//!
//! Items are processed sequentially. Any failure on one item is returned
//! as an [`ItemFailure`] and the loop moves on; no partial records are
//! produced.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use listharvest_shared::{ExtractConfig, ExtractedRecord, HarvestError, PostLink, Result};

use crate::media::MediaUploader;
use crate::navigator::{Condition, Locator, Navigator};

/// Capture-time format, e.g. `2024-01-25T02:13:55+0000`.
pub const TIME_DOWNLOADED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

const TITLE: &str = r#"h1[class*="postingtitle"]"#;
const BODY: &str = r#"section[id*="postingbody"]"#;
const TIMESTAMPS: &str = r#"time[class*="date timeago"]"#;
const MAP: &str = r#"div[id*="map"]"#;
const FIGURE: &str = "figure";
const PRIMARY_IMAGE: &str = r#"img[alt*="1"]"#;
const THUMBNAILS: &str = r#"a[class*="thumb"]"#;

// ---------------------------------------------------------------------------
// Media discovery
// ---------------------------------------------------------------------------

/// Structure of an item's figure element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    SingleImage,
    MultiImage,
    /// No figure, or one we do not recognize.
    None,
}

/// Classify the current page's figure element.
pub fn classify_figure<N>(nav: &N) -> FigureKind
where
    N: Navigator + ?Sized,
{
    let class = nav
        .find(&Locator::css(FIGURE))
        .ok()
        .flatten()
        .and_then(|figure| figure.attribute("class").map(str::to_string));

    match class.as_deref() {
        Some("iw oneimage") => FigureKind::SingleImage,
        Some("iw multiimage") => FigureKind::MultiImage,
        _ => FigureKind::None,
    }
}

/// Media URLs on the current page, per its figure structure.
pub fn discover_media<N>(nav: &N) -> Vec<String>
where
    N: Navigator + ?Sized,
{
    let kind = classify_figure(nav);
    let links: Vec<String> = match kind {
        FigureKind::SingleImage => nav
            .find(&Locator::css(PRIMARY_IMAGE))
            .ok()
            .flatten()
            .and_then(|img| img.attribute("src").map(str::to_string))
            .into_iter()
            .collect(),
        FigureKind::MultiImage => nav
            .find_all(&Locator::css(THUMBNAILS))
            .unwrap_or_default()
            .iter()
            .filter_map(|a| a.attribute("href").map(str::to_string))
            .collect(),
        FigureKind::None => Vec::new(),
    };

    debug!(?kind, found = links.len(), "discovered media links");
    links
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

/// Read the record fields from the current page. Media keys are left empty.
pub fn extract_text_data<N>(nav: &N, link: &PostLink) -> Result<ExtractedRecord>
where
    N: Navigator + ?Sized,
{
    let url = link.url.as_str();
    let required = |css: &str, field: &str| {
        nav.find(&Locator::css(css))?
            .ok_or_else(|| HarvestError::extraction(url, field))
    };

    let times: Vec<String> = nav
        .find_all(&Locator::css(TIMESTAMPS))?
        .iter()
        .filter_map(|t| t.attribute("datetime").map(str::to_string))
        .collect();
    let (Some(time_posted), Some(last_updated)) = (times.first(), times.last()) else {
        return Err(HarvestError::extraction(url, "time_posted"));
    };

    let title = required(TITLE, "title")?.text().to_string();
    let body_text = required(BODY, "body_text")?.text().replace('\n', " ");

    let map = required(MAP, "map")?;
    let coordinate = |name: &str, field: &str| {
        map.attribute(name)
            .map(str::to_string)
            .ok_or_else(|| HarvestError::extraction(url, field))
    };
    let latitude = coordinate("data-latitude", "latitude")?;
    let longitude = coordinate("data-longitude", "longitude")?;

    Ok(ExtractedRecord {
        city: link.city.clone(),
        category: link.category.clone(),
        post_id: link.post_id.clone(),
        time_posted: time_posted.clone(),
        last_updated: last_updated.clone(),
        time_downloaded: Utc::now().format(TIME_DOWNLOADED_FORMAT).to_string(),
        title,
        body_text,
        latitude,
        longitude,
        image_s3_keys: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// ItemExtractor
// ---------------------------------------------------------------------------

/// An item that produced no record.
#[derive(Debug)]
pub struct ItemFailure {
    pub url: String,
    pub error: HarvestError,
}

/// Result of extracting one manifest's links.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Records in link order.
    pub records: Vec<ExtractedRecord>,
    pub failures: Vec<ItemFailure>,
    pub media_uploaded: usize,
    pub media_failed: usize,
}

/// Visits item pages and turns them into records.
pub struct ItemExtractor<'a> {
    config: &'a ExtractConfig,
    uploader: MediaUploader<'a>,
}

impl<'a> ItemExtractor<'a> {
    pub fn new(config: &'a ExtractConfig, uploader: MediaUploader<'a>) -> Self {
        Self { config, uploader }
    }

    /// Extract one item: navigate, read fields, collect media.
    #[instrument(skip(self, nav))]
    pub async fn extract_item<N>(&self, nav: &mut N, url: &str) -> Result<(ExtractedRecord, usize)>
    where
        N: Navigator + ?Sized,
    {
        let link = PostLink::parse(url)?;

        nav.navigate(url).await?;
        nav.wait_until(&Locator::css(TITLE), Condition::HasText, self.config.wait_timeout)
            .await?;

        let mut record = extract_text_data(nav, &link)?;
        let media_links = discover_media(nav);

        let media = self.uploader.upload_all(url, &media_links).await;
        record.image_s3_keys = media.keys;

        debug!(
            post_id = %record.post_id,
            images = record.image_s3_keys.len(),
            "extracted item"
        );
        Ok((record, media.failed))
    }

    /// Extract every link in order. `on_item` is called after each attempt
    /// with the 1-based position and the URL.
    pub async fn extract_all<N, F>(&self, nav: &mut N, links: &[String], mut on_item: F) -> ExtractionReport
    where
        N: Navigator + ?Sized,
        F: FnMut(usize, &str),
    {
        let mut report = ExtractionReport::default();

        for (i, url) in links.iter().enumerate() {
            match self.extract_item(nav, url).await {
                Ok((record, media_failed)) => {
                    report.media_uploaded += record.image_s3_keys.len();
                    report.media_failed += media_failed;
                    report.records.push(record);
                }
                Err(error) => {
                    warn!(
                        url = %url,
                        error_kind = error.kind(),
                        error = %error,
                        "item extraction failed, skipping"
                    );
                    report.failures.push(ItemFailure {
                        url: url.clone(),
                        error,
                    });
                }
            }
            on_item(i + 1, url);
        }

        info!(
            links = links.len(),
            records = report.records.len(),
            failed = report.failures.len(),
            media_uploaded = report.media_uploaded,
            media_failed = report.media_failed,
            "manifest extraction finished"
        );
        report
    }
}
