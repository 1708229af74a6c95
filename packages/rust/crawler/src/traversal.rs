//! Pagination traversal of one listing target.
//!
//! A target is walked `Loading → CountResolved → Scraping(i) → Advancing → …
//! → Done`. The page count comes from the layout's count indicator; when it
//! cannot be read the traversal degrades to a single page. Failing to
//! advance past a page is fatal for the whole invocation.

use tracing::{debug, info, instrument, warn};

use listharvest_shared::{HarvestError, Result, Target, TraversalConfig};

use crate::layouts::PageLayout;
use crate::navigator::{Condition, Navigator};

// ---------------------------------------------------------------------------
// PageCursor
// ---------------------------------------------------------------------------

/// Per-target traversal position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// 1-based index of the page being scraped.
    pub page: u32,
    /// Total pages, once resolved.
    pub total_pages: Option<u32>,
    /// Set once the last page has been scraped.
    pub done: bool,
}

impl PageCursor {
    fn start() -> Self {
        Self {
            page: 1,
            total_pages: None,
            done: false,
        }
    }

    fn resolve(&mut self, total: u32) {
        self.total_pages = Some(total);
        self.done = total == 0;
    }

    /// Whether the current page is the final one.
    pub fn is_last(&self) -> bool {
        self.total_pages.is_none_or(|total| self.page >= total)
    }

    fn advance(&mut self) {
        if self.is_last() {
            self.done = true;
        } else {
            self.page += 1;
        }
    }
}

/// Outcome of page-count detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub pages: u32,
    /// True when detection failed and the single-page default was used.
    pub fallback: bool,
}

/// Links discovered for one target.
#[derive(Debug, Clone)]
pub struct TargetLinks {
    pub city: String,
    pub pages: u32,
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Walk every results page of `target`, collecting item links in order.
#[instrument(skip_all, fields(city = %target.city, url = %target.url, layout = layout.name()))]
pub async fn traverse_target<N>(
    nav: &mut N,
    target: &Target,
    layout: &dyn PageLayout,
    config: &TraversalConfig,
) -> Result<TargetLinks>
where
    N: Navigator + ?Sized,
{
    nav.navigate(target.url.as_str()).await?;
    debug!("listing page loaded");

    let mut cursor = PageCursor::start();
    let count = resolve_page_count(nav, layout, &target.city, config).await;
    cursor.resolve(count.pages);

    let mut links = Vec::new();
    while !cursor.done {
        let page_links = collect_page_links(nav, layout, config).await?;
        debug!(
            page = cursor.page,
            total = count.pages,
            found = page_links.len(),
            "scraped results page"
        );
        links.extend(page_links);

        if !cursor.is_last() {
            advance_page(nav, layout, &target.city, cursor.page, config).await?;
        }
        cursor.advance();
    }

    info!(
        pages = count.pages,
        count_fallback = count.fallback,
        links = links.len(),
        "target exhausted"
    );

    Ok(TargetLinks {
        city: target.city.clone(),
        pages: count.pages,
        links,
    })
}

/// Determine how many results pages the current listing has.
///
/// Any failure (missing indicator, unexpected text, timeout) yields one page.
pub async fn resolve_page_count<N>(
    nav: &mut N,
    layout: &dyn PageLayout,
    city: &str,
    config: &TraversalConfig,
) -> PageCount
where
    N: Navigator + ?Sized,
{
    let detected = match nav
        .wait_until(&layout.count_locator(), Condition::HasText, config.wait_timeout)
        .await
    {
        Ok(element) => layout
            .parse_count(element.text())
            .ok_or_else(|| HarvestError::parse(format!("unrecognized count '{}'", element.text()))),
        Err(e) => Err(e),
    };

    match detected {
        Ok(posts) => {
            let pages = posts.div_ceil(u64::from(config.page_size));
            let pages = u32::try_from(pages).unwrap_or(u32::MAX);
            debug!(city, posts, pages, "resolved page count");
            PageCount {
                pages,
                fallback: false,
            }
        }
        Err(e) => {
            warn!(
                city,
                error_kind = e.kind(),
                error = %e,
                "could not resolve page count, scraping a single page"
            );
            PageCount {
                pages: 1,
                fallback: true,
            }
        }
    }
}

/// Wait for result anchors to render and return their URLs in document order.
pub async fn collect_page_links<N>(
    nav: &mut N,
    layout: &dyn PageLayout,
    config: &TraversalConfig,
) -> Result<Vec<String>>
where
    N: Navigator + ?Sized,
{
    let locator = layout.post_anchor_locator();
    nav.wait_until(&locator, Condition::HasText, config.wait_timeout)
        .await?;

    Ok(nav
        .find_all(&locator)?
        .iter()
        .filter_map(|a| a.attribute("href").map(str::to_string))
        .collect())
}

/// Activate the next-page control, mapping any failure to `NavigationControl`.
pub async fn advance_page<N>(
    nav: &mut N,
    layout: &dyn PageLayout,
    city: &str,
    page: u32,
    config: &TraversalConfig,
) -> Result<()>
where
    N: Navigator + ?Sized,
{
    let control = layout.next_control_locator();
    let outcome = match nav
        .wait_until(&control, Condition::Clickable, config.wait_timeout)
        .await
    {
        Ok(_) => nav.activate(&control).await,
        Err(e) => Err(e),
    };

    outcome.map_err(|e| HarvestError::NavigationControl {
        target: city.to_string(),
        page,
        message: e.to_string(),
    })?;

    debug!(city, page, "advanced to next results page");
    Ok(())
}
