//! In-memory navigator serving pre-loaded pages.
//!
//! Used to replay saved pages and to drive traversal and extraction in
//! tests without a network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use listharvest_shared::{HarvestError, Result};

use super::Navigator;

/// Navigator over a fixed URL → markup map.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    pages: HashMap<String, String>,
    current_url: Option<String>,
    visits: Vec<String>,
    closed: bool,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `html` as the document served at `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// URLs navigated to so far, in order.
    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    /// Whether [`Navigator::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Navigator for MemoryNavigator {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        if self.closed {
            return Err(HarvestError::navigation(url, "navigator session is closed"));
        }
        if !self.pages.contains_key(url) {
            return Err(HarvestError::navigation(url, "no such page"));
        }
        self.visits.push(url.to_string());
        self.current_url = Some(url.to_string());
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        if self.closed {
            return Err(HarvestError::navigation("<closed>", "navigator session is closed"));
        }
        Ok(())
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    fn document(&self) -> Option<&str> {
        self.current_url
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(String::as_str)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::Locator;

    #[tokio::test]
    async fn serves_registered_pages_only() {
        let mut nav = MemoryNavigator::new()
            .with_page("https://boston.craigslist.org/a", "<p class='x'>hello</p>");

        nav.navigate("https://boston.craigslist.org/a").await.unwrap();
        let p = nav.find(&Locator::css("p.x")).unwrap().unwrap();
        assert_eq!(p.text(), "hello");

        let err = nav
            .navigate("https://boston.craigslist.org/b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "navigation");
        assert_eq!(nav.visits().len(), 1);
    }

    #[tokio::test]
    async fn queries_fail_before_first_navigation() {
        let nav = MemoryNavigator::new();
        assert!(nav.find_all(&Locator::css("p")).is_err());
    }
}
