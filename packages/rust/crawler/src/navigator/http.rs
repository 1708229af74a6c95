//! HTTP-backed navigator: fetch with `reqwest`, query with `scraper`.
//!
//! Pages are not script-rendered; waits re-fetch the page until the
//! condition holds or the bound expires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use listharvest_shared::{HarvestError, Result, SiteConfig};

use super::Navigator;

/// Navigator session over a plain HTTP client.
pub struct HttpNavigator {
    client: Option<Client>,
    current_url: Option<String>,
    body: Option<String>,
    poll_interval: Duration,
}

impl HttpNavigator {
    /// Create a session with the site's user agent and timeouts.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(site.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(site.request_timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Some(client),
            current_url: None,
            body: None,
            poll_interval: Duration::from_millis(site.poll_interval_ms),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| HarvestError::navigation("<closed>", "navigator session is closed"))
    }
}

#[async_trait]
impl Navigator for HttpNavigator {
    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let response = self
            .client()?
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::navigation(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::navigation(url, format!("HTTP {status}")));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::navigation(url, format!("body read failed: {e}")))?;

        debug!(%final_url, len = body.len(), "page loaded");
        self.current_url = Some(final_url);
        self.body = Some(body);
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        let url = self
            .current_url
            .clone()
            .ok_or_else(|| HarvestError::navigation("<none>", "nothing to reload"))?;
        self.navigate(&url).await
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    fn document(&self) -> Option<&str> {
        self.body.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        self.body = None;
        debug!("navigator session closed");
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::{Condition, Locator};

    fn site() -> SiteConfig {
        SiteConfig {
            wait_timeout_secs: 1,
            poll_interval_ms: 10,
            ..SiteConfig::default()
        }
    }

    #[tokio::test]
    async fn navigate_and_query_mock_page() {
        let server = wiremock::MockServer::start().await;
        let page = r#"<html><body>
            <a class="cl-app-anchor text-only posting-title" href="/fuo/d/chair/1.html">Chair</a>
            <a class="cl-app-anchor text-only posting-title" href="/fuo/d/table/2.html">Table</a>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/search/fuo"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let mut nav = HttpNavigator::new(&site()).unwrap();
        nav.navigate(&format!("{}/search/fuo", server.uri()))
            .await
            .unwrap();

        let anchors = nav.find_all(&Locator::css("a.posting-title")).unwrap();
        assert_eq!(anchors.len(), 2);
        assert_eq!(
            anchors[1].attribute("href").unwrap(),
            format!("{}/fuo/d/table/2.html", server.uri())
        );
    }

    #[tokio::test]
    async fn http_error_is_navigation_failure() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut nav = HttpNavigator::new(&site()).unwrap();
        let err = nav
            .navigate(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "navigation");
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn wait_times_out_when_element_never_renders() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let mut nav = HttpNavigator::new(&site()).unwrap();
        nav.navigate(&server.uri()).await.unwrap();
        let err = nav
            .wait_until(
                &Locator::css("span.cl-page-number"),
                Condition::HasText,
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[tokio::test]
    async fn activate_follows_control_target() {
        let server = wiremock::MockServer::start().await;
        let page1 = r#"<html><body><a href="/page2">next &gt;</a></body></html>"#;
        let page2 = r#"<html><body><h1>Second</h1></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::path("/page1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page1))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/page2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page2))
            .mount(&server)
            .await;

        let mut nav = HttpNavigator::new(&site()).unwrap();
        nav.navigate(&format!("{}/page1", server.uri())).await.unwrap();
        nav.activate(&Locator::link_text("next")).await.unwrap();

        assert_eq!(nav.current_url().unwrap(), format!("{}/page2", server.uri()));
        let h1 = nav.find(&Locator::css("h1")).unwrap().unwrap();
        assert_eq!(h1.text(), "Second");
    }

    #[tokio::test]
    async fn closed_session_rejects_navigation() {
        let mut nav = HttpNavigator::new(&site()).unwrap();
        nav.close().await.unwrap();
        let err = nav.navigate("https://boston.craigslist.org/").await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
