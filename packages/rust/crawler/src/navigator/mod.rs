//! Structured document query capability.
//!
//! Traversal and extraction talk to pages only through [`Navigator`]:
//! navigate, query elements by [`Locator`], wait for a [`Condition`], and
//! activate controls. Backends decide how a page is obtained; the built-in
//! ones fetch over HTTP ([`HttpNavigator`]) or serve pre-loaded markup
//! ([`MemoryNavigator`]).

mod http;
mod memory;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::trace;
use url::Url;

use listharvest_shared::{HarvestError, Result};

pub use http::HttpNavigator;
pub use memory::MemoryNavigator;

/// Attributes holding URLs, resolved against the page URL on capture.
const URL_ATTRIBUTES: [&str; 4] = ["href", "src", "data-href", "formaction"];

/// Attributes a control can carry its activation target in, by priority.
const LINK_TARGET_ATTRIBUTES: [&str; 3] = ["href", "data-href", "formaction"];

/// Elements whose boundaries start a new rendered line.
const BLOCK_ELEMENTS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "ol", "p", "section",
    "table", "tr",
];

/// Elements whose content is never rendered.
const HIDDEN_ELEMENTS: [&str; 3] = ["script", "style", "template"];

// ---------------------------------------------------------------------------
// Locator / Condition / Element
// ---------------------------------------------------------------------------

/// How to find elements on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector.
    Css(String),
    /// Anchors whose text contains the given fragment.
    LinkText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn link_text(fragment: impl Into<String>) -> Self {
        Self::LinkText(fragment.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css `{selector}`"),
            Self::LinkText(text) => write!(f, "link text `{text}`"),
        }
    }
}

/// Predicate a bounded wait polls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Any matching element exists.
    Present,
    /// A matching element has non-empty text.
    HasText,
    /// A matching element is enabled and carries a link target.
    Clickable,
}

impl Condition {
    fn holds(self, element: &Element) -> bool {
        match self {
            Self::Present => true,
            Self::HasText => !element.text().is_empty(),
            Self::Clickable => {
                element.attribute("disabled").is_none() && element.link_target().is_some()
            }
        }
    }
}

/// Owned snapshot of one element: rendered text plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    text: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(text: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    fn capture(el: ElementRef<'_>, base: Option<&Url>) -> Self {
        let text = rendered_text(el);
        let attributes = el
            .value()
            .attrs()
            .map(|(name, value)| {
                let value = match base {
                    Some(base) if URL_ATTRIBUTES.contains(&name) => base
                        .join(value)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| value.to_string()),
                    _ => value.to_string(),
                };
                (name.to_string(), value)
            })
            .collect();

        Self { text, attributes }
    }

    /// Rendered text content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value; URL attributes are already absolute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// URL that activating this element leads to.
    pub fn link_target(&self) -> Option<&str> {
        LINK_TARGET_ATTRIBUTES
            .iter()
            .find_map(|name| self.attribute(name))
            .filter(|target| !target.is_empty() && !target.starts_with("javascript:"))
    }
}

/// Text as a browser lays it out: `<br>` and block boundaries break lines,
/// whitespace runs inside a line collapse to one space, blank lines drop.
fn rendered_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_rendered(el, &mut raw);

    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            }
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            Node::Element(e) if HIDDEN_ELEMENTS.contains(&e.name()) => {}
            Node::Element(e) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&e.name());
                if block {
                    out.push('\n');
                }
                push_rendered(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// A page session: one current document at a time.
///
/// Sessions are exclusively owned by one invocation and must be released
/// with [`Navigator::close`].
#[async_trait]
pub trait Navigator: Send {
    /// Load `url` as the current document.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Re-load the current document.
    async fn reload(&mut self) -> Result<()>;

    /// URL of the current document, if any.
    fn current_url(&self) -> Option<&str>;

    /// Markup of the current document, if any.
    fn document(&self) -> Option<&str>;

    /// Release the session. Further calls fail.
    async fn close(&mut self) -> Result<()>;

    /// Poll interval used by [`Navigator::wait_until`].
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(500)
    }

    /// All elements matching `locator`, in document order.
    fn find_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        let Some(html) = self.document() else {
            return Err(HarvestError::navigation("<none>", "no document loaded"));
        };
        let base = self.current_url().and_then(|u| Url::parse(u).ok());
        query(html, base.as_ref(), locator)
    }

    /// First element matching `locator`.
    fn find(&self, locator: &Locator) -> Result<Option<Element>> {
        Ok(self.find_all(locator)?.into_iter().next())
    }

    /// Wait until an element matching `locator` satisfies `condition`.
    ///
    /// Checks the current document first, then reloads and re-checks every
    /// poll interval until `timeout` has elapsed.
    async fn wait_until(
        &mut self,
        locator: &Locator,
        condition: Condition,
        timeout: Duration,
    ) -> Result<Element> {
        let start = Instant::now();
        loop {
            if let Some(element) = self
                .find_all(locator)?
                .into_iter()
                .find(|e| condition.holds(e))
            {
                return Ok(element);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(HarvestError::Timeout {
                    what: format!("{locator} to be {condition:?}"),
                    after: timeout,
                });
            }

            trace!(%locator, ?condition, "condition not met, polling");
            tokio::time::sleep(self.poll_interval().min(timeout - elapsed)).await;
            self.reload().await?;
        }
    }

    /// Click-equivalent: follow the first matching control's link target.
    async fn activate(&mut self, control: &Locator) -> Result<()> {
        let element = self
            .find(control)?
            .ok_or_else(|| HarvestError::ElementMissing {
                locator: control.to_string(),
            })?;

        let target = element
            .link_target()
            .ok_or_else(|| HarvestError::ElementMissing {
                locator: format!("{control} link target"),
            })?
            .to_string();

        self.navigate(&target).await
    }
}

// ---------------------------------------------------------------------------
// Query evaluation
// ---------------------------------------------------------------------------

/// Evaluate `locator` against `html`, resolving URL attributes against `base`.
pub fn query(html: &str, base: Option<&Url>, locator: &Locator) -> Result<Vec<Element>> {
    let doc = Html::parse_document(html);

    let elements = match locator {
        Locator::Css(selector) => {
            let sel = Selector::parse(selector)
                .map_err(|e| HarvestError::parse(format!("bad selector `{selector}`: {e}")))?;
            doc.select(&sel)
                .map(|el| Element::capture(el, base))
                .collect()
        }
        Locator::LinkText(fragment) => {
            let sel = Selector::parse("a").map_err(|e| HarvestError::parse(e.to_string()))?;
            doc.select(&sel)
                .map(|el| Element::capture(el, base))
                .filter(|e| e.text().contains(fragment.as_str()))
                .collect()
        }
    };

    Ok(elements)
}
