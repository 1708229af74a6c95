//! Current listing layout (served to all cities).

use std::sync::LazyLock;

use regex::Regex;

use super::{PageLayout, parse_grouped_number};
use crate::navigator::Locator;

/// Count indicator text looks like `1 - 120 of 3,456`.
static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+of >*([0-9]+,*[0-9]*)").expect("static count pattern"));

/// Layout with the paginator widget and `cl-app-anchor` result links.
pub struct CurrentLayout;

impl PageLayout for CurrentLayout {
    fn name(&self) -> &str {
        "current"
    }

    fn count_locator(&self) -> Locator {
        Locator::css(r#"span[class*="cl-page-number"]"#)
    }

    fn parse_count(&self, text: &str) -> Option<u64> {
        let caps = COUNT_RE.captures(text)?;
        parse_grouped_number(&caps[1])
    }

    fn post_anchor_locator(&self) -> Locator {
        Locator::css(r#"a[class*="cl-app-anchor text-only posting-title"]"#)
    }

    fn next_control_locator(&self) -> Locator {
        Locator::css(r#"button[class*="bd-button cl-next-page icon-only"]"#)
    }
}
