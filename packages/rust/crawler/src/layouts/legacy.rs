//! Legacy listing layout, formerly served to a handful of cities.

use super::{PageLayout, parse_grouped_number};
use crate::navigator::Locator;

/// Layout with a bare `totalcount` span and `hdrlnk` result links.
pub struct LegacyLayout;

impl PageLayout for LegacyLayout {
    fn name(&self) -> &str {
        "legacy"
    }

    fn count_locator(&self) -> Locator {
        Locator::css(r#"span[class*="totalcount"]"#)
    }

    fn parse_count(&self, text: &str) -> Option<u64> {
        parse_grouped_number(text)
    }

    fn post_anchor_locator(&self) -> Locator {
        Locator::css(r#"a[class*="result-title hdrlnk"]"#)
    }

    fn next_control_locator(&self) -> Locator {
        Locator::link_text("next")
    }
}
