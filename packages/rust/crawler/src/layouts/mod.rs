//! Page-layout strategies for listing pages.
//!
//! The listing site has served more than one markup format for its search
//! results. A [`PageLayout`] bundles the structural queries traversal needs
//! for one format; [`LayoutRegistry`] picks one per target city.

mod current;
mod legacy;

use std::collections::HashSet;

use crate::navigator::Locator;

pub use current::CurrentLayout;
pub use legacy::LegacyLayout;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Structural queries for one listing-page format.
pub trait PageLayout: Send + Sync {
    /// Human-readable layout name for tracing.
    fn name(&self) -> &str;

    /// Element whose text reports the total result count.
    fn count_locator(&self) -> Locator;

    /// Pull the total result count out of the count element's text.
    fn parse_count(&self, text: &str) -> Option<u64>;

    /// Anchors linking to item pages.
    fn post_anchor_locator(&self) -> Locator;

    /// Control that advances to the next results page.
    fn next_control_locator(&self) -> Locator;
}

/// Parse a count like `1,234` into a number.
pub(crate) fn parse_grouped_number(raw: &str) -> Option<u64> {
    raw.trim().replace(',', "").parse().ok()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Selects a layout per target city.
pub struct LayoutRegistry {
    legacy_cities: HashSet<String>,
    current: CurrentLayout,
    legacy: LegacyLayout,
}

impl LayoutRegistry {
    /// Create a registry routing `legacy_cities` to the legacy layout.
    pub fn new<I, S>(legacy_cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legacy_cities: legacy_cities.into_iter().map(Into::into).collect(),
            current: CurrentLayout,
            legacy: LegacyLayout,
        }
    }

    /// Layout to use for `city`.
    pub fn for_city(&self, city: &str) -> &dyn PageLayout {
        if self.legacy_cities.contains(city) {
            &self.legacy
        } else {
            &self.current
        }
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}
