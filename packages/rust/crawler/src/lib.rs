//! Page navigation, listing traversal, and item extraction.
//!
//! This crate provides:
//! - [`navigator`]: the [`Navigator`] page-session capability and its HTTP
//!   and in-memory backends
//! - [`layouts`]: per-layout locators for listing pages ([`LayoutRegistry`])
//! - [`traversal`]: paginated link discovery for one target
//! - [`extractor`]: per-item field extraction with failure isolation
//! - [`media`]: media download and upload to the data bucket

pub mod extractor;
pub mod layouts;
pub mod media;
pub mod navigator;
pub mod traversal;

pub use extractor::{
    ExtractionReport, FigureKind, ItemExtractor, ItemFailure, classify_figure, discover_media,
    extract_text_data,
};
pub use layouts::{CurrentLayout, LayoutRegistry, LegacyLayout, PageLayout};
pub use media::{MediaFetcher, MediaOutcome, MediaUploader, media_key};
pub use navigator::{Condition, Element, HttpNavigator, Locator, MemoryNavigator, Navigator};
pub use traversal::{PageCount, PageCursor, TargetLinks, traverse_target};
