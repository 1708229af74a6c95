//! Persisted pipeline artifacts.
//!
//! - [`batcher`]: partitions discovered links into manifests with
//!   deterministic keys
//! - [`output`]: aggregates extracted records into one published CSV

pub mod batcher;
pub mod output;

pub use batcher::{LinkBatch, dedup_cities, manifest_key, partition, read_manifest, write_manifests};
pub use output::{Aggregator, PublishOutcome, output_key, render_csv};

/// Day component of manifest and output keys.
pub const DAY_FORMAT: &str = "%Y_%m_%d";

/// Hour component of manifest and output keys.
pub const HOUR_FORMAT: &str = "%H";
