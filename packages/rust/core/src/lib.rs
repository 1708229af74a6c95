//! Core pipeline orchestration for listharvest.
//!
//! This crate ties together traversal, batching, extraction, and output
//! aggregation into the two invocations: [`pipeline::discover`] and
//! [`pipeline::extract`].

pub mod pipeline;

pub use pipeline::{
    DiscoveryEvent, DiscoveryResult, ExtractionEvent, ExtractionResponse, ExtractionResult,
    ProgressReporter, SilentProgress, discover, extract,
};
