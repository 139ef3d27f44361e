//! Shared test utilities for lookforge integration tests.
//!
//! - `TestHarness` owns a temporary sessions root and builds pipelines
//! - `MockGenerator` stands in for the image API
//! - builders for upload payloads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
