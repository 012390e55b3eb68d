//! Review collection.
//!
//! This module holds the aggregator that folds fetched pages into a
//! single in-memory collection for the selected subject.

pub mod aggregator;

pub use aggregator::*;
