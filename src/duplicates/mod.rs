//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Per-worker aggregation of fingerprints ([`index`])
//! - Duplicate group selection ([`groups`])
//! - Orchestration of a sharded scan ([`finder`])

pub mod finder;
pub mod groups;
pub mod index;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{select_duplicates, DuplicateGroup};
pub use index::{aggregate_shard, GlobalIndex, LocalIndex, ShardStats};
