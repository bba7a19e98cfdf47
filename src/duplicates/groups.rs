//! Duplicate groups and the duplicate selector.
//!
//! # Overview
//!
//! Once the coordinator owns the merged [`GlobalIndex`], every fingerprint
//! with two or more paths becomes a [`DuplicateGroup`]. Groups are read-only
//! from then on and are handed as a sequence to whatever resolves them
//! (the interactive prompt, the JSON report, ...).
//!
//! # Example
//!
//! ```
//! use dupsweep::duplicates::{select_duplicates, GlobalIndex, LocalIndex};
//! use dupsweep::scanner::{FileRecord, Fingerprint};
//! use std::path::PathBuf;
//!
//! let same = Fingerprint::from_bytes([1; 32]);
//! let other = Fingerprint::from_bytes([2; 32]);
//! let local: LocalIndex = vec![
//!     FileRecord::new(PathBuf::from("/a.txt"), same),
//!     FileRecord::new(PathBuf::from("/b.txt"), same),
//!     FileRecord::new(PathBuf::from("/c.txt"), other),
//! ]
//! .into_iter()
//! .collect();
//!
//! let groups = select_duplicates(&GlobalIndex::from_local(local));
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].len(), 2);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::GlobalIndex;
use crate::scanner::Fingerprint;

/// Two or more paths known to share one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// SHA-256 fingerprint shared by every member
    pub fingerprint: Fingerprint,
    /// Member paths; order carries no meaning
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, paths: Vec<PathBuf>) -> Self {
        Self { fingerprint, paths }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of redundant copies (total - 1 kept).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Fingerprint as hexadecimal string.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.to_hex()
    }

    /// Check whether a path is a member of this group.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// Select every fingerprint of the global index shared by two or more paths.
///
/// The order of the returned groups follows map iteration and is
/// unspecified.
#[must_use]
pub fn select_duplicates(index: &GlobalIndex) -> Vec<DuplicateGroup> {
    index
        .iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(fingerprint, paths)| {
            log::debug!("Duplicate group {}: {} files", fingerprint, paths.len());
            DuplicateGroup::new(*fingerprint, paths.clone())
        })
        .collect()
}
