//! Fingerprint indexes and per-shard aggregation.
//!
//! # Overview
//!
//! A [`LocalIndex`] maps each fingerprint to the paths one worker found for
//! it. It is built by [`aggregate_shard`] from the worker's own files only and
//! is never visible to other workers.
//!
//! A [`GlobalIndex`] has the same shape but is owned by the coordinator once
//! every worker's local index has been merged into it.
//!
//! # Example
//!
//! ```
//! use dupsweep::duplicates::{GlobalIndex, LocalIndex};
//! use dupsweep::scanner::{FileRecord, Fingerprint};
//! use std::path::PathBuf;
//!
//! let fp = Fingerprint::from_bytes([7; 32]);
//! let mut local = LocalIndex::new();
//! local.insert(FileRecord::new(PathBuf::from("/a"), fp));
//! local.insert(FileRecord::new(PathBuf::from("/b"), fp));
//!
//! let global = GlobalIndex::from_local(local);
//! assert_eq!(global.get(&fp).unwrap().len(), 2);
//! ```

use std::collections::hash_map::{self, HashMap};
use std::path::PathBuf;

use crate::progress::ProgressCallback;
use crate::scanner::{DiscoveredFile, FileRecord, Fingerprint, Fingerprinter, ScanError};

/// Fingerprint → paths mapping built by one worker from its own shard.
///
/// Within a path list, order is the worker's discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIndex {
    entries: HashMap<Fingerprint, Vec<PathBuf>>,
}

impl LocalIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to its fingerprint's path list.
    pub fn insert(&mut self, record: FileRecord) {
        self.entries
            .entry(record.fingerprint)
            .or_default()
            .push(record.path);
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no fingerprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of paths across all fingerprints.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Paths recorded for a fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[PathBuf]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Iterate over `(fingerprint, paths)` entries in map order.
    pub fn iter(&self) -> hash_map::Iter<'_, Fingerprint, Vec<PathBuf>> {
        self.entries.iter()
    }
}

impl FromIterator<FileRecord> for LocalIndex {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(records: I) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }
}

/// Fingerprint → paths mapping owned by the coordinator after the merge.
///
/// For a fingerprint reported by several workers, the path list is the union
/// of their contributions. Contributions are appended in rank order but
/// callers should treat each list as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalIndex {
    entries: HashMap<Fingerprint, Vec<PathBuf>>,
}

impl GlobalIndex {
    /// Seed the global index with the coordinator's own local index.
    #[must_use]
    pub fn from_local(local: LocalIndex) -> Self {
        Self {
            entries: local.entries,
        }
    }

    /// Append paths received for a fingerprint.
    pub fn append(&mut self, fingerprint: Fingerprint, paths: Vec<PathBuf>) {
        match self.entries.entry(fingerprint) {
            hash_map::Entry::Occupied(mut e) => e.get_mut().extend(paths),
            hash_map::Entry::Vacant(e) => {
                e.insert(paths);
            }
        }
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no fingerprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of paths across all fingerprints.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Paths recorded for a fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[PathBuf]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Iterate over `(fingerprint, paths)` entries in map order.
    pub fn iter(&self) -> hash_map::Iter<'_, Fingerprint, Vec<PathBuf>> {
        self.entries.iter()
    }
}

/// Statistics from aggregating one shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Rank of the worker that produced these stats
    pub rank: usize,
    /// Files assigned to this shard
    pub assigned_files: usize,
    /// Files fingerprinted successfully
    pub fingerprinted_files: usize,
    /// Files skipped because they could not be read
    pub failed_files: usize,
    /// Traversal errors observed (directories that could not be read, etc.)
    pub walk_errors: usize,
}

/// Fingerprint every file of a shard into a fresh [`LocalIndex`].
///
/// Files whose fingerprint cannot be computed are logged and left out; they
/// are not retried. Traversal errors are logged and counted.
pub fn aggregate_shard<I>(
    rank: usize,
    files: I,
    fingerprinter: &Fingerprinter,
    progress: Option<&dyn ProgressCallback>,
) -> (LocalIndex, ShardStats)
where
    I: IntoIterator<Item = Result<DiscoveredFile, ScanError>>,
{
    let mut index = LocalIndex::new();
    let mut stats = ShardStats {
        rank,
        ..Default::default()
    };

    for entry in files {
        let file = match entry {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Shard {}: {}", rank, e);
                stats.walk_errors += 1;
                continue;
            }
        };

        stats.assigned_files += 1;
        if let Some(callback) = progress {
            callback.on_progress(rank, file.path.to_string_lossy().as_ref());
        }

        match fingerprinter.record(&file.path) {
            Ok(record) => {
                log::trace!("Shard {}: {} {}", rank, record.fingerprint, file.path.display());
                stats.fingerprinted_files += 1;
                index.insert(record);
            }
            Err(e) => {
                log::warn!("Skipping unreadable file: {}", e);
                if let Some(callback) = progress {
                    callback.on_message(&format!("Skipped {}", e.path().display()));
                }
                stats.failed_files += 1;
            }
        }
    }

    log::debug!(
        "Shard {} aggregated: {} files, {} fingerprints, {} skipped",
        rank,
        stats.assigned_files,
        index.len(),
        stats.failed_files
    );

    (index, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Shard, Walker, WalkerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; 32])
    }

    fn record(path: &str, byte: u8) -> FileRecord {
        FileRecord::new(PathBuf::from(path), fp(byte))
    }

    #[test]
    fn test_local_index_appends_in_order() {
        let mut index = LocalIndex::new();
        index.insert(record("/x/1", 1));
        index.insert(record("/x/2", 2));
        index.insert(record("/x/3", 1));

        assert_eq!(index.len(), 2);
        assert_eq!(index.file_count(), 3);
        assert_eq!(
            index.get(&fp(1)).unwrap(),
            &[PathBuf::from("/x/1"), PathBuf::from("/x/3")]
        );
        assert!(index.get(&fp(9)).is_none());
    }

    #[test]
    fn test_local_index_from_iter() {
        let index: LocalIndex = vec![record("/a", 1), record("/b", 1)].into_iter().collect();
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_global_index_append_extends_existing() {
        let local: LocalIndex = vec![record("/rank0/a", 1)].into_iter().collect();
        let mut global = GlobalIndex::from_local(local);

        global.append(fp(1), vec![PathBuf::from("/rank1/a")]);
        global.append(fp(2), vec![PathBuf::from("/rank1/b")]);

        assert_eq!(global.len(), 2);
        assert_eq!(global.file_count(), 3);
        assert_eq!(
            global.get(&fp(1)).unwrap(),
            &[PathBuf::from("/rank0/a"), PathBuf::from("/rank1/a")]
        );
    }

    #[test]
    fn test_aggregate_shard_groups_identical_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        fs::write(dir.path().join("c.txt"), b"world").unwrap();

        let walker = Walker::new(dir.path(), WalkerConfig::default());
        let (index, stats) =
            aggregate_shard(0, walker.shard(Shard::whole()), &Fingerprinter::new(), None);

        assert_eq!(stats.assigned_files, 3);
        assert_eq!(stats.fingerprinted_files, 3);
        assert_eq!(stats.failed_files, 0);
        assert_eq!(index.len(), 2);
        assert_eq!(index.file_count(), 3);
    }

    #[test]
    fn test_aggregate_shard_skips_vanished_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let files = vec![
            Ok(DiscoveredFile {
                index: 0,
                path: dir.path().join("a.txt"),
            }),
            Ok(DiscoveredFile {
                index: 1,
                path: dir.path().join("gone.txt"),
            }),
            Err(ScanError::PermissionDenied(dir.path().join("locked"))),
        ];

        let (index, stats) = aggregate_shard(2, files, &Fingerprinter::new(), None);

        assert_eq!(stats.rank, 2);
        assert_eq!(stats.assigned_files, 2);
        assert_eq!(stats.fingerprinted_files, 1);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.walk_errors, 1);
        assert_eq!(index.file_count(), 1);
    }
}
