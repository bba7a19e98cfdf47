//! Directory walker and shard partitioner.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory tree
//! and numbering every regular file in discovery order. A [`Shard`] then keeps
//! the files whose index satisfies `index % size == rank`.
//!
//! There is no shared listing between workers: each worker performs the same
//! full traversal and discards what it does not own. Traversal is therefore
//! single-threaded and sorted by file name, which makes the discovery order
//! (and so the assignment) identical on every worker for a fixed tree.
//!
//! # Features
//!
//! - Sorted, single-threaded traversal via walkdir
//! - Symlinks and special files are never yielded and never numbered
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Hidden file filtering
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::{Shard, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! for entry in walker.shard(Shard::new(0, 4)) {
//!     match entry {
//!         Ok(file) => println!("#{} {}", file.index, file.path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::{DirEntry, WalkDir};

use super::{ScanError, WalkerConfig};

/// Position of one worker within a run of `size` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shard {
    /// Zero-based worker rank (0 is the coordinator)
    pub rank: usize,
    /// Total number of workers (at least 1)
    pub size: usize,
}

impl Shard {
    /// Create a shard descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or `rank >= size`.
    #[must_use]
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(size > 0, "worker count must be at least 1");
        assert!(rank < size, "rank {rank} out of range for {size} workers");
        Self { rank, size }
    }

    /// The single shard of a non-distributed scan.
    #[must_use]
    pub fn whole() -> Self {
        Self { rank: 0, size: 1 }
    }

    /// Whether the file with this discovery index belongs to this shard.
    #[must_use]
    pub fn owns(&self, index: usize) -> bool {
        assign(index, self.size) == self.rank
    }

    /// Whether this shard is the coordinator.
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

/// Rank responsible for the file with the given discovery index.
#[must_use]
pub fn assign(index: usize, size: usize) -> usize {
    index % size.max(1)
}

/// A regular file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Zero-based position among all regular files of the traversal
    pub index: usize,
    /// Path to the file
    pub path: PathBuf,
}

/// Check that a scan root exists and is a directory.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`], [`ScanError::NotADirectory`] or
/// [`ScanError::Io`] when the root is unusable.
pub fn validate_root(path: &Path) -> Result<(), ScanError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ScanError::NotFound(path.to_path_buf()))
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(ScanError::PermissionDenied(path.to_path_buf()))
        }
        Err(e) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Deterministic directory walker.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory of this walker.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and, when enabled, the
    /// root `.gitignore` file.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if self.config.respect_gitignore && gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Decide whether traversal should descend into / yield this entry.
    fn keep_entry(&self, entry: &DirEntry, gitignore: Option<&Gitignore>) -> bool {
        // The root itself is never filtered, even if its name starts with '.'
        if entry.depth() == 0 {
            return true;
        }

        if self.config.skip_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            log::trace!("Skipping hidden entry: {}", entry.path().display());
            return false;
        }

        if let Some(gi) = gitignore {
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if gi
                .matched(relative, entry.file_type().is_dir())
                .is_ignore()
            {
                log::trace!("Ignoring: {}", entry.path().display());
                return false;
            }
        }

        true
    }

    /// Walk the directory tree, yielding every regular file with its
    /// discovery index.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration; they do not consume an index.
    pub fn walk(&self) -> impl Iterator<Item = Result<DiscoveredFile, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let mut next_index = 0usize;

        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| self.keep_entry(entry, gitignore.as_ref()))
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    // Directories, symlinks, sockets, fifos and devices are skipped
                    if !entry.file_type().is_file() {
                        if entry.file_type().is_symlink() {
                            log::trace!("Skipping symlink: {}", entry.path().display());
                        }
                        return None;
                    }

                    let index = next_index;
                    next_index += 1;
                    Some(Ok(DiscoveredFile {
                        index,
                        path: entry.into_path(),
                    }))
                }
                Err(e) => Some(Err(self.handle_walk_error(e))),
            })
    }

    /// Walk the tree and keep only the files owned by `shard`.
    pub fn shard(
        &self,
        shard: Shard,
    ) -> impl Iterator<Item = Result<DiscoveredFile, ScanError>> + '_ {
        self.walk().filter(move |entry| match entry {
            Ok(file) => shard.owns(file.index),
            // Every worker sees the same traversal errors; report them once
            Err(_) => shard.is_coordinator(),
        })
    }

    /// Convert a walkdir error into a [`ScanError`].
    fn handle_walk_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        let kind = error.io_error().map(io::Error::kind);
        match kind {
            Some(io::ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(io::ErrorKind::NotFound) => {
                log::debug!("Path vanished during walk: {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                let source = error
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                ScanError::Io { path, source }
            }
        }
    }
}
