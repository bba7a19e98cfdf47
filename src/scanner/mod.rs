//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Deterministic directory walking using walkdir
//! - Round-robin shard assignment of discovered files
//! - Content fingerprinting with SHA-256
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and shard assignment
//! - [`hasher`]: SHA-256 file fingerprinting (streaming)
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::{Fingerprinter, Shard, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! // Worker 1 of 3 only sees every third file
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let fingerprinter = Fingerprinter::new();
//! for entry in walker.shard(Shard::new(1, 3)) {
//!     match entry.map(|file| fingerprinter.record(&file.path)) {
//!         Ok(Ok(record)) => println!("{} {}", record.fingerprint, record.path.display()),
//!         Ok(Err(e)) => eprintln!("Warning: {}", e),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{Fingerprint, Fingerprinter, DEFAULT_BUFFER_SIZE, FINGERPRINT_LEN};
pub use walker::{validate_root, DiscoveredFile, Shard, Walker};

/// A file path paired with its content fingerprint.
///
/// Created by the [`Fingerprinter`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path of the fingerprinted file
    pub path: PathBuf,
    /// SHA-256 fingerprint of the file content
    pub fingerprint: Fingerprint,
}

impl FileRecord {
    /// Create a new FileRecord.
    #[must_use]
    pub fn new(path: PathBuf, fingerprint: Fingerprint) -> Self {
        Self { path, fingerprint }
    }
}

/// Configuration for directory walking.
///
/// Filters are applied before a file receives its discovery index, so every
/// worker configured identically still partitions identically.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Also honour a `.gitignore` file at the root. Off by default, so a
    /// plain scan sees every regular file.
    pub respect_gitignore: bool,
}

impl WalkerConfig {
    /// Create a new configuration from CLI arguments.
    #[must_use]
    pub fn new(skip_hidden: bool, ignore_patterns: Vec<String>) -> Self {
        Self {
            skip_hidden,
            ignore_patterns,
            respect_gitignore: false,
        }
    }

    /// Enable or disable the root `.gitignore`.
    #[must_use]
    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur during file fingerprinting.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Io { path: p, .. } => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walker_config_default() {
        let config = WalkerConfig::default();

        assert!(!config.skip_hidden);
        assert!(config.ignore_patterns.is_empty());
        assert!(!config.respect_gitignore);
    }

    #[test]
    fn test_walker_config_new() {
        let config = WalkerConfig::new(true, vec!["*.tmp".to_string()]);

        assert!(config.skip_hidden);
        assert_eq!(config.ignore_patterns, vec!["*.tmp".to_string()]);
        assert!(!config.respect_gitignore);
        assert!(config.with_gitignore(true).respect_gitignore);
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::PermissionDenied(PathBuf::from("/test"));
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = ScanError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");

        let err = ScanError::NotADirectory(PathBuf::from("/file.txt"));
        assert_eq!(err.to_string(), "Not a directory: /file.txt");
    }

    #[test]
    fn test_hash_error_from_io_kinds() {
        let path = Path::new("/data/x.bin");

        let err = HashError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, HashError::NotFound(_)));
        assert_eq!(err.to_string(), "File not found: /data/x.bin");

        let err = HashError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "Permission denied: /data/x.bin");

        let err = HashError::from_io(path, io::Error::other("disk on fire"));
        assert!(matches!(err, HashError::Io { .. }));
        assert_eq!(err.path(), path);
    }
}
