//! Moving duplicates out of the scanned tree.
//!
//! # Overview
//!
//! Once a copy has been chosen in a [`DuplicateGroup`], every other member is
//! moved into the destination directory:
//! - The destination is created if it does not exist
//! - An existing file is never overwritten; a numeric suffix is appended
//!   instead (`report.txt`, `report-1.txt`, `report-2.txt`, ...)
//! - Moves across filesystems fall back to copy and remove
//! - A failed move is logged and the batch continues
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::actions::relocate::relocate_file;
//! use std::path::Path;
//!
//! match relocate_file(Path::new("/data/copy.txt"), Path::new("/data/dupes")) {
//!     Ok(moved) => println!("Moved to {}", moved.to.display()),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::DuplicateGroup;

/// Error type for relocation.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Source file was not found (may have been moved or deleted).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied on the source or the destination.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination exists but is not a directory.
    #[error("destination is not a directory: {0}")]
    DestinationNotDirectory(PathBuf),

    /// The source path has no file name component.
    #[error("path has no file name: {0}")]
    NoFileName(PathBuf),

    /// The selected copy is not a member of the group.
    #[error("choice {choice} is out of range for a group of {len} files")]
    InvalidChoice {
        /// Zero-based index that was requested
        choice: usize,
        /// Number of files in the group
        len: usize,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl RelocateError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// A file that was moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Original location.
    pub from: PathBuf,
    /// New location inside the destination.
    pub to: PathBuf,
}

/// Results of relocating several files.
#[derive(Debug, Clone, Default)]
pub struct BatchRelocateResult {
    /// Files moved successfully.
    pub moved: Vec<Relocation>,
    /// Files that could not be moved, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchRelocateResult {
    /// Number of files moved.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.moved.len()
    }

    /// Number of files left in place because of an error.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if every move succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another batch into this one.
    pub fn extend(&mut self, other: BatchRelocateResult) {
        self.moved.extend(other.moved);
        self.failures.extend(other.failures);
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Moved {} file(s)", self.success_count())
        } else {
            format!(
                "Moved {} file(s), {} failed",
                self.success_count(),
                self.failure_count()
            )
        }
    }
}

/// Create the destination directory if needed.
///
/// # Errors
///
/// Fails if the path exists and is not a directory, or cannot be created.
pub fn ensure_destination(destination: &Path) -> Result<(), RelocateError> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RelocateError::DestinationNotDirectory(
            destination.to_path_buf(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Creating destination {}", destination.display());
            fs::create_dir_all(destination).map_err(|e| RelocateError::from_io(destination, e))
        }
        Err(e) => Err(RelocateError::from_io(destination, e)),
    }
}

/// Names tried for `file_name` inside `destination`, in order: the name
/// itself, then `stem-1.ext`, `stem-2.ext`, ...
fn candidates<'a>(
    destination: &'a Path,
    file_name: &'a std::ffi::OsStr,
) -> impl Iterator<Item = PathBuf> + 'a {
    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map_or_else(|| file_name.to_os_string(), |s| s.to_os_string());
    let extension = as_path.extension();

    std::iter::once(destination.join(file_name)).chain((1u64..).map(move |n| {
        let mut name = OsString::from(&stem);
        name.push(format!("-{}", n));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }
        destination.join(name)
    }))
}

/// First path inside `destination` named after `file_name` that is free.
///
/// The answer can be stale by the time it is used; [`relocate_file`]
/// reserves its target with [`reserve_target`] instead.
#[must_use]
pub fn unique_target(destination: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
    candidates(destination, file_name)
        .find(|p| !exists(p))
        .unwrap_or_else(|| destination.join(file_name))
}

/// Claim the first free name for `file_name` inside `destination` by
/// creating an empty file there.
///
/// Creation uses `create_new`, so a name taken by anyone else in the
/// meantime is skipped rather than reused.
///
/// # Errors
///
/// Fails if the destination refuses new files.
pub fn reserve_target(
    destination: &Path,
    file_name: &std::ffi::OsStr,
) -> Result<PathBuf, RelocateError> {
    for candidate in candidates(destination, file_name) {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(RelocateError::from_io(&candidate, e)),
        }
    }
    Err(RelocateError::from_io(
        destination,
        io::Error::new(io::ErrorKind::AlreadyExists, "no free name left"),
    ))
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move one file into `destination`, which must already exist.
///
/// # Errors
///
/// Fails if the source is missing or the move is refused.
pub fn relocate_file(path: &Path, destination: &Path) -> Result<Relocation, RelocateError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| RelocateError::NoFileName(path.to_path_buf()))?;

    fs::symlink_metadata(path).map_err(|e| RelocateError::from_io(path, e))?;

    // The placeholder is ours, so replacing it clobbers nothing
    let target = reserve_target(destination, file_name)?;
    match fs::rename(path, &target) {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            log::debug!(
                "{} is on another filesystem, copying instead",
                target.display()
            );
            if let Err(e) = fs::copy(path, &target) {
                let _ = fs::remove_file(&target);
                return Err(RelocateError::from_io(path, e));
            }
            if let Err(e) = fs::remove_file(path) {
                // Leave the original in place rather than keep two copies
                let _ = fs::remove_file(&target);
                return Err(RelocateError::from_io(path, e));
            }
        }
        Err(e) => {
            let _ = fs::remove_file(&target);
            return Err(RelocateError::from_io(path, e));
        }
    }

    log::info!("Moved {} to {}", path.display(), target.display());
    Ok(Relocation {
        from: path.to_path_buf(),
        to: target,
    })
}

#[cfg(unix)]
fn is_cross_device(error: &io::Error) -> bool {
    // EXDEV
    error.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(error: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    error.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_error: &io::Error) -> bool {
    false
}

/// Move every path into `destination`, continuing past failures.
///
/// The destination is created if absent. If it cannot be created every path
/// is reported as failed.
#[must_use]
pub fn relocate_batch(paths: &[PathBuf], destination: &Path) -> BatchRelocateResult {
    let mut result = BatchRelocateResult::default();

    if let Err(e) = ensure_destination(destination) {
        log::error!("{}", e);
        let message = e.to_string();
        result.failures = paths.iter().map(|p| (p.clone(), message.clone())).collect();
        return result;
    }

    for path in paths {
        match relocate_file(path, destination) {
            Ok(moved) => result.moved.push(moved),
            Err(e) => {
                log::warn!("Could not move {}: {}", path.display(), e);
                result.failures.push((path.clone(), e.to_string()));
            }
        }
    }

    log::debug!("{}", result.summary());
    result
}

/// Keep member `keep` (zero-based) of a group and move all the others.
///
/// # Errors
///
/// Returns [`RelocateError::InvalidChoice`] if `keep` is not a member index;
/// nothing is moved in that case.
pub fn relocate_group(
    group: &DuplicateGroup,
    keep: usize,
    destination: &Path,
) -> Result<BatchRelocateResult, RelocateError> {
    if keep >= group.len() {
        return Err(RelocateError::InvalidChoice {
            choice: keep,
            len: group.len(),
        });
    }

    let others: Vec<PathBuf> = group
        .paths
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != keep)
        .map(|(_, p)| p.clone())
        .collect();

    log::debug!(
        "Keeping {}, moving {} copies",
        group.paths[keep].display(),
        others.len()
    );
    Ok(relocate_batch(&others, destination))
}
