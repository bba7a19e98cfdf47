//! JSON output formatter for duplicate scan results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2024-05-01T12:00:00+00:00",
//!   "duplicates": [
//!     {
//!       "fingerprint": "2cf24dba5fb0a30e...",
//!       "files": ["/data/a.txt", "/data/copy/a.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "total_files": 100,
//!     "indexed_files": 99,
//!     "skipped_files": 1,
//!     "walk_errors": 0,
//!     "unique_fingerprints": 90,
//!     "duplicate_groups": 5,
//!     "duplicate_files": 9,
//!     "workers": 4,
//!     "scan_duration_ms": 1234,
//!     "exit_code": 3,
//!     "exit_code_name": "DS003"
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::duplicates::DuplicateFinder;
//! use dupsweep::output::json::JsonOutput;
//! use dupsweep::error::ExitCode;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! let output = JsonOutput::new(&groups, &summary, ExitCode::from_summary(&summary));
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// SHA-256 fingerprint as hexadecimal string (64 characters)
    pub fingerprint: String,
    /// Absolute paths to all duplicate files
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON duplicate group from a DuplicateGroup.
    ///
    /// Paths are converted to absolute paths where possible.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            fingerprint: group.fingerprint_hex(),
            files: group.paths.iter().map(|p| normalize_path(p)).collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Regular files enumerated
    pub total_files: usize,
    /// Files fingerprinted and indexed
    pub indexed_files: usize,
    /// Files that could not be read
    pub skipped_files: usize,
    /// Directories that could not be traversed
    pub walk_errors: usize,
    /// Distinct fingerprints
    pub unique_fingerprints: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Workers used
    pub workers: usize,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            indexed_files: summary.indexed_files,
            skipped_files: summary.skipped_files,
            walk_errors: summary.walk_errors,
            unique_fingerprints: summary.unique_fingerprints,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            workers: summary.workers,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// When the report was produced (RFC 3339, UTC)
    pub generated_at: DateTime<Utc>,
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from duplicate groups, summary and exit code.
    ///
    /// # Example
    ///
    /// ```
    /// use dupsweep::duplicates::{DuplicateGroup, ScanSummary};
    /// use dupsweep::output::json::JsonOutput;
    /// use dupsweep::error::ExitCode;
    /// use dupsweep::scanner::Fingerprint;
    /// use std::path::PathBuf;
    ///
    /// let groups = vec![DuplicateGroup::new(
    ///     Fingerprint::from_bytes([0; 32]),
    ///     vec![PathBuf::from("/file1.txt"), PathBuf::from("/file2.txt")],
    /// )];
    ///
    /// let output = JsonOutput::new(&groups, &ScanSummary::default(), ExitCode::Success);
    /// assert_eq!(output.duplicates.len(), 1);
    /// ```
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            generated_at: Utc::now(),
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Normalize a path to an absolute path string.
///
/// Falls back to the path as given if it cannot be canonicalized (e.g. the
/// file was moved since the scan).
fn normalize_path(path: &std::path::Path) -> String {
    match path.canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
