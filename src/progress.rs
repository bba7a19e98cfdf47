//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display progress in the terminal while a scan runs.
//!
//! Two phases are reported:
//! - `"fingerprint"`: a spinner counting files fingerprinted by all workers
//! - `"merge"`: a bar over the fingerprint entries the coordinator gathers
//!
//! Callbacks arrive concurrently from every worker thread.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name used while workers fingerprint their shards.
pub const PHASE_FINGERPRINT: &str = "fingerprint";

/// Phase name used while the coordinator merges worker indices.
pub const PHASE_MERGE: &str = "merge";

/// Progress callback for the phases of a sharded scan.
///
/// Implementations must be thread-safe: every worker reports through the same
/// callback.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (`"fingerprint"`, `"merge"`)
    /// * `total` - Number of items to process, 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `rank` - Worker that processed the item
    /// * `path` - Path being processed, empty when not applicable
    fn on_progress(&self, rank: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    fingerprint: Mutex<Option<ProgressBar>>,
    merge: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupsweep::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            fingerprint: Mutex::new(None),
            merge: Mutex::new(None),
            quiet,
        }
    }

    /// Check whether drawing is suppressed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn fingerprint_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn merge_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn slot(&self, phase: &str) -> Option<&Mutex<Option<ProgressBar>>> {
        match phase {
            PHASE_FINGERPRINT => Some(&self.fingerprint),
            PHASE_MERGE => Some(&self.merge),
            _ => None,
        }
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        for slot in [&self.merge, &self.fingerprint] {
            if let Ok(guard) = slot.lock() {
                if let Some(pb) = guard.as_ref() {
                    return Some(pb.clone());
                }
            }
        }
        None
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = match phase {
            PHASE_FINGERPRINT => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::fingerprint_style());
                pb.set_message("Fingerprinting");
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
            _ => {
                // Every shard is fingerprinted before the first entry is merged
                if phase == PHASE_MERGE {
                    self.on_phase_end(PHASE_FINGERPRINT);
                }
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::merge_style());
                pb.set_message(if phase == PHASE_MERGE {
                    "Merging".to_string()
                } else {
                    phase.to_string()
                });
                pb
            }
        };

        if let Some(Ok(mut guard)) = self.slot(phase).map(Mutex::lock) {
            *guard = Some(pb);
        }
    }

    fn on_progress(&self, rank: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.active_bar() {
            pb.inc(1);
            if !path.is_empty() {
                pb.set_message(format!("[{}] {}", rank, truncate_path(path, 30)));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let Some(Ok(mut guard)) = self.slot(phase).map(Mutex::lock) else {
            return;
        };
        if let Some(pb) = guard.take() {
            match phase {
                PHASE_FINGERPRINT => pb.finish_with_message("Fingerprinting complete"),
                _ => pb.finish_with_message("Merge complete"),
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.active_bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path_unchanged() {
        assert_eq!(truncate_path("/a/b.txt", 30), "/a/b.txt");
    }

    #[test]
    fn test_truncate_keeps_file_name() {
        let long = "/very/long/directory/structure/that/goes/on/file.txt";
        assert_eq!(truncate_path(long, 30), ".../file.txt");
    }

    #[test]
    fn test_truncate_long_file_name() {
        let name = format!("/dir/{}", "x".repeat(50));
        let out = truncate_path(&name, 30);
        assert!(out.starts_with("..."));
        assert_eq!(out.chars().count(), 30);
    }

    #[test]
    fn test_truncate_multibyte_name() {
        let name = format!("/dir/{}", "é".repeat(40));
        let out = truncate_path(&name, 30);
        assert_eq!(out.chars().count(), 30);
    }

    #[test]
    fn test_quiet_progress_ignores_callbacks() {
        let progress = Progress::new(true);
        assert!(progress.is_quiet());
        progress.on_phase_start(PHASE_FINGERPRINT, 0);
        progress.on_progress(1, "/x");
        progress.on_message("hello");
        progress.on_phase_end(PHASE_FINGERPRINT);
        assert!(progress.active_bar().is_none());
    }

    #[test]
    fn test_phase_lifecycle() {
        let progress = Progress::new(false);
        progress.on_phase_start(PHASE_MERGE, 3);
        progress.on_progress(1, "");
        progress.on_progress(2, "");
        assert_eq!(progress.active_bar().map(|pb| pb.position()), Some(2));

        progress.on_phase_end(PHASE_MERGE);
        assert!(progress.active_bar().is_none());
    }
}
