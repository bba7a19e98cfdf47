//! End-to-end scans through `DuplicateFinder`.

use dupsweep::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, FinderError};
use dupsweep::progress::ProgressCallback;
use dupsweep::scanner::{Fingerprint, WalkerConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn finder(workers: usize) -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_workers(workers))
}

/// File names of each group, sorted so the result does not depend on map
/// order or on which worker found which file.
fn names(groups: &[DuplicateGroup]) -> BTreeSet<Vec<String>> {
    groups
        .iter()
        .map(|group| {
            let mut names: Vec<String> = group
                .paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        })
        .collect()
}

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

#[test]
fn test_identical_pair_is_grouped() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[("a.txt", "hello"), ("b.txt", "hello"), ("c.txt", "world")],
    );

    let (groups, summary) = finder(1).find_duplicates(dir.path()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].fingerprint,
        Fingerprint::from_hex("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
            .unwrap()
    );
    assert_eq!(
        names(&groups),
        BTreeSet::from([vec!["a.txt".to_string(), "b.txt".to_string()]])
    );
    assert!(!groups[0].contains(&dir.path().join("c.txt")));

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.indexed_files, 3);
    assert_eq!(summary.unique_fingerprints, 2);
    assert_eq!(summary.duplicate_groups, 1);
    assert_eq!(summary.duplicate_files, 1);
}

#[test]
fn test_distinct_files_yield_no_groups() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("1.txt", "one"),
            ("2.txt", "two"),
            ("3.txt", "three"),
            ("4.txt", "four"),
            ("5.txt", "five"),
        ],
    );

    for workers in [1, 3] {
        let (groups, summary) = finder(workers).find_duplicates(dir.path()).unwrap();
        assert!(groups.is_empty());
        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.unique_fingerprints, 5);
    }
}

#[test]
fn test_three_workers_find_both_pairs() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("f0.txt", "alpha"),
            ("f1.txt", "unique 1"),
            ("f2.txt", "unique 2"),
            ("sub/f3.txt", "beta"),
            ("sub/f4.txt", "unique 4"),
            ("sub/f5.txt", "alpha"),
            ("f6.txt", "unique 6"),
            ("deep/er/f7.txt", "unique 7"),
            ("deep/f8.txt", "beta"),
            ("f9.txt", "unique 9"),
        ],
    );

    let (groups, summary) = finder(3).find_duplicates(dir.path()).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(
        names(&groups),
        BTreeSet::from([
            vec!["f0.txt".to_string(), "f5.txt".to_string()],
            vec!["f3.txt".to_string(), "f8.txt".to_string()],
        ])
    );
    assert_eq!(summary.workers, 3);
    assert_eq!(summary.total_files, 10);
    assert_eq!(summary.indexed_files, 10);
}

#[test]
fn test_nested_directories_and_empty_files() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("empty1", ""),
            ("a/empty2", ""),
            ("a/b/c/data.bin", "payload"),
            ("x/data.bin", "payload"),
        ],
    );

    let (groups, _) = finder(2).find_duplicates(dir.path()).unwrap();

    assert_eq!(
        names(&groups),
        BTreeSet::from([
            vec!["data.bin".to_string(), "data.bin".to_string()],
            vec!["empty1".to_string(), "empty2".to_string()],
        ])
    );
}

#[test]
fn test_every_copy_lands_in_one_group() {
    let dir = TempDir::new().unwrap();
    for i in 0..7 {
        fs::write(dir.path().join(format!("copy{}.txt", i)), "same").unwrap();
    }

    let (groups, summary) = finder(4).find_duplicates(dir.path()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 7);
    assert_eq!(summary.duplicate_files, 6);
}

#[test]
fn test_ignore_patterns_apply_to_every_worker() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("keep1.txt", "dup"),
            ("keep2.txt", "dup"),
            ("skip.log", "dup"),
            (".hidden", "dup"),
        ],
    );

    let config = FinderConfig::default()
        .with_workers(3)
        .with_walker_config(WalkerConfig::new(true, vec!["*.log".to_string()]));
    let (groups, summary) = DuplicateFinder::new(config)
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(
        names(&groups),
        BTreeSet::from([vec!["keep1.txt".to_string(), "keep2.txt".to_string()]])
    );
}

#[test]
fn test_root_gitignore_does_not_hide_files_by_default() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[(".gitignore", "*.txt\n"), ("a.txt", "hello"), ("b.txt", "hello")],
    );

    let (groups, summary) = DuplicateFinder::new(FinderConfig::default())
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(summary.total_files, 3);
    assert_eq!(
        names(&groups),
        BTreeSet::from([vec!["a.txt".to_string(), "b.txt".to_string()]])
    );
}

#[test]
fn test_root_gitignore_applies_when_enabled() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[(".gitignore", "*.txt\n"), ("a.txt", "hello"), ("b.txt", "hello")],
    );

    let config = FinderConfig::default()
        .with_workers(2)
        .with_walker_config(WalkerConfig::default().with_gitignore(true));
    let (groups, summary) = DuplicateFinder::new(config)
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(summary.total_files, 1);
    assert!(groups.is_empty());
}

/// Deletes a file once the walker has handed it out, before it is read.
struct VanishingFile {
    name: &'static str,
    messages: Mutex<Vec<String>>,
}

impl ProgressCallback for VanishingFile {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    fn on_progress(&self, _rank: usize, path: &str) {
        if path.ends_with(self.name) {
            fs::remove_file(path).unwrap();
        }
    }

    fn on_phase_end(&self, _phase: &str) {}

    fn on_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[test]
fn test_file_removed_before_hashing_is_skipped() {
    for workers in [1, 3] {
        let dir = TempDir::new().unwrap();
        write_files(
            dir.path(),
            &[("a.txt", "same"), ("b.txt", "same"), ("gone.txt", "same")],
        );

        let callback = Arc::new(VanishingFile {
            name: "gone.txt",
            messages: Mutex::new(Vec::new()),
        });
        let config = FinderConfig::default()
            .with_workers(workers)
            .with_progress_callback(callback.clone());
        let (groups, summary) = DuplicateFinder::new(config)
            .find_duplicates(dir.path())
            .unwrap();

        assert_eq!(
            names(&groups),
            BTreeSet::from([vec!["a.txt".to_string(), "b.txt".to_string()]])
        );
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.skipped_files, 1);
        assert!(summary.has_skipped());

        let messages = callback.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Skipped"));
        assert!(messages[0].contains("gone.txt"));
    }
}

#[test]
fn test_missing_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = finder(2).find_duplicates(&dir.path().join("nope"));
    assert!(matches!(result, Err(FinderError::PathNotFound(_))));
}

#[test]
fn test_file_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file.txt");
    fs::write(&file, "x").unwrap();

    let result = finder(1).find_duplicates(&file);
    assert!(matches!(result, Err(FinderError::NotADirectory(_))));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_does_not_abort() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[("a.txt", "same"), ("b.txt", "same"), ("locked.txt", "same")],
    );
    let locked = dir.path().join("locked.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits
    if fs::read(&locked).is_ok() {
        return;
    }

    for workers in [1, 2, 3] {
        let (groups, summary) = finder(workers).find_duplicates(dir.path()).unwrap();
        assert_eq!(
            names(&groups),
            BTreeSet::from([vec!["a.txt".to_string(), "b.txt".to_string()]])
        );
        assert_eq!(summary.skipped_files, 1);
        assert!(summary.has_skipped());
    }

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}
