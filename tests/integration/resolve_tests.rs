//! Full scan-and-resolve runs with scripted operator input.

use dupsweep::cli::{OutputFormat, ScanArgs};
use dupsweep::error::ExitCode;
use dupsweep::resolve::Resolver;
use dupsweep::run_scan;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn scan_args(path: Option<&Path>, destination: Option<&Path>, output: OutputFormat) -> ScanArgs {
    ScanArgs {
        path: path.map(Path::to_path_buf),
        destination: destination.map(Path::to_path_buf),
        workers: Some(2),
        buffer_size: None,
        output,
        skip_hidden: false,
        ignore_patterns: Vec::new(),
        gitignore: false,
        config: None,
    }
}

/// Run an interactive scan answering from `input`; returns the exit code
/// and everything written to the terminal.
fn run_interactive(args: ScanArgs, input: &str) -> (ExitCode, String) {
    yansi::disable();
    let mut output = Vec::new();
    let resolver = Resolver::new(Cursor::new(input.as_bytes()), &mut output);
    let code = run_scan(args, true, resolver).unwrap();
    (code, String::from_utf8(output).unwrap())
}

fn dup_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "hello").unwrap();
    fs::write(dir.path().join("b.txt"), "hello").unwrap();
    fs::write(dir.path().join("c.txt"), "world").unwrap();
    dir
}

#[test]
fn test_keep_first_moves_the_rest() {
    let root = dup_tree();
    let dest = TempDir::new().unwrap();
    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);

    let (code, output) = run_interactive(args, "1\n");

    assert_eq!(code, ExitCode::Success);
    assert!(output.contains("Keep which file? (1-2, 0 to skip): "));
    assert!(root.path().join("a.txt").exists());
    assert!(!root.path().join("b.txt").exists());
    assert!(root.path().join("c.txt").exists());
    assert_eq!(fs::read_to_string(dest.path().join("b.txt")).unwrap(), "hello");
}

#[test]
fn test_zero_skips_the_group() {
    let root = dup_tree();
    let dest = TempDir::new().unwrap();
    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);

    run_interactive(args, "0\n");

    assert!(root.path().join("a.txt").exists());
    assert!(root.path().join("b.txt").exists());
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[test]
fn test_invalid_answer_is_asked_again() {
    let root = dup_tree();
    let dest = TempDir::new().unwrap();
    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);

    let (_, output) = run_interactive(args, "7\nabc\n2\n");

    assert_eq!(output.matches("Invalid choice.").count(), 2);
    assert!(!root.path().join("a.txt").exists());
    assert!(root.path().join("b.txt").exists());
    assert!(dest.path().join("a.txt").exists());
}

#[test]
fn test_paths_prompted_when_missing() {
    let root = dup_tree();
    let dest = TempDir::new().unwrap();
    let nested = dest.path().join("dupes/nested");
    let input = format!("{}\n{}\n1\n", root.path().display(), nested.display());

    let (code, output) = run_interactive(
        scan_args(None, None, OutputFormat::Interactive),
        &input,
    );

    assert_eq!(code, ExitCode::Success);
    assert!(output.starts_with("Enter the root directory to search for duplicate files: "));
    assert!(output.contains("Enter the destination directory for duplicate files: "));
    assert!(nested.join("b.txt").exists());
}

#[test]
fn test_closed_input_leaves_files() {
    let root = dup_tree();
    let dest = TempDir::new().unwrap();
    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);

    let (code, _) = run_interactive(args, "");

    assert_eq!(code, ExitCode::Success);
    assert!(root.path().join("b.txt").exists());
}

#[test]
fn test_name_clash_in_destination_gets_suffix() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("x")).unwrap();
    fs::create_dir(root.path().join("y")).unwrap();
    fs::write(root.path().join("keep.txt"), "same").unwrap();
    fs::write(root.path().join("x/copy.txt"), "same").unwrap();
    fs::write(root.path().join("y/copy.txt"), "same").unwrap();
    let dest = TempDir::new().unwrap();

    // Discovery order is keep.txt, x/copy.txt, y/copy.txt
    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);
    run_interactive(args, "1\n");

    let mut moved: Vec<PathBuf> = fs::read_dir(dest.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    moved.sort();
    assert_eq!(moved, vec![dest.path().join("copy-1.txt"), dest.path().join("copy.txt")]);
    assert!(root.path().join("keep.txt").exists());
}

#[test]
fn test_no_duplicates_reports_exit_code() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("only.txt"), "alone").unwrap();
    let dest = TempDir::new().unwrap();

    let args = scan_args(Some(root.path()), Some(dest.path()), OutputFormat::Interactive);
    let (code, output) = run_interactive(args, "");

    assert_eq!(code, ExitCode::NoDuplicates);
    assert!(!output.contains("Keep which file?"));
}

#[test]
fn test_json_mode_does_not_prompt_or_move() {
    let root = dup_tree();
    let mut output = Vec::new();
    let resolver = Resolver::new(Cursor::new(&b""[..]), &mut output);

    let code = run_scan(
        scan_args(Some(root.path()), None, OutputFormat::Json),
        true,
        resolver,
    )
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(output.is_empty());
    assert!(root.path().join("b.txt").exists());
}

#[test]
fn test_json_mode_requires_path() {
    let mut output = Vec::new();
    let resolver = Resolver::new(Cursor::new(&b""[..]), &mut output);

    let result = run_scan(scan_args(None, None, OutputFormat::Json), true, resolver);
    assert!(result.is_err());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing");
    let mut output = Vec::new();
    let resolver = Resolver::new(Cursor::new(&b""[..]), &mut output);

    let err = run_scan(
        scan_args(Some(&missing), Some(dir.path()), OutputFormat::Interactive),
        true,
        resolver,
    )
    .unwrap_err();

    assert_eq!(ExitCode::from_error(&err), ExitCode::GeneralError);
    assert!(format!("{:#}", err).contains("Path not found"));
}
