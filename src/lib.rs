//! dupsweep - Distributed Duplicate File Finder
//!
//! Fingerprints every file under a directory with SHA-256, splitting the work
//! across several workers that report back to a coordinator through framed
//! messages, then lets the operator keep one copy of each duplicate and moves
//! the rest aside.
//!
//! # Modules
//!
//! - [`scanner`]: deterministic traversal, sharding and fingerprinting
//! - [`duplicates`]: per-worker indices, orchestration, duplicate groups
//! - [`cluster`]: channels, frame codec and the merge protocol
//! - [`resolve`] / [`actions`]: interactive choice and relocation
//! - [`output`]: JSON report

pub mod actions;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod resolve;
pub mod scanner;
pub mod signal;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::cli::{Cli, Commands, HashArgs, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, FinderConfig};
use crate::error::ExitCode;
use crate::output::JsonOutput;
use crate::progress::Progress;
use crate::resolve::Resolver;
use crate::scanner::{Fingerprinter, WalkerConfig};

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns any fatal error; the caller maps it to an exit code with
/// [`ExitCode::from_error`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }
    logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scan(args) => {
            let stdin = io::stdin();
            let resolver = Resolver::new(stdin.lock(), io::stdout());
            run_scan(args, cli.quiet, resolver)
        }
        Commands::Hash(args) => run_hash(&args),
    }
}

fn run_hash(args: &HashArgs) -> Result<ExitCode> {
    let fingerprint = Fingerprinter::new()
        .fingerprint(&args.file)
        .with_context(|| format!("Failed to fingerprint {}", args.file.display()))?;
    println!("{}  {}", fingerprint, args.file.display());
    Ok(ExitCode::Success)
}

/// Scan, then report as JSON or resolve interactively through `resolver`.
///
/// # Errors
///
/// Fails on invalid configuration, a missing root, a failed scan or a broken
/// terminal.
pub fn run_scan<R: BufRead, W: Write>(
    args: ScanArgs,
    quiet: bool,
    mut resolver: Resolver<R, W>,
) -> Result<ExitCode> {
    let config = match args.config {
        Some(ref path) => Config::load_from(Some(path.as_path()))
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load(),
    };
    let interactive = args.output == OutputFormat::Interactive;

    let root = match args.path {
        Some(path) => path,
        None if interactive => prompt_path(
            &mut resolver,
            "Enter the root directory to search for duplicate files: ",
        )?,
        None => bail!("A directory to scan is required with --output {}", args.output),
    };

    let mut destination = args.destination.or(config.destination);
    if destination.is_none() && interactive {
        destination = Some(prompt_path(
            &mut resolver,
            "Enter the destination directory for duplicate files: ",
        )?);
    }

    let workers = args.workers.map_or(config.workers, usize::from);
    let buffer_size = args
        .buffer_size
        .map_or(config.buffer_size, |b| usize::try_from(b).unwrap_or(usize::MAX));
    let mut ignore_patterns = config.ignore_patterns;
    ignore_patterns.extend(args.ignore_patterns);
    let walker_config = WalkerConfig::new(args.skip_hidden || config.skip_hidden, ignore_patterns)
        .with_gitignore(args.gitignore || config.respect_gitignore);

    let handler = signal::install_handler()?;
    let mut finder_config = FinderConfig::default()
        .with_workers(workers)
        .with_buffer_size(buffer_size)
        .with_walker_config(walker_config)
        .with_destination(destination.clone())
        .with_shutdown_flag(handler.flag());
    if interactive && !quiet {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    if interactive {
        println!(
            "\nScanning for duplicate files with {} worker{}...",
            workers,
            if workers == 1 { "" } else { "s" }
        );
    }

    let finder = DuplicateFinder::new(finder_config);
    let (groups, summary) = finder
        .find_duplicates(&root)
        .with_context(|| format!("Scan of {} failed", root.display()))?;
    let exit_code = ExitCode::from_summary(&summary);

    if !interactive {
        let output = JsonOutput::new(&groups, &summary, exit_code);
        output.write_to(&mut io::stdout().lock(), true)?;
        return Ok(exit_code);
    }

    println!(
        "Time taken: {:.2?} ({} files, {} skipped)",
        summary.scan_duration, summary.total_files, summary.skipped_files
    );

    if groups.is_empty() {
        println!("No duplicate files found.");
        return Ok(exit_code);
    }

    println!("Found {} groups of duplicate files.", groups.len());
    // An interactive run always has a destination by now
    let Some(destination) = destination else {
        bail!("No destination directory for duplicates");
    };
    let report = resolver
        .resolve_all(&groups, &destination)
        .context("Failed to read choice")?;
    println!(
        "\nDuplicate files have been processed: {} resolved, {} skipped. {}",
        report.resolved,
        report.skipped,
        report.relocation.summary()
    );

    Ok(exit_code)
}

fn prompt_path<R: BufRead, W: Write>(
    resolver: &mut Resolver<R, W>,
    prompt: &str,
) -> Result<PathBuf> {
    match resolver.prompt_line(prompt)? {
        Some(line) if !line.is_empty() => Ok(PathBuf::from(line)),
        _ => bail!("No directory given"),
    }
}
