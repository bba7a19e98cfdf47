//! Logging setup.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from
//! (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! Records emitted from a worker thread are tagged with the thread name
//! (`dupsweep-worker-N`) once verbose output is enabled, so interleaved
//! shard logs stay attributable.
//!
//! Debug builds add a timestamp; release builds print level and message only.
//!
//! ```rust,no_run
//! use dupsweep::logging::init_logging;
//!
//! init_logging(1, false); // -v
//! log::debug!("visible");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logging subsystem based on CLI verbosity flags.
///
/// Call once at startup. A second call leaves the first logger in place.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=normal, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by `RUST_LOG`)
pub fn init_logging(verbose: u8, quiet: bool) {
    let rust_log = env::var("RUST_LOG").ok();

    let mut builder = Builder::new();
    match rust_log {
        Some(_) => {
            builder.parse_default_env();
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }

    match rust_log {
        Some(spec) => log::debug!("Logging initialized from RUST_LOG={}", spec),
        None => log::debug!(
            "Logging initialized at level: {:?}",
            determine_level(verbose, quiet)
        ),
    }
}

/// Map CLI flags to a level filter. `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Origin tag for a record: module path at trace level, thread name at debug.
fn origin(verbose: u8, module: Option<&str>) -> Option<String> {
    match verbose {
        0 => None,
        1 => std::thread::current().name().map(str::to_string),
        _ => {
            let thread = std::thread::current();
            let module = module.unwrap_or("unknown");
            Some(match thread.name() {
                Some(name) => format!("{} {}", name, module),
                None => module.to_string(),
            })
        }
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);
        let origin = origin(verbose, record.module_path())
            .map(|o| format!("[{}] ", o))
            .unwrap_or_default();

        #[cfg(debug_assertions)]
        {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}{}",
                buf.timestamp_seconds(),
                level,
                origin,
                record.args()
            )
        }

        #[cfg(not(debug_assertions))]
        {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}{}",
                level,
                origin,
                record.args()
            )
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_level_default() {
        assert_eq!(determine_level(0, false), LevelFilter::Info);
    }

    #[test]
    fn test_determine_level_verbose() {
        assert_eq!(determine_level(1, false), LevelFilter::Debug);
        assert_eq!(determine_level(2, false), LevelFilter::Trace);
        assert_eq!(determine_level(5, false), LevelFilter::Trace);
    }

    #[test]
    fn test_determine_level_quiet_overrides_verbose() {
        assert_eq!(determine_level(0, true), LevelFilter::Error);
        assert_eq!(determine_level(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_origin_hidden_by_default() {
        assert_eq!(origin(0, Some("dupsweep::cluster")), None);
    }

    #[test]
    fn test_origin_uses_thread_name() {
        let tag = std::thread::Builder::new()
            .name("dupsweep-worker-3".to_string())
            .spawn(|| origin(2, Some("dupsweep::cluster::merge")))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(
            tag.as_deref(),
            Some("dupsweep-worker-3 dupsweep::cluster::merge")
        );
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(0, true);
        init_logging(2, false);
    }
}
