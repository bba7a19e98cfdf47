//! Output formatters for duplicate scan results.
//!
//! Only JSON is produced here; the interactive mode lives in
//! [`crate::resolve`].
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::duplicates::DuplicateFinder;
//! use dupsweep::error::ExitCode;
//! use dupsweep::output::JsonOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! let output = JsonOutput::new(&groups, &summary, ExitCode::from_summary(&summary));
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;

pub use json::{JsonOutput, JsonOutputError};
