//! File actions module.
//!
//! Duplicates are never deleted. The copies a user does not keep are moved
//! into a destination directory, where they can be inspected or removed by
//! hand.
//!
//! ```no_run
//! use dupsweep::actions::relocate_batch;
//! use std::path::{Path, PathBuf};
//!
//! let result = relocate_batch(&[PathBuf::from("/data/copy.txt")], Path::new("/data/dupes"));
//! println!("{}", result.summary());
//! ```

pub mod relocate;

pub use relocate::{
    ensure_destination, relocate_batch, relocate_file, relocate_group, reserve_target,
    unique_target,
    BatchRelocateResult, RelocateError, Relocation,
};
