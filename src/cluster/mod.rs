//! Message passing between shard workers and the coordinator.
//!
//! Workers never share scan data through memory. Everything that crosses a
//! worker boundary is a frame: a tagged byte buffer whose variable-length
//! fields all carry explicit length prefixes.
//!
//! # Architecture
//!
//! - [`transport`]: bounded channels connecting rank 0 to every other rank
//! - [`codec`]: frame layout and validation
//! - [`merge`]: the collective operations of a run (request broadcast,
//!   fingerprint count exchange, entry gather)
//!
//! ```text
//!            broadcast ScanRequest
//! rank 0 ───────────────────────────────▶ rank 1..N-1
//!        ◀─── COUNT(n) ───────────────── (round 1)
//!        ◀─── ENTRY × n ──────────────── (round 2)
//! ```
//!
//! Any malformed frame or lost peer is fatal for the whole run: an incomplete
//! global index would silently under-report duplicates.

pub mod codec;
pub mod merge;
pub mod transport;

use std::path::PathBuf;

pub use codec::{decode, encode, encode_entry, Message};
pub use merge::{broadcast_request, gather_global_index, receive_request, send_local_index};
pub use transport::{fabric, CoordinatorLink, WorkerLink, DEFAULT_CHANNEL_CAPACITY};

/// Parameters the coordinator hands to every worker before scanning starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Root directory to scan
    pub root: PathBuf,
    /// Directory that will receive relocated duplicates, if known
    pub destination: Option<PathBuf>,
}

impl ScanRequest {
    /// Create a new scan request.
    #[must_use]
    pub fn new(root: PathBuf, destination: Option<PathBuf>) -> Self {
        Self { root, destination }
    }
}

/// Errors raised while exchanging frames between workers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer on the other side of a channel went away.
    #[error("Lost connection to worker {rank}")]
    Disconnected {
        /// Rank of the unreachable peer
        rank: usize,
    },

    /// A rank outside the run was addressed.
    #[error("No worker with rank {0}")]
    UnknownRank(usize),

    /// A frame with no bytes at all.
    #[error("Empty frame")]
    EmptyFrame,

    /// The first byte of a frame is not a known message tag.
    #[error("Unknown message tag {0:#04x}")]
    UnknownTag(u8),

    /// A well-formed message arrived where another kind was required.
    #[error("Expected {expected} frame from worker {rank}, got {found}")]
    UnexpectedMessage {
        /// Rank that sent the frame
        rank: usize,
        /// Message kind the protocol required
        expected: &'static str,
        /// Message kind actually received
        found: &'static str,
    },

    /// A length prefix points past the end of the frame.
    #[error("Truncated frame: needed {needed} more bytes, {remaining} left")]
    Truncated {
        /// Bytes the next field requires
        needed: usize,
        /// Bytes left in the frame
        remaining: usize,
    },

    /// Bytes left over after the last field of a message.
    #[error("Frame has {0} trailing bytes")]
    TrailingBytes(usize),

    /// A fingerprint field does not have the digest length.
    #[error("Fingerprint field is {0} bytes, expected 32")]
    BadFingerprintLength(usize),

    /// An entry frame that lists no paths.
    #[error("Entry frame carries no paths")]
    EmptyEntry,

    /// A path field could not be decoded on this platform.
    #[error("Path field is not valid on this platform")]
    InvalidPath,

    /// A field is too long for its 32-bit length prefix.
    #[error("Field of {0} bytes exceeds the frame length limit")]
    FieldTooLong(usize),
}
