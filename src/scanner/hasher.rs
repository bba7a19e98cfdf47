//! SHA-256 file fingerprinting with streaming reads.
//!
//! # Overview
//!
//! [`Fingerprinter`] streams a file through an incremental SHA-256 digest in
//! fixed-size chunks, so arbitrarily large files are hashed in constant
//! memory. The resulting [`Fingerprint`] is a 32-byte value rendered as 64
//! lowercase hex characters.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::Fingerprinter;
//! use std::path::Path;
//!
//! let fingerprinter = Fingerprinter::new();
//! let fp = fingerprinter.fingerprint(Path::new("Cargo.toml")).unwrap();
//! println!("{fp}");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::{FileRecord, HashError};

/// Default read chunk size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Length of a fingerprint in bytes (SHA-256 output).
pub const FINGERPRINT_LEN: usize = 32;

/// Content fingerprint of a file: the SHA-256 digest of its full byte content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a fingerprint from a byte slice of exactly [`FINGERPRINT_LEN`] bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; FINGERPRINT_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Parse a 64-character hexadecimal string (either case).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != FINGERPRINT_LEN * 2 || !hex.is_ascii() {
            return None;
        }

        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| format!("Invalid fingerprint: '{s}'"))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Streaming SHA-256 fingerprinter.
///
/// Holds only the chunk size; a fresh buffer is allocated per call so one
/// fingerprinter can be shared freely.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    buffer_size: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter {
    /// Create a fingerprinter reading [`DEFAULT_BUFFER_SIZE`] bytes per chunk.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Set the read chunk size (clamped to at least 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Configured read chunk size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Compute the fingerprint of a file's full content.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened, disappears while
    /// being read, or a read fails. The file is never modified.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut digest = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => digest.update(&buffer[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            }
        }

        Ok(Fingerprint(digest.finalize().into()))
    }

    /// Fingerprint a file and pair the result with its path.
    ///
    /// # Errors
    ///
    /// Same as [`Fingerprinter::fingerprint`].
    pub fn record(&self, path: &Path) -> Result<FileRecord, HashError> {
        let fingerprint = self.fingerprint(path)?;
        Ok(FileRecord::new(path.to_path_buf(), fingerprint))
    }
}
