//! Frame layout for worker messages.
//!
//! Every frame starts with a one-byte tag. Integers are big-endian; every
//! variable-length field is preceded by its `u32` byte length, so a record
//! boundary never depends on the content of a string.
//!
//! ```text
//! REQUEST  01 | root_len u32 | root | has_dest u8 | [dest_len u32 | dest]
//! COUNT    02 | count u64
//! ENTRY    03 | fp_len u32 | fp (32) | path_count u32 | (path_len u32 | path)*
//! DONE     04
//! ```
//!
//! Decoding is strict: unknown tags, lengths that run past the frame, wrong
//! fingerprint sizes and trailing bytes are all rejected.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::{ProtocolError, ScanRequest};
use crate::scanner::{Fingerprint, FINGERPRINT_LEN};

const TAG_REQUEST: u8 = 0x01;
const TAG_COUNT: u8 = 0x02;
const TAG_ENTRY: u8 = 0x03;
const TAG_DONE: u8 = 0x04;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Scan parameters broadcast by the coordinator.
    Request(ScanRequest),
    /// Number of distinct fingerprints a worker is about to send.
    Count(u64),
    /// One fingerprint and every path a worker found for it.
    Entry {
        /// Shared fingerprint
        fingerprint: Fingerprint,
        /// Paths in the sender's discovery order
        paths: Vec<PathBuf>,
    },
    /// A worker has sent every entry it announced.
    Done,
}

impl Message {
    /// Short name of the message kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Count(_) => "count",
            Self::Entry { .. } => "entry",
            Self::Done => "done",
        }
    }
}

/// Encode a message into a frame.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if a path does not fit a `u32`
/// length prefix.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut w = FrameWriter::default();

    match message {
        Message::Request(request) => {
            w.put_u8(TAG_REQUEST);
            w.put_bytes(&path_bytes(&request.root))?;
            match &request.destination {
                Some(dest) => {
                    w.put_u8(1);
                    w.put_bytes(&path_bytes(dest))?;
                }
                None => w.put_u8(0),
            }
        }
        Message::Count(count) => {
            w.put_u8(TAG_COUNT);
            w.put_u64(*count);
        }
        Message::Entry { fingerprint, paths } => write_entry(&mut w, fingerprint, paths)?,
        Message::Done => w.put_u8(TAG_DONE),
    }

    Ok(w.buf)
}

/// Encode an entry frame straight from borrowed index data.
///
/// Produces the same bytes as encoding a [`Message::Entry`].
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_entry(fingerprint: &Fingerprint, paths: &[PathBuf]) -> Result<Vec<u8>, ProtocolError> {
    let mut w = FrameWriter::default();
    write_entry(&mut w, fingerprint, paths)?;
    Ok(w.buf)
}

fn write_entry(
    w: &mut FrameWriter,
    fingerprint: &Fingerprint,
    paths: &[PathBuf],
) -> Result<(), ProtocolError> {
    w.put_u8(TAG_ENTRY);
    w.put_bytes(fingerprint.as_bytes())?;
    w.put_u32(len_prefix(paths.len())?);
    for path in paths {
        w.put_bytes(&path_bytes(path))?;
    }
    Ok(())
}

/// Decode a frame into a message.
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first malformed field.
pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
    let mut r = FrameReader::new(frame);

    let message = match r.get_u8().map_err(|_| ProtocolError::EmptyFrame)? {
        TAG_REQUEST => {
            let root = path_from_bytes(r.get_bytes()?)?;
            let destination = match r.get_u8()? {
                0 => None,
                _ => Some(path_from_bytes(r.get_bytes()?)?),
            };
            Message::Request(ScanRequest { root, destination })
        }
        TAG_COUNT => Message::Count(r.get_u64()?),
        TAG_ENTRY => {
            let raw = r.get_bytes()?;
            let fingerprint = Fingerprint::from_slice(raw)
                .ok_or(ProtocolError::BadFingerprintLength(raw.len()))?;

            let count = r.get_u32()? as usize;
            if count == 0 {
                return Err(ProtocolError::EmptyEntry);
            }
            // Each path needs at least its 4-byte prefix; cap the allocation
            let mut paths = Vec::with_capacity(count.min(r.remaining() / 4));
            for _ in 0..count {
                paths.push(path_from_bytes(r.get_bytes()?)?);
            }
            Message::Entry { fingerprint, paths }
        }
        TAG_DONE => Message::Done,
        tag => return Err(ProtocolError::UnknownTag(tag)),
    };

    r.finish()?;
    Ok(message)
}

fn len_prefix(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::FieldTooLong(len))
}

#[derive(Default)]
struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.put_u32(len_prefix(bytes.len())?);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn get_u64(&mut self) -> Result<u64, ProtocolError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    fn get_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    fn finish(self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, ProtocolError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| ProtocolError::InvalidPath)
}
