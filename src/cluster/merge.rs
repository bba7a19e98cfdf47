//! Collective operations of a sharded scan.
//!
//! 1. [`broadcast_request`] / [`receive_request`]: the coordinator hands the
//!    scan parameters to every worker before anyone starts walking.
//! 2. [`send_local_index`]: a worker reports how many fingerprints it holds,
//!    sends one entry frame per fingerprint, then a done frame.
//! 3. [`gather_global_index`]: the coordinator collects every count first,
//!    then drains each rank in order, appending into a [`GlobalIndex`] seeded
//!    with its own [`LocalIndex`]. Anything but a done frame after the
//!    announced entries fails the merge.
//!
//! The coordinator does not return until every worker's data has arrived.

use super::codec::{decode, encode, encode_entry, Message};
use super::transport::{CoordinatorLink, WorkerLink};
use super::{ProtocolError, ScanRequest};
use crate::duplicates::{GlobalIndex, LocalIndex};
use crate::progress::{ProgressCallback, PHASE_MERGE};

/// Send the scan parameters to every worker.
///
/// # Errors
///
/// Fails if any worker has gone away.
pub fn broadcast_request(
    link: &CoordinatorLink,
    request: &ScanRequest,
) -> Result<(), ProtocolError> {
    let frame = encode(&Message::Request(request.clone()))?;
    link.broadcast(&frame)
}

/// Wait for the coordinator's scan parameters.
///
/// # Errors
///
/// Fails if the coordinator has gone away or sends anything but a request.
pub fn receive_request(link: &WorkerLink) -> Result<ScanRequest, ProtocolError> {
    match decode(&link.recv()?)? {
        Message::Request(request) => Ok(request),
        other => Err(ProtocolError::UnexpectedMessage {
            rank: 0,
            expected: "request",
            found: other.kind(),
        }),
    }
}

/// Ship a worker's local index to the coordinator.
///
/// # Errors
///
/// Fails if the coordinator has gone away or an entry cannot be encoded.
pub fn send_local_index(link: &WorkerLink, index: &LocalIndex) -> Result<(), ProtocolError> {
    link.send(encode(&Message::Count(index.len() as u64))?)?;

    for (fingerprint, paths) in index.iter() {
        link.send(encode_entry(fingerprint, paths)?)?;
    }
    link.send(encode(&Message::Done)?)?;

    log::debug!(
        "Worker {} sent {} fingerprints ({} files)",
        link.rank(),
        index.len(),
        index.file_count()
    );
    Ok(())
}

/// Merge every worker's local index into the coordinator's global index.
///
/// With a single worker this is an identity copy of `local`.
///
/// # Errors
///
/// Any lost worker or malformed frame aborts the merge; no partial index is
/// returned.
pub fn gather_global_index(
    link: &CoordinatorLink,
    local: LocalIndex,
    progress: Option<&dyn ProgressCallback>,
) -> Result<GlobalIndex, ProtocolError> {
    let mut global = GlobalIndex::from_local(local);
    if link.size() == 1 {
        return Ok(global);
    }

    // Round 1: fingerprint counts, in rank order
    let mut counts = Vec::with_capacity(link.size() - 1);
    for rank in 1..link.size() {
        match decode(&link.recv_from(rank)?)? {
            Message::Count(n) => {
                log::debug!("Worker {} reports {} fingerprints", rank, n);
                counts.push((rank, n));
            }
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    rank,
                    expected: "count",
                    found: other.kind(),
                })
            }
        }
    }

    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    if let Some(callback) = progress {
        callback.on_phase_start(PHASE_MERGE, usize::try_from(total).unwrap_or(usize::MAX));
    }

    // Round 2: entries, rank by rank
    let mut received = 0usize;
    for (rank, count) in counts {
        for _ in 0..count {
            match decode(&link.recv_from(rank)?)? {
                Message::Entry { fingerprint, paths } => {
                    global.append(fingerprint, paths);
                    received += 1;
                    if let Some(callback) = progress {
                        callback.on_progress(rank, "");
                    }
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        rank,
                        expected: "entry",
                        found: other.kind(),
                    })
                }
            }
        }

        // More entries than announced would otherwise be dropped unseen
        match decode(&link.recv_from(rank)?)? {
            Message::Done => {}
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    rank,
                    expected: "done",
                    found: other.kind(),
                })
            }
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_end(PHASE_MERGE);
    }

    log::info!(
        "Merged {} fingerprint entries from {} workers into {} fingerprints",
        received,
        link.size() - 1,
        global.len()
    );
    Ok(global)
}
