//! Channel fabric connecting rank 0 with every other rank.
//!
//! Each non-coordinator worker owns one uplink (worker → coordinator) and one
//! downlink (coordinator → worker). Channels are bounded so a worker that
//! finishes early cannot queue its whole index in memory while the
//! coordinator is still draining a lower rank.
//!
//! Dropping an endpoint closes its channels; the peer then observes
//! [`ProtocolError::Disconnected`] instead of blocking forever.

use crossbeam_channel::{bounded, Receiver, Sender};

use super::ProtocolError;

/// Frames buffered per channel before the sender blocks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Endpoint held by the coordinator (rank 0).
#[derive(Debug)]
pub struct CoordinatorLink {
    size: usize,
    /// Index `rank - 1`
    uplinks: Vec<Receiver<Vec<u8>>>,
    /// Index `rank - 1`
    downlinks: Vec<Sender<Vec<u8>>>,
}

/// Endpoint held by a non-coordinator worker.
#[derive(Debug)]
pub struct WorkerLink {
    rank: usize,
    size: usize,
    uplink: Sender<Vec<u8>>,
    downlink: Receiver<Vec<u8>>,
}

/// Build the endpoints of a run with `size` workers.
///
/// Returns the coordinator endpoint and one endpoint per rank `1..size`,
/// ordered by rank. `size` is clamped to at least 1.
#[must_use]
pub fn fabric(size: usize, capacity: usize) -> (CoordinatorLink, Vec<WorkerLink>) {
    let size = size.max(1);
    let capacity = capacity.max(1);

    let mut uplinks = Vec::with_capacity(size - 1);
    let mut downlinks = Vec::with_capacity(size - 1);
    let mut workers = Vec::with_capacity(size - 1);

    for rank in 1..size {
        let (up_tx, up_rx) = bounded(capacity);
        let (down_tx, down_rx) = bounded(capacity);
        uplinks.push(up_rx);
        downlinks.push(down_tx);
        workers.push(WorkerLink {
            rank,
            size,
            uplink: up_tx,
            downlink: down_rx,
        });
    }

    let coordinator = CoordinatorLink {
        size,
        uplinks,
        downlinks,
    };
    (coordinator, workers)
}

impl CoordinatorLink {
    /// Total number of workers, coordinator included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Send a frame to one worker.
    ///
    /// # Errors
    ///
    /// Fails if the rank is unknown or the worker has gone away.
    pub fn send_to(&self, rank: usize, frame: Vec<u8>) -> Result<(), ProtocolError> {
        let channel = rank
            .checked_sub(1)
            .and_then(|i| self.downlinks.get(i))
            .ok_or(ProtocolError::UnknownRank(rank))?;
        channel
            .send(frame)
            .map_err(|_| ProtocolError::Disconnected { rank })
    }

    /// Send the same frame to every worker.
    ///
    /// # Errors
    ///
    /// Fails on the first worker that has gone away.
    pub fn broadcast(&self, frame: &[u8]) -> Result<(), ProtocolError> {
        for rank in 1..self.size {
            self.send_to(rank, frame.to_vec())?;
        }
        Ok(())
    }

    /// Block until the next frame from `rank` arrives.
    ///
    /// # Errors
    ///
    /// Fails if the rank is unknown or the worker closed its uplink.
    pub fn recv_from(&self, rank: usize) -> Result<Vec<u8>, ProtocolError> {
        let channel = rank
            .checked_sub(1)
            .and_then(|i| self.uplinks.get(i))
            .ok_or(ProtocolError::UnknownRank(rank))?;
        channel
            .recv()
            .map_err(|_| ProtocolError::Disconnected { rank })
    }
}

impl WorkerLink {
    /// Rank of this worker.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of workers, coordinator included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Send a frame to the coordinator.
    ///
    /// # Errors
    ///
    /// Fails if the coordinator has gone away.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), ProtocolError> {
        self.uplink
            .send(frame)
            .map_err(|_| ProtocolError::Disconnected { rank: 0 })
    }

    /// Block until the next frame from the coordinator arrives.
    ///
    /// # Errors
    ///
    /// Fails if the coordinator closed the downlink.
    pub fn recv(&self) -> Result<Vec<u8>, ProtocolError> {
        self.downlink
            .recv()
            .map_err(|_| ProtocolError::Disconnected { rank: 0 })
    }
}
