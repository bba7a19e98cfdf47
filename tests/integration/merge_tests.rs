//! The merge protocol driven by hand over the channel fabric.

use dupsweep::cluster::{
    broadcast_request, encode, fabric, gather_global_index, receive_request, send_local_index,
    Message, ProtocolError, ScanRequest,
};
use dupsweep::duplicates::{aggregate_shard, select_duplicates, GlobalIndex, LocalIndex};
use dupsweep::scanner::{Fingerprinter, Shard, Walker, WalkerConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn populate(root: &Path) {
    for i in 0..12 {
        // The last three files repeat the first three
        let content = format!("content {}", i % 9);
        fs::write(root.join(format!("file{:02}.txt", i)), content).unwrap();
    }
}

/// Run the full protocol with `size` workers and return the coordinator's
/// global index.
fn merged(root: &Path, size: usize) -> GlobalIndex {
    let (coordinator, workers) = fabric(size, 2);
    let fingerprinter = Fingerprinter::new();

    thread::scope(|s| {
        for link in workers {
            let fingerprinter = &fingerprinter;
            s.spawn(move || {
                let request = receive_request(&link).unwrap();
                let walker = Walker::new(&request.root, WalkerConfig::default());
                let shard = Shard::new(link.rank(), link.size());
                let (local, _) = aggregate_shard(link.rank(), walker.shard(shard), fingerprinter, None);
                send_local_index(&link, &local).unwrap();
            });
        }

        broadcast_request(&coordinator, &ScanRequest::new(root.to_path_buf(), None)).unwrap();
        let walker = Walker::new(root, WalkerConfig::default());
        let (local, _) = aggregate_shard(0, walker.shard(Shard::new(0, size)), &fingerprinter, None);
        gather_global_index(&coordinator, local, None).unwrap()
    })
}

/// Fingerprint to sorted path list, independent of merge order.
fn canonical(index: &GlobalIndex) -> BTreeMap<String, Vec<PathBuf>> {
    index
        .iter()
        .map(|(fp, paths)| {
            let mut paths = paths.clone();
            paths.sort();
            (fp.to_hex(), paths)
        })
        .collect()
}

#[test]
fn test_merge_matches_single_worker_for_any_size() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let baseline = canonical(&merged(dir.path(), 1));
    assert_eq!(baseline.values().map(Vec::len).sum::<usize>(), 12);

    for size in 2..=6 {
        assert_eq!(canonical(&merged(dir.path(), size)), baseline, "size {}", size);
    }
}

#[test]
fn test_merged_groups_span_workers() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let groups = select_duplicates(&merged(dir.path(), 4));
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.len() == 2));
}

#[test]
fn test_paths_follow_rank_order() {
    let dir = TempDir::new().unwrap();
    // file0 goes to rank 0, file1 to rank 1
    fs::write(dir.path().join("file0"), "same").unwrap();
    fs::write(dir.path().join("file1"), "same").unwrap();

    let global = merged(dir.path(), 2);
    let paths: Vec<&PathBuf> = global.iter().flat_map(|(_, paths)| paths).collect();

    assert_eq!(paths, vec![&dir.path().join("file0"), &dir.path().join("file1")]);
}

#[test]
fn test_request_carries_destination() {
    let (coordinator, mut workers) = fabric(2, 1);
    let link = workers.remove(0);
    let request = ScanRequest::new(PathBuf::from("/data"), Some(PathBuf::from("/dupes")));

    broadcast_request(&coordinator, &request).unwrap();
    assert_eq!(receive_request(&link).unwrap(), request);
}

#[test]
fn test_single_worker_merge_is_identity() {
    let (coordinator, workers) = fabric(1, 4);
    assert!(workers.is_empty());

    let global = gather_global_index(&coordinator, LocalIndex::new(), None).unwrap();
    assert!(global.is_empty());
}

#[test]
fn test_lost_worker_aborts_merge() {
    let (coordinator, workers) = fabric(3, 4);

    let mut workers = workers.into_iter();
    let first = workers.next().unwrap();
    drop(workers);

    let handle = thread::spawn(move || send_local_index(&first, &LocalIndex::new()));
    let result = gather_global_index(&coordinator, LocalIndex::new(), None);
    handle.join().unwrap().unwrap();

    assert_eq!(result.unwrap_err(), ProtocolError::Disconnected { rank: 2 });
}

#[test]
fn test_garbage_frame_aborts_merge() {
    let (coordinator, mut workers) = fabric(2, 4);
    let link = workers.remove(0);
    link.send(vec![0xff, 0, 0]).unwrap();

    let result = gather_global_index(&coordinator, LocalIndex::new(), None);
    assert_eq!(result.unwrap_err(), ProtocolError::UnknownTag(0xff));
}

#[test]
fn test_out_of_order_message_aborts_merge() {
    let (coordinator, mut workers) = fabric(2, 4);
    let link = workers.remove(0);
    let request = encode(&Message::Request(ScanRequest::new(PathBuf::from("/"), None))).unwrap();
    link.send(request).unwrap();

    let result = gather_global_index(&coordinator, LocalIndex::new(), None);
    assert_eq!(
        result.unwrap_err(),
        ProtocolError::UnexpectedMessage {
            rank: 1,
            expected: "count",
            found: "request",
        }
    );
}

#[test]
fn test_coordinator_gone_unblocks_worker() {
    let (coordinator, mut workers) = fabric(2, 1);
    let link = workers.remove(0);
    drop(coordinator);

    assert_eq!(
        receive_request(&link).unwrap_err(),
        ProtocolError::Disconnected { rank: 0 }
    );
}
