//! Saving and restoring ledgers through both storage backends

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use ballot_common::{Identity, LedgerConfig, ManualClock, Timestamp};
use ballot_ledger::{ErrorKind, LedgerError, LedgerSnapshot, VotingLedger, SNAPSHOT_KEY};
use ballot_storage::{FileStorage, JsonStorage, MemoryStorage, Storage, StorageOptions};

const NOW: Timestamp = 1_700_000_000;

async fn populated(clock: Arc<ManualClock>) -> VotingLedger {
    let ledger = VotingLedger::with_clock(LedgerConfig::default(), clock.clone());
    let (alice, bob, carol) = (
        Identity::from("alice"),
        Identity::from("bob"),
        Identity::from("carol"),
    );

    ledger.join(&alice).await.unwrap();
    ledger.join(&bob).await.unwrap();
    ledger.create_vote(&alice, "ipfs/budget", NOW + 300, 3).await.unwrap();
    ledger.vote(&bob, 0, 2).await.unwrap();

    clock.advance(10);
    ledger.join(&carol).await.unwrap();
    ledger.create_vote(&carol, "ipfs/charter", NOW + 900, 2).await.unwrap();
    ledger.vote(&alice, 0, 2).await.unwrap();
    ledger.vote(&carol, 1, 0).await.unwrap();
    ledger
}

#[tokio::test]
async fn test_memory_round_trip_preserves_everything() {
    let clock = Arc::new(ManualClock::new(NOW));
    let original = populated(clock.clone()).await;
    let storage = MemoryStorage::new();

    original.save_to(&storage).await.unwrap();
    assert!(storage.exists(SNAPSHOT_KEY).await.unwrap());

    let restored = VotingLedger::load_from(LedgerConfig::default(), clock.clone(), &storage)
        .await
        .unwrap();

    assert_eq!(restored.member_count(), 3);
    assert_eq!(restored.votes_count().await, 2);
    assert_eq!(restored.get_vote(0).await.unwrap().tally, vec![0, 0, 2]);
    assert_eq!(restored.get_vote(1).await.unwrap().tally, vec![1, 0]);
    assert!(restored.did_vote(&Identity::from("bob"), 0).await);
    assert_eq!(
        restored.events_since(0).await,
        original.events_since(0).await
    );
    assert_eq!(restored.stats().await, original.stats().await);
}

#[tokio::test]
async fn test_restored_ledger_keeps_enforcing_rules() {
    let clock = Arc::new(ManualClock::new(NOW));
    let storage = MemoryStorage::new();
    populated(clock.clone()).await.save_to(&storage).await.unwrap();

    let ledger = VotingLedger::load_from(LedgerConfig::default(), clock.clone(), &storage)
        .await
        .unwrap();
    let bob = Identity::from("bob");

    assert_eq!(ledger.vote(&bob, 0, 1).await.unwrap_err().kind(), ErrorKind::DoubleVote);
    assert_eq!(
        ledger.join(&bob).await.unwrap_err().kind(),
        ErrorKind::AlreadyMember
    );

    // Ids and sequence numbers continue where the snapshot left off.
    let next = ledger.create_vote(&bob, "ipfs/next", NOW + 1_000, 2).await.unwrap();
    assert_eq!(next, 2);
    let records = ledger.events_since(0).await;
    assert_eq!(records.last().unwrap().seq, records.len() as u64 - 1);
}

#[tokio::test]
async fn test_missing_snapshot_starts_empty() {
    let storage = MemoryStorage::new();
    let ledger = VotingLedger::load_from(
        LedgerConfig::default(),
        Arc::new(ManualClock::new(NOW)),
        &storage,
    )
    .await
    .unwrap();

    assert_eq!(ledger.member_count(), 0);
    assert_eq!(ledger.votes_count().await, 0);
}

#[tokio::test]
async fn test_file_storage_round_trip() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));

    {
        let storage = FileStorage::new(dir.path()).await.unwrap();
        populated(clock.clone()).await.save_to(&storage).await.unwrap();
    }

    let storage = FileStorage::new(dir.path()).await.unwrap().with_options(StorageOptions {
        sync_write: false,
        use_cache: false,
    });
    let ledger = VotingLedger::load_from(LedgerConfig::default(), clock, &storage)
        .await
        .unwrap();

    assert_eq!(ledger.proposals_created_by(&Identity::from("alice")).await, vec![0]);
    assert_eq!(ledger.proposals_voted_by(&Identity::from("alice")).await, vec![0]);
}

/// One command-line style cycle: lock, load, vote, save
async fn locked_vote(dir: PathBuf, clock: Arc<ManualClock>, voter: &str, option: u32) {
    let storage = FileStorage::new(&dir).await.unwrap();
    let _lock = storage.lock().await.unwrap();
    let ledger = VotingLedger::load_from(LedgerConfig::default(), clock, &storage)
        .await
        .unwrap();
    ledger.vote(&Identity::from(voter), 0, option).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    ledger.save_to(&storage).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_locked_cycles_keep_both_ballots() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    {
        let storage = FileStorage::new(dir.path()).await.unwrap();
        let ledger = VotingLedger::with_clock(LedgerConfig::default(), clock.clone());
        for name in ["m1", "m2", "m3"] {
            ledger.join(&Identity::from(name)).await.unwrap();
        }
        ledger
            .create_vote(&Identity::from("m1"), "ipfs/Qm1", NOW + 600, 3)
            .await
            .unwrap();
        ledger.save_to(&storage).await.unwrap();
    }

    let first = tokio::spawn(locked_vote(dir.path().to_path_buf(), clock.clone(), "m2", 1));
    let second = tokio::spawn(locked_vote(dir.path().to_path_buf(), clock.clone(), "m3", 2));
    first.await.unwrap();
    second.await.unwrap();

    let storage = FileStorage::new(dir.path()).await.unwrap();
    let ledger = VotingLedger::load_from(LedgerConfig::default(), clock, &storage)
        .await
        .unwrap();
    assert_eq!(ledger.get_vote(0).await.unwrap().tally, vec![0, 1, 1]);
    assert!(ledger.did_vote(&Identity::from("m2"), 0).await);
    assert!(ledger.did_vote(&Identity::from("m3"), 0).await);
}

#[tokio::test]
async fn test_inflated_tally_is_rejected() {
    let clock = Arc::new(ManualClock::new(NOW));
    let storage = MemoryStorage::new();
    populated(clock.clone()).await.save_to(&storage).await.unwrap();

    let mut snapshot: LedgerSnapshot = storage.get_json(SNAPSHOT_KEY).await.unwrap();
    snapshot.proposals[0].tally[1] += 5;
    storage.put_json(SNAPSHOT_KEY, &snapshot).await.unwrap();

    let err = VotingLedger::load_from(LedgerConfig::default(), clock, &storage)
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::CorruptSnapshot);
    assert!(!err.is_validation());
}

#[tokio::test]
async fn test_duplicated_ballot_is_rejected() {
    let clock = Arc::new(ManualClock::new(NOW));
    let mut snapshot = populated(clock.clone()).await.snapshot().await;

    let ballot = snapshot.proposals[0].ballots[0].clone();
    snapshot.proposals[0].ballots.push(ballot.clone());
    snapshot.proposals[0].tally[ballot.option as usize] += 1;

    let err = VotingLedger::restore(LedgerConfig::default(), clock, snapshot)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::CorruptSnapshot);
}

#[tokio::test]
async fn test_tighter_option_cap_keeps_existing_proposals() {
    let clock = Arc::new(ManualClock::new(NOW));
    let storage = MemoryStorage::new();
    let alice = Identity::from("alice");
    {
        let ledger = VotingLedger::with_clock(LedgerConfig::default(), clock.clone());
        ledger.join(&alice).await.unwrap();
        ledger.create_vote(&alice, "ipfs/wide", NOW + 300, 10).await.unwrap();
        ledger.save_to(&storage).await.unwrap();
    }

    let config = LedgerConfig {
        max_options: 8,
        ..LedgerConfig::default()
    };
    let ledger = VotingLedger::load_from(config, clock, &storage).await.unwrap();

    assert_eq!(ledger.get_vote(0).await.unwrap().tally.len(), 10);
    ledger.vote(&alice, 0, 9).await.unwrap();
    assert_eq!(ledger.stats().await.ballots, 1);

    let err = ledger
        .create_vote(&alice, "ipfs/too-wide", NOW + 300, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidOptionCount { count: 10, max: 8 }));
    assert_eq!(ledger.create_vote(&alice, "ipfs/narrow", NOW + 300, 8).await.unwrap(), 1);
}

#[tokio::test]
async fn test_garbage_blob_is_a_storage_error() {
    let storage = MemoryStorage::new();
    storage.put(SNAPSHOT_KEY, b"not json").await.unwrap();

    let err = VotingLedger::load_from(
        LedgerConfig::default(),
        Arc::new(ManualClock::new(NOW)),
        &storage,
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Storage);
}
