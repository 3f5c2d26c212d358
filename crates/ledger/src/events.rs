//! Append-only notification log
//!
//! Every committed mutation appends exactly one [`LedgerEvent`]. Consumers
//! can follow the live broadcast or replay the log from any sequence number;
//! a lagging subscriber loses live events but never the log.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use ballot_common::{Identity, ProposalId, Timestamp};

/// A notification about a committed ledger mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    MemberJoined {
        member: Identity,
        joined_at: Timestamp,
        /// Member count right after this join
        member_count: u64,
    },
    VoteCreated {
        proposal_id: ProposalId,
        creator: Identity,
        option_count: u32,
        end_time: Timestamp,
        created_at: Timestamp,
    },
    Voted {
        proposal_id: ProposalId,
        voter: Identity,
        option: u32,
        cast_at: Timestamp,
    },
}

/// An event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub event: LedgerEvent,
}

/// The ledger's event log plus live fan-out
#[derive(Debug)]
pub struct EventLog {
    log: RwLock<Vec<EventRecord>>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    /// Create an empty log whose live channel buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self::with_records(Vec::new(), capacity)
    }

    pub(crate) fn with_records(records: Vec<EventRecord>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            log: RwLock::new(records),
            sender,
        }
    }

    /// Append an event, assigning it the next sequence number
    pub async fn append(&self, event: LedgerEvent) -> EventRecord {
        let mut log = self.log.write().await;
        let record = EventRecord {
            seq: log.len() as u64,
            event,
        };
        log.push(record.clone());
        // No receivers is fine: the log keeps the record.
        let _ = self.sender.send(record.clone());
        record
    }

    /// Follow events appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// All records with `seq >= from`
    pub async fn since(&self, from: u64) -> Vec<EventRecord> {
        let log = self.log.read().await;
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(log.len());
        log[start..].to_vec()
    }

    /// Number of recorded events
    pub async fn len(&self) -> u64 {
        self.log.read().await.len() as u64
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}
