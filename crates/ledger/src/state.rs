//! The ledger's shared mutable state
//!
//! Locking layout:
//! - members: a sharded concurrent map, so `join` contends per identity
//! - proposals: an arena behind one `RwLock`, written only to append a new
//!   proposal (id allocation), read by everything else
//! - each proposal: its own ballot box lock, so votes on different proposals
//!   never wait on each other

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use ballot_common::{Identity, ProposalId, Timestamp};

use crate::types::{Ballot, Member, Proposal, ProposalView};

/// Tally counters and ballots for one proposal, always updated together
#[derive(Debug)]
pub(crate) struct BallotBox {
    pub(crate) tally: Vec<u64>,
    pub(crate) ballots: HashMap<Identity, Ballot>,
}

impl BallotBox {
    pub(crate) fn empty(option_count: u32) -> Self {
        Self {
            tally: vec![0; option_count as usize],
            ballots: HashMap::new(),
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.ballots.len() as u64
    }
}

/// One slot of the proposal arena
#[derive(Debug)]
pub struct ProposalEntry {
    proposal: Proposal,
    pub(crate) ballot_box: RwLock<BallotBox>,
}

impl ProposalEntry {
    pub(crate) fn new(proposal: Proposal, ballot_box: BallotBox) -> Self {
        Self {
            proposal,
            ballot_box: RwLock::new(ballot_box),
        }
    }

    /// The immutable proposal record
    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    /// Snapshot of the tally counters
    pub async fn tally(&self) -> Vec<u64> {
        self.ballot_box.read().await.tally.clone()
    }

    /// Full view with status computed at `now`
    pub async fn view(&self, now: Timestamp) -> ProposalView {
        let ballot_box = self.ballot_box.read().await;
        ProposalView {
            proposal: self.proposal.clone(),
            tally: ballot_box.tally.clone(),
            total_ballots: ballot_box.total(),
            status: self.proposal.status(now),
        }
    }
}

/// Injectable store shared by the registry, proposal store and ballot engine
#[derive(Debug, Default)]
pub struct LedgerState {
    pub(crate) members: DashMap<Identity, Member>,
    pub(crate) member_count: AtomicU64,
    pub(crate) proposals: RwLock<Vec<Arc<ProposalEntry>>>,
}

impl LedgerState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(members: Vec<Member>, proposals: Vec<ProposalEntry>) -> Self {
        let count = members.len() as u64;
        let members = members
            .into_iter()
            .map(|m| (m.identity.clone(), m))
            .collect();

        Self {
            members,
            member_count: AtomicU64::new(count),
            proposals: RwLock::new(proposals.into_iter().map(Arc::new).collect()),
        }
    }

    /// Look up a proposal slot by id
    pub async fn entry(&self, id: ProposalId) -> Option<Arc<ProposalEntry>> {
        let proposals = self.proposals.read().await;
        usize::try_from(id)
            .ok()
            .and_then(|index| proposals.get(index))
            .cloned()
    }

    /// All proposal slots in id order
    pub async fn entries(&self) -> Vec<Arc<ProposalEntry>> {
        self.proposals.read().await.clone()
    }

    pub(crate) fn member_total(&self) -> u64 {
        self.member_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_lookup() {
        let proposal = Proposal {
            id: 0,
            creator: Identity::from("m1"),
            metadata_ref: "ipfs/Qm1".to_string(),
            option_count: 2,
            end_time: 200,
            created_at: 100,
        };
        let state = LedgerState::from_parts(
            vec![Member {
                identity: Identity::from("m1"),
                joined_at: 50,
            }],
            vec![ProposalEntry::new(proposal.clone(), BallotBox::empty(2))],
        );

        assert_eq!(state.member_total(), 1);
        let entry = state.entry(0).await.unwrap();
        assert_eq!(entry.proposal(), &proposal);
        assert_eq!(entry.tally().await, vec![0, 0]);
        assert!(state.entry(1).await.is_none());
        assert!(state.entry(u64::MAX).await.is_none());
    }
}
