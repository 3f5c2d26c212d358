//! Records owned by the ledger

use serde::{Deserialize, Serialize};

use ballot_common::{Identity, ProposalId, Timestamp};

/// A registered member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's identity
    pub identity: Identity,
    /// When the member joined
    pub joined_at: Timestamp,
}

/// The immutable part of a proposal.
///
/// Tallies live next to the ballots in the proposal's ballot box, so nothing
/// here ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Sequential id, starting at 0
    pub id: ProposalId,
    /// The member who created the proposal
    pub creator: Identity,
    /// Opaque reference to the off-ledger description/options document
    pub metadata_ref: String,
    /// Number of options, each with its own tally counter
    pub option_count: u32,
    /// Voting is open while `now < end_time`
    pub end_time: Timestamp,
    /// When the proposal was created
    pub created_at: Timestamp,
}

impl Proposal {
    /// Whether ballots are still accepted at `now`
    pub fn is_open(&self, now: Timestamp) -> bool {
        now < self.end_time
    }

    /// Derived open/closed status at `now`
    pub fn status(&self, now: Timestamp) -> ProposalStatus {
        if self.is_open(now) {
            ProposalStatus::Open
        } else {
            ProposalStatus::Closed
        }
    }
}

/// A single recorded vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// The proposal voted on
    pub proposal_id: ProposalId,
    /// Who voted
    pub voter: Identity,
    /// Index of the chosen option
    pub option: u32,
    /// When the ballot was cast
    pub cast_at: Timestamp,
}

/// Open/closed state of a proposal, always computed from the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Accepting ballots
    Open,
    /// End time reached
    Closed,
}

/// Which proposals a listing should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposalFilter {
    #[default]
    All,
    /// End time still in the future
    Active,
    /// End time reached
    Ended,
}

impl ProposalFilter {
    pub fn matches(&self, status: ProposalStatus) -> bool {
        match self {
            ProposalFilter::All => true,
            ProposalFilter::Active => status == ProposalStatus::Open,
            ProposalFilter::Ended => status == ProposalStatus::Closed,
        }
    }
}

/// The `getVote` result: metadata reference, creator, tally and end time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub metadata_ref: String,
    pub creator: Identity,
    pub tally: Vec<u64>,
    pub end_time: Timestamp,
}

/// A full point-in-time view of one proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: Proposal,
    /// Per-option counters
    pub tally: Vec<u64>,
    /// Number of ballots, always the sum of `tally`
    pub total_ballots: u64,
    /// Status at the time the view was taken
    pub status: ProposalStatus,
}

/// Ledger-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub members: u64,
    pub proposals: u64,
    pub active_proposals: u64,
    pub ballots: u64,
}
