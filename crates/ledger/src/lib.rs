//! Ballot ledger core
//!
//! A small, serially consistent state machine for member-only voting:
//!
//! - [`MembershipRegistry`] tracks who may propose and vote
//! - [`ProposalStore`] owns the sequential proposal id space and tallies
//! - [`BallotEngine`] records exactly one ballot per member per proposal
//!
//! All three share one injectable [`LedgerState`] and write every committed
//! mutation to an append-only [`EventLog`]. [`VotingLedger`] wires them
//! together and adds snapshot persistence.

use thiserror::Error;

use ballot_common::{Identity, ProposalId, Timestamp};
use ballot_storage::StorageError;

pub mod ballot;
pub mod events;
pub mod ledger;
pub mod membership;
pub mod proposals;
pub mod snapshot;
pub mod state;
pub mod types;

pub use ballot::BallotEngine;
pub use events::{EventLog, EventRecord, LedgerEvent};
pub use ledger::VotingLedger;
pub use membership::MembershipRegistry;
pub use proposals::ProposalStore;
pub use snapshot::{LedgerSnapshot, ProposalSnapshot, SNAPSHOT_KEY, SNAPSHOT_VERSION};
pub use state::LedgerState;
pub use types::{
    Ballot, LedgerStats, Member, Proposal, ProposalFilter, ProposalStatus, ProposalView,
    VoteRecord,
};

/// Error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The caller has already joined
    #[error("{0} is already a member")]
    AlreadyMember(Identity),

    /// The caller has not joined
    #[error("{0} is not a member")]
    NotMember(Identity),

    /// Option count outside `2..=max`
    #[error("Invalid option count {count}: must be between 2 and {max}")]
    InvalidOptionCount { count: u32, max: u32 },

    /// End time not strictly in the future
    #[error("Invalid end time {end_time}: must be after {now}")]
    InvalidEndTime { end_time: Timestamp, now: Timestamp },

    /// Empty metadata reference
    #[error("Metadata reference must not be empty")]
    InvalidMetadata,

    /// No proposal with this id was ever created
    #[error("Proposal not found: {0}")]
    NotFound(ProposalId),

    /// The proposal's end time has passed
    #[error("Voting on proposal {proposal_id} ended at {end_time}")]
    VotingEnded {
        proposal_id: ProposalId,
        end_time: Timestamp,
    },

    /// The chosen option index does not exist on the proposal
    #[error("Option {option} is out of range for proposal {proposal_id} ({option_count} options)")]
    OptionOutOfRange {
        proposal_id: ProposalId,
        option: u32,
        option_count: u32,
    },

    /// The voter already holds a ballot on this proposal
    #[error("{voter} already voted on proposal {proposal_id}")]
    DoubleVote {
        proposal_id: ProposalId,
        voter: Identity,
    },

    /// A persisted snapshot violates a ledger invariant
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Discriminant of a [`LedgerError`], for callers mapping errors to messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyMember,
    NotMember,
    InvalidOptionCount,
    InvalidEndTime,
    InvalidMetadata,
    NotFound,
    VotingEnded,
    OptionOutOfRange,
    DoubleVote,
    CorruptSnapshot,
    Storage,
    Serialization,
}

impl LedgerError {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AlreadyMember(_) => ErrorKind::AlreadyMember,
            LedgerError::NotMember(_) => ErrorKind::NotMember,
            LedgerError::InvalidOptionCount { .. } => ErrorKind::InvalidOptionCount,
            LedgerError::InvalidEndTime { .. } => ErrorKind::InvalidEndTime,
            LedgerError::InvalidMetadata => ErrorKind::InvalidMetadata,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::VotingEnded { .. } => ErrorKind::VotingEnded,
            LedgerError::OptionOutOfRange { .. } => ErrorKind::OptionOutOfRange,
            LedgerError::DoubleVote { .. } => ErrorKind::DoubleVote,
            LedgerError::CorruptSnapshot(_) => ErrorKind::CorruptSnapshot,
            LedgerError::StorageError(_) => ErrorKind::Storage,
            LedgerError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this is a precondition failure of a ledger operation, as
    /// opposed to a persistence problem
    pub fn is_validation(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::CorruptSnapshot | ErrorKind::Storage | ErrorKind::Serialization
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = LedgerError::DoubleVote {
            proposal_id: 3,
            voter: Identity::from("m2"),
        };
        assert_eq!(err.kind(), ErrorKind::DoubleVote);
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "m2 already voted on proposal 3");

        let err = LedgerError::CorruptSnapshot("tally mismatch".into());
        assert!(!err.is_validation());
    }
}
