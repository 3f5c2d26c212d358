//! Ballot
//!
//! A cooperative ballot ledger: members join once, create proposals with a
//! fixed number of options and a deadline, and cast at most one ballot per
//! proposal while voting is open.

/// Module version information
pub mod version {
    /// The current version of the ballot library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub use ballot_common as common;
pub use ballot_ledger as ledger;
pub use ballot_storage as storage;

pub use ballot_common::{Clock, Identity, LedgerConfig, ManualClock, ProposalId, SystemClock, Timestamp};
pub use ballot_ledger::{
    Ballot, ErrorKind, LedgerError, LedgerEvent, LedgerResult, LedgerSnapshot, LedgerStats,
    Member, ProposalFilter, ProposalStatus, ProposalView, VoteRecord, VotingLedger,
};
