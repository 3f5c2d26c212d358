//! Common types and utilities for the ballot ledger
//!
//! Everything in here is shared by the storage, ledger and CLI crates:
//! identities, the injectable clock, configuration and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;
pub mod types;

pub use config::LedgerConfig;
pub use logging::init_logging;
pub use error::{ConfigError, ConfigResult};
pub use time::{timestamp_secs, Clock, ManualClock, SystemClock};
pub use types::{Identity, ProposalId, Timestamp};
