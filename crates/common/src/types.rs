//! Identity and id types used by the ledger

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequential proposal identifier, assigned from 0 upwards
pub type ProposalId = u64;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// An already-authenticated caller identity.
///
/// The ledger never interprets the contents; it is an opaque, address-like
/// key compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a raw identity string
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }

    /// The raw identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines, e.g. `0x1234...abcd`
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
