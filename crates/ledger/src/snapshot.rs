//! Serializable ledger snapshots
//!
//! A snapshot is only accepted back if it satisfies every ledger invariant,
//! so a hand-edited or truncated file cannot smuggle in extra votes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use ballot_common::config::MIN_OPTIONS;
use ballot_common::{Identity, Timestamp};

use crate::events::{EventLog, EventRecord};
use crate::state::{BallotBox, LedgerState, ProposalEntry};
use crate::types::{Ballot, Member, Proposal};
use crate::{LedgerError, LedgerResult};

/// Storage key the ledger snapshot is persisted under
pub const SNAPSHOT_KEY: &str = "ledger/snapshot";

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One proposal with its counters and ballots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub proposal: Proposal,
    pub tally: Vec<u64>,
    pub ballots: Vec<Ballot>,
}

/// Everything needed to rebuild a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub taken_at: Timestamp,
    pub members: Vec<Member>,
    pub proposals: Vec<ProposalSnapshot>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl LedgerSnapshot {
    /// Copy the current state.
    ///
    /// Events are read first and members last: every event in the snapshot
    /// has its effect in the copied state, and every creator and voter in the
    /// copied proposals is in the copied member list.
    pub(crate) async fn capture(
        state: &LedgerState,
        events: &EventLog,
        taken_at: Timestamp,
    ) -> Self {
        let events = events.since(0).await;

        let mut proposals = Vec::new();
        for entry in state.entries().await {
            let ballot_box = entry.ballot_box.read().await;
            let mut ballots: Vec<Ballot> = ballot_box.ballots.values().cloned().collect();
            ballots.sort_by(|a, b| a.cast_at.cmp(&b.cast_at).then_with(|| a.voter.cmp(&b.voter)));

            proposals.push(ProposalSnapshot {
                proposal: entry.proposal().clone(),
                tally: ballot_box.tally.clone(),
                ballots,
            });
        }

        let mut members: Vec<Member> = state.members.iter().map(|m| m.value().clone()).collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });

        Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            members,
            proposals,
            events,
        }
    }

    /// Pretty JSON form, as written to storage
    pub fn to_json(&self) -> LedgerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::SerializationError(e.to_string()))
    }

    /// Parse a snapshot from JSON; invariants are checked on restore
    pub fn from_json(json: &str) -> LedgerResult<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::SerializationError(e.to_string()))
    }

    /// Check every invariant a live ledger maintains.
    ///
    /// The configured option cap is not applied here: it limits new
    /// proposals, and proposals created under an older, looser cap stay valid.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }

        let mut members: HashSet<&Identity> = HashSet::new();
        for member in &self.members {
            if !members.insert(&member.identity) {
                return Err(corrupt(format!("duplicate member {}", member.identity)));
            }
        }

        for (index, snapshot) in self.proposals.iter().enumerate() {
            snapshot.validate(index as u64, &members)?;
        }

        for (index, record) in self.events.iter().enumerate() {
            if record.seq != index as u64 {
                return Err(corrupt(format!(
                    "event sequence gap: expected {}, found {}",
                    index, record.seq
                )));
            }
        }

        Ok(())
    }

    /// Validate and turn into live state plus event log
    pub(crate) fn into_parts(self, event_capacity: usize) -> LedgerResult<(LedgerState, EventLog)> {
        self.validate()?;

        let entries = self
            .proposals
            .into_iter()
            .map(|snapshot| {
                let option_count = snapshot.proposal.option_count;
                let mut ballot_box = BallotBox::empty(option_count);
                ballot_box.tally = snapshot.tally;
                ballot_box.ballots = snapshot
                    .ballots
                    .into_iter()
                    .map(|b| (b.voter.clone(), b))
                    .collect();
                ProposalEntry::new(snapshot.proposal, ballot_box)
            })
            .collect();

        let state = LedgerState::from_parts(self.members, entries);
        let events = EventLog::with_records(self.events, event_capacity);
        Ok((state, events))
    }
}

impl ProposalSnapshot {
    fn validate(&self, expected_id: u64, members: &HashSet<&Identity>) -> LedgerResult<()> {
        let proposal = &self.proposal;
        let id = proposal.id;

        if id != expected_id {
            return Err(corrupt(format!(
                "proposal ids must be dense: expected {}, found {}",
                expected_id, id
            )));
        }
        if proposal.option_count < MIN_OPTIONS {
            return Err(corrupt(format!(
                "proposal {} has {} options (at least {} required)",
                id, proposal.option_count, MIN_OPTIONS
            )));
        }
        if proposal.end_time <= proposal.created_at {
            return Err(corrupt(format!("proposal {} ends before it was created", id)));
        }
        if proposal.metadata_ref.is_empty() {
            return Err(corrupt(format!("proposal {} has no metadata reference", id)));
        }
        if !members.contains(&proposal.creator) {
            return Err(corrupt(format!(
                "proposal {} creator {} is not a member",
                id, proposal.creator
            )));
        }
        if self.tally.len() != proposal.option_count as usize {
            return Err(corrupt(format!(
                "proposal {} tally has {} counters for {} options",
                id,
                self.tally.len(),
                proposal.option_count
            )));
        }

        let mut counted = vec![0u64; self.tally.len()];
        let mut voters: HashSet<&Identity> = HashSet::new();
        for ballot in &self.ballots {
            if ballot.proposal_id != id {
                return Err(corrupt(format!(
                    "ballot by {} filed under proposal {} names proposal {}",
                    ballot.voter, id, ballot.proposal_id
                )));
            }
            if !voters.insert(&ballot.voter) {
                return Err(corrupt(format!(
                    "{} has more than one ballot on proposal {}",
                    ballot.voter, id
                )));
            }
            if !members.contains(&ballot.voter) {
                return Err(corrupt(format!(
                    "voter {} on proposal {} is not a member",
                    ballot.voter, id
                )));
            }
            if ballot.option >= proposal.option_count {
                return Err(corrupt(format!(
                    "ballot by {} on proposal {} picks option {} of {}",
                    ballot.voter, id, ballot.option, proposal.option_count
                )));
            }
            if ballot.cast_at >= proposal.end_time {
                return Err(corrupt(format!(
                    "ballot by {} on proposal {} cast after voting ended",
                    ballot.voter, id
                )));
            }
            counted[ballot.option as usize] += 1;
        }

        if counted != self.tally {
            return Err(corrupt(format!(
                "proposal {} tally {:?} does not match its ballots {:?}",
                id, self.tally, counted
            )));
        }

        Ok(())
    }
}

fn corrupt(msg: String) -> LedgerError {
    LedgerError::CorruptSnapshot(msg)
}
