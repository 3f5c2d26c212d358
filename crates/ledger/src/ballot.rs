//! Ballot engine
//!
//! `vote` validates and commits under the proposal's own ballot-box lock, so
//! two votes on the same proposal are linearized while votes on different
//! proposals run in parallel. The tally increment, the ballot insert and the
//! `Voted` event all happen under that one lock.

use std::sync::Arc;

use tracing::{info, warn};

use ballot_common::{Clock, Identity, ProposalId};

use crate::events::{EventLog, LedgerEvent};
use crate::membership::MembershipRegistry;
use crate::state::LedgerState;
use crate::types::Ballot;
use crate::{LedgerError, LedgerResult};

/// Validates and records votes
#[derive(Clone)]
pub struct BallotEngine {
    state: Arc<LedgerState>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    registry: MembershipRegistry,
}

impl BallotEngine {
    pub fn new(
        state: Arc<LedgerState>,
        clock: Arc<dyn Clock>,
        events: Arc<EventLog>,
        registry: MembershipRegistry,
    ) -> Self {
        Self {
            state,
            clock,
            events,
            registry,
        }
    }

    /// Cast `caller`'s single ballot on `proposal_id`
    pub async fn vote(
        &self,
        caller: &Identity,
        proposal_id: ProposalId,
        option: u32,
    ) -> LedgerResult<Ballot> {
        match self.try_vote(caller, proposal_id, option).await {
            Ok(ballot) => Ok(ballot),
            Err(e) => {
                warn!("Rejected vote from {}: {}", caller.short(), e);
                Err(e)
            }
        }
    }

    async fn try_vote(
        &self,
        caller: &Identity,
        proposal_id: ProposalId,
        option: u32,
    ) -> LedgerResult<Ballot> {
        self.registry.require_member(caller)?;

        let entry = self
            .state
            .entry(proposal_id)
            .await
            .ok_or(LedgerError::NotFound(proposal_id))?;
        let proposal = entry.proposal();

        let mut ballot_box = entry.ballot_box.write().await;

        let now = self.clock.now();
        if !proposal.is_open(now) {
            return Err(LedgerError::VotingEnded {
                proposal_id,
                end_time: proposal.end_time,
            });
        }

        if option >= proposal.option_count {
            return Err(LedgerError::OptionOutOfRange {
                proposal_id,
                option,
                option_count: proposal.option_count,
            });
        }

        if ballot_box.ballots.contains_key(caller) {
            return Err(LedgerError::DoubleVote {
                proposal_id,
                voter: caller.clone(),
            });
        }

        let ballot = Ballot {
            proposal_id,
            voter: caller.clone(),
            option,
            cast_at: now,
        };
        ballot_box.tally[option as usize] += 1;
        ballot_box.ballots.insert(caller.clone(), ballot.clone());

        self.events
            .append(LedgerEvent::Voted {
                proposal_id,
                voter: caller.clone(),
                option,
                cast_at: now,
            })
            .await;
        drop(ballot_box);

        info!(
            "{} voted for option {} on proposal {}",
            caller.short(),
            option,
            proposal_id
        );
        Ok(ballot)
    }

    /// Whether `identity` holds a ballot on `proposal_id`.
    ///
    /// Unknown proposals answer `false` rather than failing.
    pub async fn did_vote(&self, identity: &Identity, proposal_id: ProposalId) -> bool {
        self.ballot(identity, proposal_id).await.is_some()
    }

    /// The ballot `identity` cast on `proposal_id`, if any
    pub async fn ballot(&self, identity: &Identity, proposal_id: ProposalId) -> Option<Ballot> {
        let entry = self.state.entry(proposal_id).await?;
        let ballot_box = entry.ballot_box.read().await;
        ballot_box.ballots.get(identity).cloned()
    }

    /// Ids of proposals `identity` has voted on, in id order
    pub async fn proposals_voted_by(&self, identity: &Identity) -> Vec<ProposalId> {
        let mut ids = Vec::new();
        for entry in self.state.entries().await {
            if entry.ballot_box.read().await.ballots.contains_key(identity) {
                ids.push(entry.proposal().id);
            }
        }
        ids
    }

    /// All ballots on a proposal, ordered by cast time then voter
    pub async fn ballots(&self, proposal_id: ProposalId) -> LedgerResult<Vec<Ballot>> {
        let entry = self
            .state
            .entry(proposal_id)
            .await
            .ok_or(LedgerError::NotFound(proposal_id))?;
        let ballot_box = entry.ballot_box.read().await;

        let mut ballots: Vec<Ballot> = ballot_box.ballots.values().cloned().collect();
        ballots.sort_by(|a, b| a.cast_at.cmp(&b.cast_at).then_with(|| a.voter.cmp(&b.voter)));
        Ok(ballots)
    }

    /// Total ballots across all proposals
    pub async fn ballot_count(&self) -> u64 {
        let mut total = 0;
        for entry in self.state.entries().await {
            total += entry.ballot_box.read().await.total();
        }
        total
    }
}
