//! Proposal store
//!
//! Owns the sequential id space. An id is handed out only after every check
//! has passed, so rejected creations never leave gaps.

use std::sync::Arc;

use tracing::{debug, info, warn};

use ballot_common::config::MIN_OPTIONS;
use ballot_common::{Clock, Identity, ProposalId, Timestamp};

use crate::events::{EventLog, LedgerEvent};
use crate::membership::MembershipRegistry;
use crate::state::{BallotBox, LedgerState, ProposalEntry};
use crate::types::{Proposal, ProposalFilter, ProposalView, VoteRecord};
use crate::{LedgerError, LedgerResult};

/// Creates and exposes proposals
#[derive(Clone)]
pub struct ProposalStore {
    state: Arc<LedgerState>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    registry: MembershipRegistry,
    max_options: u32,
}

impl ProposalStore {
    /// Create a store; `max_options` is the deployment's option-count cap
    pub fn new(
        state: Arc<LedgerState>,
        clock: Arc<dyn Clock>,
        events: Arc<EventLog>,
        registry: MembershipRegistry,
        max_options: u32,
    ) -> Self {
        Self {
            state,
            clock,
            events,
            registry,
            max_options,
        }
    }

    /// The configured option-count cap
    pub fn max_options(&self) -> u32 {
        self.max_options
    }

    /// Create a proposal and return its id
    pub async fn create_vote(
        &self,
        caller: &Identity,
        metadata_ref: &str,
        end_time: Timestamp,
        option_count: u32,
    ) -> LedgerResult<ProposalId> {
        match self.try_create(caller, metadata_ref, end_time, option_count).await {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!("Rejected proposal from {}: {}", caller.short(), e);
                Err(e)
            }
        }
    }

    async fn try_create(
        &self,
        caller: &Identity,
        metadata_ref: &str,
        end_time: Timestamp,
        option_count: u32,
    ) -> LedgerResult<ProposalId> {
        self.registry.require_member(caller)?;

        if option_count < MIN_OPTIONS || option_count > self.max_options {
            return Err(LedgerError::InvalidOptionCount {
                count: option_count,
                max: self.max_options,
            });
        }

        let mut proposals = self.state.proposals.write().await;

        let now = self.clock.now();
        if end_time <= now {
            return Err(LedgerError::InvalidEndTime { end_time, now });
        }

        if metadata_ref.is_empty() {
            return Err(LedgerError::InvalidMetadata);
        }

        let proposal = Proposal {
            id: proposals.len() as ProposalId,
            creator: caller.clone(),
            metadata_ref: metadata_ref.to_string(),
            option_count,
            end_time,
            created_at: now,
        };
        let id = proposal.id;

        proposals.push(Arc::new(ProposalEntry::new(
            proposal,
            BallotBox::empty(option_count),
        )));

        // Appended under the arena lock so creation events stay in id order.
        self.events
            .append(LedgerEvent::VoteCreated {
                proposal_id: id,
                creator: caller.clone(),
                option_count,
                end_time,
                created_at: now,
            })
            .await;

        info!(
            "Proposal {} created by {} ({} options, ends at {})",
            id,
            caller.short(),
            option_count,
            end_time
        );
        Ok(id)
    }

    /// Metadata reference, creator, tally snapshot and end time of a proposal
    pub async fn get_vote(&self, id: ProposalId) -> LedgerResult<VoteRecord> {
        let entry = self.state.entry(id).await.ok_or(LedgerError::NotFound(id))?;
        let proposal = entry.proposal();

        Ok(VoteRecord {
            metadata_ref: proposal.metadata_ref.clone(),
            creator: proposal.creator.clone(),
            tally: entry.tally().await,
            end_time: proposal.end_time,
        })
    }

    /// Full view of a proposal, with status computed now
    pub async fn proposal(&self, id: ProposalId) -> LedgerResult<ProposalView> {
        let entry = self.state.entry(id).await.ok_or(LedgerError::NotFound(id))?;
        Ok(entry.view(self.clock.now()).await)
    }

    /// Whether the proposal accepts ballots right now
    pub async fn is_open(&self, id: ProposalId) -> LedgerResult<bool> {
        let entry = self.state.entry(id).await.ok_or(LedgerError::NotFound(id))?;
        Ok(entry.proposal().is_open(self.clock.now()))
    }

    /// Total proposals ever created
    pub async fn votes_count(&self) -> u64 {
        self.state.proposals.read().await.len() as u64
    }

    /// Proposals whose end time is still in the future
    pub async fn active_votes_count(&self) -> u64 {
        let now = self.clock.now();
        let proposals = self.state.proposals.read().await;
        proposals
            .iter()
            .filter(|entry| entry.proposal().is_open(now))
            .count() as u64
    }

    /// Views of all proposals matching `filter`, in id order
    pub async fn list_proposals(&self, filter: ProposalFilter) -> Vec<ProposalView> {
        let now = self.clock.now();
        let mut views = Vec::new();
        for entry in self.state.entries().await {
            if filter.matches(entry.proposal().status(now)) {
                views.push(entry.view(now).await);
            }
        }
        debug!("Listed {} proposals ({:?})", views.len(), filter);
        views
    }

    /// Ids of proposals created by `creator`
    pub async fn proposals_created_by(&self, creator: &Identity) -> Vec<ProposalId> {
        let proposals = self.state.proposals.read().await;
        proposals
            .iter()
            .map(|entry| entry.proposal())
            .filter(|proposal| &proposal.creator == creator)
            .map(|proposal| proposal.id)
            .collect()
    }
}
