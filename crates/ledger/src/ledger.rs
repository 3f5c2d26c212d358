//! The assembled ledger
//!
//! [`VotingLedger`] wires the registry, proposal store and ballot engine to
//! one shared state, one clock and one event log, and moves the whole thing
//! in and out of storage.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use ballot_common::{Clock, Identity, LedgerConfig, ProposalId, SystemClock, Timestamp};
use ballot_storage::{JsonStorage, Storage};

use crate::ballot::BallotEngine;
use crate::events::{EventLog, EventRecord};
use crate::membership::MembershipRegistry;
use crate::proposals::ProposalStore;
use crate::snapshot::{LedgerSnapshot, SNAPSHOT_KEY};
use crate::state::LedgerState;
use crate::types::{Ballot, LedgerStats, Member, ProposalFilter, ProposalView, VoteRecord};
use crate::LedgerResult;

/// Membership, proposals and ballots behind one handle
pub struct VotingLedger {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    state: Arc<LedgerState>,
    events: Arc<EventLog>,
    registry: MembershipRegistry,
    proposals: ProposalStore,
    ballots: BallotEngine,
}

impl VotingLedger {
    /// An empty ledger on the system clock
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// An empty ledger on the given clock
    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let events = Arc::new(EventLog::new(config.event_capacity));
        Self::from_state(config, clock, Arc::new(LedgerState::new()), events)
    }

    /// Assemble a ledger around existing state
    pub fn from_state(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        state: Arc<LedgerState>,
        events: Arc<EventLog>,
    ) -> Self {
        let registry = MembershipRegistry::new(state.clone(), clock.clone(), events.clone());
        let proposals = ProposalStore::new(
            state.clone(),
            clock.clone(),
            events.clone(),
            registry.clone(),
            config.max_options,
        );
        let ballots = BallotEngine::new(
            state.clone(),
            clock.clone(),
            events.clone(),
            registry.clone(),
        );

        Self {
            config,
            clock,
            state,
            events,
            registry,
            proposals,
            ballots,
        }
    }

    /// Rebuild a ledger from a snapshot, rejecting it if any invariant fails
    pub fn restore(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        snapshot: LedgerSnapshot,
    ) -> LedgerResult<Self> {
        let (state, events) = snapshot.into_parts(config.event_capacity)?;
        Ok(Self::from_state(config, clock, Arc::new(state), Arc::new(events)))
    }

    /// Load the ledger persisted in `storage`, or start empty if none is
    pub async fn load_from<S>(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        storage: &S,
    ) -> LedgerResult<Self>
    where
        S: Storage + ?Sized,
    {
        match storage.try_get_json::<LedgerSnapshot>(SNAPSHOT_KEY).await? {
            Some(snapshot) => {
                let ledger = Self::restore(config, clock, snapshot)?;
                let proposals = ledger.votes_count().await;
                info!(
                    "Loaded ledger: {} members, {} proposals",
                    ledger.member_count(),
                    proposals
                );
                Ok(ledger)
            }
            None => {
                debug!("No snapshot at {}, starting empty ledger", SNAPSHOT_KEY);
                Ok(Self::with_clock(config, clock))
            }
        }
    }

    /// Persist a snapshot of the current state to `storage`
    pub async fn save_to<S>(&self, storage: &S) -> LedgerResult<()>
    where
        S: Storage + ?Sized,
    {
        let snapshot = self.snapshot().await;
        storage.put_json(SNAPSHOT_KEY, &snapshot).await?;
        debug!(
            "Saved snapshot with {} proposals and {} events",
            snapshot.proposals.len(),
            snapshot.events.len()
        );
        Ok(())
    }

    /// Copy the current state
    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(&self.state, &self.events, self.clock.now()).await
    }

    /// The shared store behind all three components
    pub fn state(&self) -> &Arc<LedgerState> {
        &self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current time according to the ledger's clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn registry(&self) -> &MembershipRegistry {
        &self.registry
    }

    pub fn proposals(&self) -> &ProposalStore {
        &self.proposals
    }

    pub fn ballots(&self) -> &BallotEngine {
        &self.ballots
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // Membership

    pub async fn join(&self, caller: &Identity) -> LedgerResult<Member> {
        self.registry.join(caller).await
    }

    pub fn is_member(&self, identity: &Identity) -> bool {
        self.registry.is_member(identity)
    }

    pub fn member(&self, identity: &Identity) -> Option<Member> {
        self.registry.member(identity)
    }

    pub fn member_count(&self) -> u64 {
        self.registry.member_count()
    }

    // Proposals

    pub async fn create_vote(
        &self,
        caller: &Identity,
        metadata_ref: &str,
        end_time: Timestamp,
        option_count: u32,
    ) -> LedgerResult<ProposalId> {
        self.proposals
            .create_vote(caller, metadata_ref, end_time, option_count)
            .await
    }

    pub async fn get_vote(&self, id: ProposalId) -> LedgerResult<VoteRecord> {
        self.proposals.get_vote(id).await
    }

    pub async fn proposal(&self, id: ProposalId) -> LedgerResult<ProposalView> {
        self.proposals.proposal(id).await
    }

    pub async fn is_open(&self, id: ProposalId) -> LedgerResult<bool> {
        self.proposals.is_open(id).await
    }

    pub async fn votes_count(&self) -> u64 {
        self.proposals.votes_count().await
    }

    pub async fn active_votes_count(&self) -> u64 {
        self.proposals.active_votes_count().await
    }

    pub async fn list_proposals(&self, filter: ProposalFilter) -> Vec<ProposalView> {
        self.proposals.list_proposals(filter).await
    }

    pub async fn proposals_created_by(&self, creator: &Identity) -> Vec<ProposalId> {
        self.proposals.proposals_created_by(creator).await
    }

    // Ballots

    pub async fn vote(
        &self,
        caller: &Identity,
        proposal_id: ProposalId,
        option: u32,
    ) -> LedgerResult<Ballot> {
        self.ballots.vote(caller, proposal_id, option).await
    }

    pub async fn did_vote(&self, identity: &Identity, proposal_id: ProposalId) -> bool {
        self.ballots.did_vote(identity, proposal_id).await
    }

    pub async fn ballot(&self, identity: &Identity, proposal_id: ProposalId) -> Option<Ballot> {
        self.ballots.ballot(identity, proposal_id).await
    }

    pub async fn proposals_voted_by(&self, identity: &Identity) -> Vec<ProposalId> {
        self.ballots.proposals_voted_by(identity).await
    }

    // Events

    /// Follow events committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    /// Replay the event log from `seq`
    pub async fn events_since(&self, seq: u64) -> Vec<EventRecord> {
        self.events.since(seq).await
    }

    /// Ledger-wide counters
    pub async fn stats(&self) -> LedgerStats {
        LedgerStats {
            members: self.member_count(),
            proposals: self.votes_count().await,
            active_proposals: self.active_votes_count().await,
            ballots: self.ballots.ballot_count().await,
        }
    }
}
