//! Membership registry
//!
//! Membership is append-only: an identity joins at most once and is never
//! removed, so "is a member" can only flip from false to true.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use ballot_common::{Clock, Identity};

use crate::events::{EventLog, LedgerEvent};
use crate::state::LedgerState;
use crate::types::Member;
use crate::{LedgerError, LedgerResult};

/// Tracks which identities are members
#[derive(Clone)]
pub struct MembershipRegistry {
    state: Arc<LedgerState>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
}

impl MembershipRegistry {
    /// Create a registry over the given state
    pub fn new(state: Arc<LedgerState>, clock: Arc<dyn Clock>, events: Arc<EventLog>) -> Self {
        Self {
            state,
            clock,
            events,
        }
    }

    /// Register `caller` as a member
    pub async fn join(&self, caller: &Identity) -> LedgerResult<Member> {
        let (member, member_count) = match self.state.members.entry(caller.clone()) {
            Entry::Occupied(_) => {
                warn!("Rejected join from {}: already a member", caller.short());
                return Err(LedgerError::AlreadyMember(caller.clone()));
            }
            Entry::Vacant(slot) => {
                let member = Member {
                    identity: caller.clone(),
                    joined_at: self.clock.now(),
                };
                slot.insert(member.clone());
                let count = self.state.member_count.fetch_add(1, Ordering::SeqCst) + 1;
                (member, count)
            }
        };

        self.events
            .append(LedgerEvent::MemberJoined {
                member: member.identity.clone(),
                joined_at: member.joined_at,
                member_count,
            })
            .await;

        info!("Member {} joined ({} members)", caller.short(), member_count);
        Ok(member)
    }

    /// Whether `identity` has joined
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.state.members.contains_key(identity)
    }

    /// The member record for `identity`, if it has joined
    pub fn member(&self, identity: &Identity) -> Option<Member> {
        self.state.members.get(identity).map(|m| m.value().clone())
    }

    /// Current number of members
    pub fn member_count(&self) -> u64 {
        self.state.member_total()
    }

    /// All members, ordered by join time then identity
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .state
            .members
            .iter()
            .map(|m| m.value().clone())
            .collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        debug!("Listed {} members", members.len());
        members
    }

    /// Fail with `NotMember` unless `identity` has joined
    pub(crate) fn require_member(&self, identity: &Identity) -> LedgerResult<()> {
        if self.is_member(identity) {
            Ok(())
        } else {
            Err(LedgerError::NotMember(identity.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_common::ManualClock;

    fn registry() -> (MembershipRegistry, Arc<EventLog>) {
        let events = Arc::new(EventLog::new(16));
        let registry = MembershipRegistry::new(
            Arc::new(LedgerState::new()),
            Arc::new(ManualClock::new(1_000)),
            events.clone(),
        );
        (registry, events)
    }

    #[tokio::test]
    async fn test_join_once() {
        let (registry, events) = registry();
        let m1 = Identity::from("m1");

        assert!(!registry.is_member(&m1));
        let member = registry.join(&m1).await.unwrap();
        assert_eq!(member.joined_at, 1_000);
        assert!(registry.is_member(&m1));
        assert_eq!(registry.member_count(), 1);

        let err = registry.join(&m1).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyMember(ref id) if id == &m1));
        assert_eq!(registry.member_count(), 1);

        // The failed join left no trace in the log.
        assert_eq!(events.len().await, 1);
    }

    #[tokio::test]
    async fn test_member_joined_event_carries_count() {
        let (registry, events) = registry();
        registry.join(&Identity::from("a")).await.unwrap();
        registry.join(&Identity::from("b")).await.unwrap();

        let records = events.since(0).await;
        assert_eq!(
            records[1].event,
            LedgerEvent::MemberJoined {
                member: Identity::from("b"),
                joined_at: 1_000,
                member_count: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_member_lookup() {
        let (registry, _) = registry();
        let m = Identity::from("m");
        assert!(registry.member(&m).is_none());
        assert!(registry.require_member(&m).is_err());

        registry.join(&m).await.unwrap();
        assert_eq!(registry.member(&m).unwrap().identity, m);
        assert!(registry.require_member(&m).is_ok());
        assert_eq!(registry.members().len(), 1);
    }
}
