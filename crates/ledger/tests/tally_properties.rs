//! Randomized operation sequences never break the tally invariants

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use ballot_common::{Clock, Identity, LedgerConfig, ManualClock, Timestamp};
use ballot_ledger::VotingLedger;

const NOW: Timestamp = 1_000;

#[derive(Debug, Clone)]
enum Op {
    Join(u8),
    Create { caller: u8, options: u32, lifetime: u64 },
    Vote { caller: u8, proposal: u64, option: u32 },
    Tick(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Join),
        (0u8..6, 0u32..13, 0u64..50).prop_map(|(caller, options, lifetime)| Op::Create {
            caller,
            options,
            lifetime,
        }),
        (0u8..6, 0u64..6, 0u32..12).prop_map(|(caller, proposal, option)| Op::Vote {
            caller,
            proposal,
            option,
        }),
        (0u64..20).prop_map(Op::Tick),
    ]
}

fn identity(n: u8) -> Identity {
    Identity::new(format!("member-{n}"))
}

async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let clock = Arc::new(ManualClock::new(NOW));
    let ledger = VotingLedger::with_clock(LedgerConfig::default(), clock.clone());
    let mut accepted_ballots: HashSet<(u8, u64)> = HashSet::new();

    for op in ops {
        match op {
            Op::Join(n) => {
                let _ = ledger.join(&identity(n)).await;
            }
            Op::Create { caller, options, lifetime } => {
                let end = clock.now() + lifetime;
                let _ = ledger.create_vote(&identity(caller), "ipfs/x", end, options).await;
            }
            Op::Vote { caller, proposal, option } => {
                if ledger.vote(&identity(caller), proposal, option).await.is_ok() {
                    prop_assert!(accepted_ballots.insert((caller, proposal)));
                }
            }
            Op::Tick(secs) => clock.advance(secs),
        }
    }

    let mut total = 0u64;
    for id in 0..ledger.votes_count().await {
        let record = ledger.get_vote(id).await.unwrap();
        let voters = accepted_ballots.iter().filter(|(_, p)| *p == id).count() as u64;
        prop_assert_eq!(record.tally.iter().sum::<u64>(), voters);
        total += voters;
    }
    prop_assert_eq!(ledger.stats().await.ballots, total);

    // The snapshot of any reachable state restores cleanly.
    let snapshot = ledger.snapshot().await;
    prop_assert!(snapshot.validate().is_ok());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tally_sums_match_accepted_ballots(ops in proptest::collection::vec(op(), 1..80)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops))?;
    }
}
