//! Human-readable output for the `ballot` binary

use chrono::{TimeZone, Utc};

use ballot_common::{Identity, Timestamp};
use ballot_ledger::{
    Ballot, ErrorKind, LedgerError, LedgerStats, ProposalStatus, ProposalView,
};

/// Format a ledger timestamp as UTC
pub fn timestamp(secs: Timestamp) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("@{}", secs))
}

fn status(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Open => "open",
        ProposalStatus::Closed => "ended",
    }
}

/// One-line summary, as used by `list` and `dashboard`
pub fn summary(view: &ProposalView) -> String {
    let p = &view.proposal;
    format!(
        "#{:<4} {:<6} {:>4} ballots  ends {}  {}",
        p.id,
        status(view.status),
        view.total_ballots,
        timestamp(p.end_time),
        p.metadata_ref
    )
}

/// Full breakdown of one proposal
pub fn detail(view: &ProposalView) -> String {
    let p = &view.proposal;
    let mut out = format!(
        "Proposal #{}\n  metadata: {}\n  creator:  {}\n  created:  {}\n  ends:     {} ({})\n",
        p.id,
        p.metadata_ref,
        p.creator,
        timestamp(p.created_at),
        timestamp(p.end_time),
        status(view.status)
    );

    for (option, count) in view.tally.iter().enumerate() {
        let share = if view.total_ballots == 0 {
            0.0
        } else {
            *count as f64 * 100.0 / view.total_ballots as f64
        };
        out.push_str(&format!("  option {:>2}: {:>6}  ({:5.1}%)\n", option, count, share));
    }
    out.push_str(&format!("  total:     {:>6}", view.total_ballots));
    out
}

/// A member's dashboard: what they created and what they voted on
pub fn dashboard(
    identity: &Identity,
    joined_at: Timestamp,
    created: &[ProposalView],
    voted: &[(ProposalView, Ballot)],
) -> String {
    let mut out = format!(
        "Member {} (joined {})\n\nCreated ({}):\n",
        identity.short(),
        timestamp(joined_at),
        created.len()
    );
    if created.is_empty() {
        out.push_str("  none\n");
    }
    for view in created {
        out.push_str(&format!("  {}\n", summary(view)));
    }

    out.push_str(&format!("\nVoted ({}):\n", voted.len()));
    if voted.is_empty() {
        out.push_str("  none\n");
    }
    for (view, ballot) in voted {
        out.push_str(&format!(
            "  {}  (chose option {})\n",
            summary(view),
            ballot.option
        ));
    }
    out.trim_end().to_string()
}

pub fn stats(stats: &LedgerStats) -> String {
    format!(
        "members:          {}\nproposals:        {}\nactive proposals: {}\nballots:          {}",
        stats.members, stats.proposals, stats.active_proposals, stats.ballots
    )
}

/// Short advice for a rejected operation, or `None` for persistence failures
pub fn advice(err: &LedgerError) -> Option<String> {
    let hint = match err.kind() {
        ErrorKind::AlreadyMember => "you are already a member".to_string(),
        ErrorKind::NotMember => "join first with `ballot join <identity>`".to_string(),
        ErrorKind::InvalidOptionCount => match err {
            LedgerError::InvalidOptionCount { max, .. } => {
                format!("a proposal needs between 2 and {} options", max)
            }
            _ => "invalid option count".to_string(),
        },
        ErrorKind::InvalidEndTime => "the end time must be in the future".to_string(),
        ErrorKind::InvalidMetadata => "provide a non-empty --metadata reference".to_string(),
        ErrorKind::NotFound => "no proposal with that id; see `ballot list`".to_string(),
        ErrorKind::VotingEnded => "voting on this proposal has ended".to_string(),
        ErrorKind::OptionOutOfRange => match err {
            LedgerError::OptionOutOfRange { option_count, .. } => {
                format!("pick an option between 0 and {}", option_count.saturating_sub(1))
            }
            _ => "option out of range".to_string(),
        },
        ErrorKind::DoubleVote => "you already voted on this proposal".to_string(),
        ErrorKind::CorruptSnapshot | ErrorKind::Storage | ErrorKind::Serialization => {
            return None
        }
    };
    Some(format!("{} ({})", err, hint))
}
