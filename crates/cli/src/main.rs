use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::debug;

use ballot_common::{init_logging, Identity, LedgerConfig, ProposalId, SystemClock};
use ballot_ledger::{LedgerError, ProposalFilter, VotingLedger};
use ballot_storage::{FileStorage, StorageOptions};

mod render;

#[derive(Parser)]
#[command(author, version, about = "Membership, proposals and one-vote-per-member ballots", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the ledger snapshot (overrides the config file)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an identity as a member
    Join {
        /// Identity to register
        identity: String,
    },
    /// Check whether an identity is a member
    IsMember { identity: String },
    /// Create a proposal
    #[command(group(ArgGroup::new("deadline").required(true).args(["end", "duration"])))]
    Create {
        /// Member creating the proposal
        #[arg(long)]
        caller: String,
        /// Reference to the off-ledger proposal document
        #[arg(long)]
        metadata: String,
        /// Absolute end time, seconds since the Unix epoch
        #[arg(long)]
        end: Option<u64>,
        /// Voting period in seconds from now
        #[arg(long)]
        duration: Option<u64>,
        /// Number of options
        #[arg(long)]
        options: u32,
    },
    /// Cast a ballot
    Vote {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        proposal: ProposalId,
        /// Zero-based option index
        #[arg(long)]
        option: u32,
    },
    /// Show one proposal with its tally
    Show {
        proposal: ProposalId,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List proposals
    List {
        /// Only proposals still accepting ballots
        #[arg(long, conflicts_with = "ended")]
        active: bool,
        /// Only proposals whose voting has ended
        #[arg(long)]
        ended: bool,
    },
    /// Check whether an identity voted on a proposal
    DidVote {
        identity: String,
        proposal: ProposalId,
    },
    /// Proposals a member created and voted on
    Dashboard { identity: String },
    /// Ledger-wide counters
    Stats,
    /// Print the event log as JSON lines
    Events {
        /// First sequence number to print
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Write the full snapshot as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Join { .. } | Commands::Create { .. } | Commands::Vote { .. }
        )
    }
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    }
    .apply_env()?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    Ok(config)
}

/// Turn a rejected ledger operation into a message the user can act on
fn explain(err: LedgerError) -> anyhow::Error {
    match render::advice(&err) {
        Some(message) => anyhow!(message),
        None => anyhow::Error::new(err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_level)?;

    if let Commands::Config { write } = &cli.command {
        match write {
            Some(path) => {
                config.save_to_file(path)?;
                println!("Wrote configuration to {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(&config)?),
        }
        return Ok(());
    }

    let storage = FileStorage::new(&config.data_dir)
        .await
        .with_context(|| format!("opening data directory {}", config.data_dir.display()))?
        .with_options(StorageOptions {
            sync_write: config.sync_writes,
            use_cache: true,
        });
    // Held from load to save so overlapping invocations cannot drop each
    // other's writes.
    let _lock = if cli.command.mutates() {
        Some(storage.lock().await.context("locking data directory")?)
    } else {
        None
    };
    let ledger = VotingLedger::load_from(config.clone(), Arc::new(SystemClock), &storage)
        .await
        .context("loading ledger")?;

    run(&ledger, &cli.command).await?;

    if cli.command.mutates() {
        ledger.save_to(&storage).await.context("saving ledger")?;
        debug!("Ledger saved to {}", config.data_dir.display());
    }
    Ok(())
}

async fn run(ledger: &VotingLedger, command: &Commands) -> Result<()> {
    match command {
        Commands::Join { identity } => {
            let member = ledger.join(&Identity::from(identity.as_str())).await.map_err(explain)?;
            println!(
                "{} joined at {} ({} members)",
                member.identity,
                render::timestamp(member.joined_at),
                ledger.member_count()
            );
        }
        Commands::IsMember { identity } => {
            println!("{}", ledger.is_member(&Identity::from(identity.as_str())));
        }
        Commands::Create {
            caller,
            metadata,
            end,
            duration,
            options,
        } => {
            let end_time = match (end, duration) {
                (Some(end), _) => *end,
                (None, Some(duration)) => ledger.now().saturating_add(*duration),
                (None, None) => bail!("either --end or --duration is required"),
            };
            let id = ledger
                .create_vote(&Identity::from(caller.as_str()), metadata, end_time, *options)
                .await
                .map_err(explain)?;
            println!("Created proposal #{} (voting ends {})", id, render::timestamp(end_time));
        }
        Commands::Vote {
            caller,
            proposal,
            option,
        } => {
            ledger
                .vote(&Identity::from(caller.as_str()), *proposal, *option)
                .await
                .map_err(explain)?;
            println!("Recorded vote for option {} on proposal #{}", option, proposal);
        }
        Commands::Show { proposal, json } => {
            let view = ledger.proposal(*proposal).await.map_err(explain)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", render::detail(&view));
            }
        }
        Commands::List { active, ended } => {
            let filter = if *active {
                ProposalFilter::Active
            } else if *ended {
                ProposalFilter::Ended
            } else {
                ProposalFilter::All
            };
            let views = ledger.list_proposals(filter).await;
            if views.is_empty() {
                println!("No proposals");
            }
            for view in &views {
                println!("{}", render::summary(view));
            }
        }
        Commands::DidVote { identity, proposal } => {
            println!(
                "{}",
                ledger.did_vote(&Identity::from(identity.as_str()), *proposal).await
            );
        }
        Commands::Dashboard { identity } => {
            let identity = Identity::from(identity.as_str());
            let member = ledger
                .member(&identity)
                .ok_or_else(|| explain(LedgerError::NotMember(identity.clone())))?;

            let mut created = Vec::new();
            for id in ledger.proposals_created_by(&identity).await {
                created.push(ledger.proposal(id).await?);
            }
            let mut voted = Vec::new();
            for id in ledger.proposals_voted_by(&identity).await {
                if let Some(ballot) = ledger.ballot(&identity, id).await {
                    voted.push((ledger.proposal(id).await?, ballot));
                }
            }
            println!(
                "{}",
                render::dashboard(&identity, member.joined_at, &created, &voted)
            );
        }
        Commands::Stats => {
            println!("{}", render::stats(&ledger.stats().await));
        }
        Commands::Events { since } => {
            for record in ledger.events_since(*since).await {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Commands::Export { output } => {
            let json = ledger.snapshot().await.to_json()?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, json)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Exported snapshot to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Config { .. } => {}
    }
    Ok(())
}
