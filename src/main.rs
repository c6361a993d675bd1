//! Operator CLI for the hackathon chain core.
//!
//! Each subcommand runs one façade or verification call against the
//! configured node and prints the result as JSON.
//!
//! # Lifecycle
//!
//! ```text
//! config (TOML + env key) → logging / metrics → store snapshot → ChainContext
//!     → command → JSON on stdout
//!     → drain background confirmations → save store snapshot
//! ```

use alloy::primitives::TxHash;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hackathon_chain::chain::TxStatus;
use hackathon_chain::config::{load_config, parse_config, AppConfig};
use hackathon_chain::observability::{logging, metrics};
use hackathon_chain::{ChainContext, MemoryStore, OffChainStore};

#[derive(Parser)]
#[command(name = "hackathon-chain")]
#[command(about = "On-chain orchestration for hackathon events", long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "hackathon-chain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node, signer and contract overview
    Status,
    /// Three-way status of a transaction
    TxStatus { tx_hash: String },
    /// Block until a transaction is mined
    Wait {
        tx_hash: String,
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },

    CreateEvent { event_id: u64 },
    UpdateEvent { event_id: u64 },
    DeleteEvent { event_id: u64 },
    ActivateEvent { event_id: u64 },
    EndEvent { event_id: u64 },

    /// Register the event with the check-in registry
    RegisterCheckinEvent { event_id: u64 },
    /// Register the event with the NFT registry
    RegisterNftEvent { event_id: u64 },
    /// Authorize or revoke an organizer on both registries
    AuthorizeOrganizer {
        address: String,
        #[arg(long)]
        revoke: bool,
    },

    CheckIn { event_id: u64, participant_id: u64 },
    BatchCheckIn {
        event_id: u64,
        #[arg(required = true)]
        participant_ids: Vec<u64>,
    },
    CheckinStatus { event_id: u64, participant_id: u64 },
    /// Registry counters next to stored check-in rows
    CheckinSummary { event_id: u64 },

    Mint { event_id: u64, participant_id: u64 },
    /// Mint for every checked-in participant without an NFT
    BatchMint { event_id: u64 },
    NftStatus { event_id: u64, participant_id: u64 },
    NftSummary { event_id: u64 },

    Vote {
        event_id: u64,
        participant_id: u64,
        submission_id: u64,
        #[arg(long)]
        score: Option<u64>,
    },
    RevokeVote { participant_id: u64, submission_id: u64 },

    EstimateCheckin { event_id: u64, participant_id: u64 },
    EstimateVote { event_id: u64, participant_id: u64, submission_id: u64 },
    EstimateRevokeVote { participant_id: u64, submission_id: u64 },

    VerifyEvent { event_id: u64 },
    VerifyCheckin { event_id: u64, participant_id: u64 },
    VerifyVotes { event_id: u64 },
    VerifyAll { event_id: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(&cli.config)?;

    logging::init_logging(&config.observability);
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(match &config.store.path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => MemoryStore::new(None),
    });
    let drain_timeout = Duration::from_secs(config.confirmation.background_budget_secs);

    tracing::info!(
        rpc_url = %config.chain.rpc_url,
        chain_id = config.chain.chain_id,
        "hackathon-chain starting"
    );
    let ctx = ChainContext::connect(config, store.clone() as Arc<dyn OffChainStore>).await?;

    let outcome = run(&ctx, cli.command).await;

    ctx.drain(drain_timeout).await;
    store.save_to_file()?;
    outcome
}

fn read_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_config(path)?)
    } else {
        // Still applies the env key and validation.
        Ok(parse_config("")?)
    }
}

async fn run(ctx: &ChainContext, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Status => print_json(&ctx.chain_status().await?),
        Commands::TxStatus { tx_hash } => {
            let tx_hash: TxHash = tx_hash.parse()?;
            let status = ctx.tx_status(tx_hash).await?;
            let block_number = match &status {
                TxStatus::Mined(receipt) => Some(receipt.block_number),
                _ => None,
            };
            print_json(&json!({
                "tx_hash": tx_hash,
                "status": status.label(),
                "block_number": block_number,
            }))
        }
        Commands::Wait { tx_hash, timeout_secs } => {
            let receipt = ctx
                .tracker()
                .wait_for_receipt(tx_hash.parse()?, Duration::from_secs(timeout_secs))
                .await?;
            print_json(&receipt)
        }

        Commands::CreateEvent { event_id } => print_json(&ctx.events().create_event(event_id).await?),
        Commands::UpdateEvent { event_id } => print_json(&ctx.events().update_event(event_id).await?),
        Commands::DeleteEvent { event_id } => print_json(&ctx.events().delete_event(event_id).await?),
        Commands::ActivateEvent { event_id } => print_json(&ctx.events().activate_event(event_id).await?),
        Commands::EndEvent { event_id } => print_json(&ctx.events().end_event(event_id).await?),

        Commands::RegisterCheckinEvent { event_id } => {
            print_json(&ctx.checkins().register_event(event_id).await?)
        }
        Commands::RegisterNftEvent { event_id } => print_json(&ctx.nfts().register_event(event_id).await?),
        Commands::AuthorizeOrganizer { address, revoke } => {
            let checkins = ctx.checkins().authorize_organizer(&address, !revoke).await?;
            let nfts = ctx.nfts().authorize_organizer(&address, !revoke).await?;
            print_json(&json!({ "checkin_registry": checkins, "nft_registry": nfts }))
        }

        Commands::CheckIn { event_id, participant_id } => {
            print_json(&ctx.checkins().check_in(event_id, participant_id).await?)
        }
        Commands::BatchCheckIn { event_id, participant_ids } => {
            print_json(&ctx.checkins().batch_check_in(event_id, &participant_ids).await?)
        }
        Commands::CheckinStatus { event_id, participant_id } => {
            print_json(&ctx.checkins().check_in_status(event_id, participant_id).await?)
        }
        Commands::CheckinSummary { event_id } => print_json(&ctx.checkins().event_summary(event_id).await?),

        Commands::Mint { event_id, participant_id } => print_json(&ctx.nfts().mint(event_id, participant_id).await?),
        Commands::BatchMint { event_id } => print_json(&ctx.nfts().batch_mint_for_checked_in(event_id).await?),
        Commands::NftStatus { event_id, participant_id } => {
            print_json(&ctx.nfts().nft_status(event_id, participant_id).await?)
        }
        Commands::NftSummary { event_id } => print_json(&ctx.nfts().event_summary(event_id).await?),

        Commands::Vote {
            event_id,
            participant_id,
            submission_id,
            score,
        } => print_json(&ctx.votes().vote(event_id, participant_id, submission_id, score).await?),
        Commands::RevokeVote {
            participant_id,
            submission_id,
        } => print_json(&ctx.votes().revoke_vote(participant_id, submission_id).await?),

        Commands::EstimateCheckin { event_id, participant_id } => {
            print_json(&ctx.checkins().estimate_check_in_gas(event_id, participant_id).await?)
        }
        Commands::EstimateVote {
            event_id,
            participant_id,
            submission_id,
        } => print_json(
            &ctx.votes()
                .estimate_vote_gas(event_id, participant_id, submission_id)
                .await?,
        ),
        Commands::EstimateRevokeVote {
            participant_id,
            submission_id,
        } => print_json(
            &ctx.votes()
                .estimate_revoke_vote_gas(participant_id, submission_id)
                .await?,
        ),

        Commands::VerifyEvent { event_id } => print_json(&ctx.verifier().verify_event(event_id).await?),
        Commands::VerifyCheckin { event_id, participant_id } => {
            print_json(&ctx.verifier().verify_check_in(event_id, participant_id).await?)
        }
        Commands::VerifyVotes { event_id } => print_json(&ctx.verifier().verify_votes(event_id).await?),
        Commands::VerifyAll { event_id } => print_json(&ctx.verifier().verify_all(event_id).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
