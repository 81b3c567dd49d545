//! Command-line interface.
//!
//! Usage:
//!   sparza-worker classify --data-type email [--limit N] [--concurrency N] [--batch-size N] [--no-cache]
//!   sparza-worker generate --data-type ticket
//!   sparza-worker assign --data-type chat [--tiers book.json] [--seed N] [--overwrite] [--dry-run]
//!   sparza-worker reset --data-type voice --scope generated [--mode partial|any] [--dry-run]
//!   sparza-worker verify [--data-type socialmedia]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sparza_core::data_type::DataType;
use sparza_pipeline::reset::{ResetMode, ResetScope};

#[derive(Debug, Parser)]
#[command(name = "sparza-worker")]
#[command(about = "Batch enrichment jobs for the Sparza banking dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assign dominant topics and subtopics with the LLM
    Classify(EnrichArgs),
    /// Generate content, summary and sentiment for classified records
    Generate(EnrichArgs),
    /// Assign priority, urgency and follow-up fields from tier tables
    Assign(AssignArgs),
    /// Unset fields on partially processed records
    Reset(ResetArgs),
    /// Report how complete each collection is
    Verify(VerifyArgs),
}

impl Command {
    /// Task name used in log file names.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Classify(_) => "classify",
            Command::Generate(_) => "generate",
            Command::Assign(_) => "assign",
            Command::Reset(_) => "reset",
            Command::Verify(_) => "verify",
        }
    }

    /// Whether the job stops cleanly on SIGINT/SIGTERM. Other jobs keep the
    /// default signal behaviour and exit immediately.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Command::Classify(_) | Command::Generate(_))
    }

    /// Data type the command runs on, or `all`.
    pub fn scope(&self) -> &'static str {
        let data_type = match self {
            Command::Classify(args) | Command::Generate(args) => Some(args.data_type),
            Command::Assign(args) => Some(args.data_type),
            Command::Reset(args) => Some(args.data_type),
            Command::Verify(args) => args.data_type,
        };
        data_type.map_or("all", |dt| dt.as_str())
    }
}

#[derive(Debug, Args)]
pub struct EnrichArgs {
    /// email, ticket, chat, voice or socialmedia
    #[arg(long)]
    pub data_type: DataType,

    /// Process at most N records
    #[arg(long)]
    pub limit: Option<u64>,

    /// Records in flight at once (default: WORKER_CONCURRENCY)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub concurrency: Option<u16>,

    /// Updates per bulk write (default: BATCH_SIZE)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Do not read or write the intermediate results file
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    #[arg(long)]
    pub data_type: DataType,

    /// JSON tier book (default: built-in tables)
    #[arg(long)]
    pub tiers: Option<PathBuf>,

    /// Seed for the per-topic shuffle
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Reassign records that already have a priority
    #[arg(long)]
    pub overwrite: bool,

    /// Report the assignment without writing it
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[arg(long)]
    pub data_type: DataType,

    /// classification, generated, assigned or all
    #[arg(long)]
    pub scope: ResetScope,

    /// partial: only partially filled records; any: every record with a field of the scope
    #[arg(long, default_value = "partial")]
    pub mode: ResetMode,

    /// Count matching records without unsetting anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Verify one data type (default: all)
    #[arg(long)]
    pub data_type: Option<DataType>,
}
