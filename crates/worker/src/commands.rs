//! Job dispatch for the CLI subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use sparza_core::data_type::DataType;
use sparza_core::store::{RecordStore, RunStatus};
use sparza_core::tiers::TierBook;
use sparza_db::MongoRecordStore;
use sparza_llm::{build_client, LlmConfig};
use sparza_pipeline::assign::{assign_fields, AssignOptions};
use sparza_pipeline::batch::{BatchOptions, BatchRunner};
use sparza_pipeline::reset::reset_fields;
use sparza_pipeline::run_log::{RunLog, RunPaths};
use sparza_pipeline::tasks::{ClassifyTask, EnrichmentTask, GenerateTask};
use sparza_pipeline::verify::verify;
use tokio_util::sync::CancellationToken;

use crate::cli::{AssignArgs, Command, EnrichArgs, ResetArgs, VerifyArgs};
use crate::config::{check_concurrency, WorkerConfig};

/// Connect to MongoDB and run `command` to completion.
pub async fn execute(
    command: Command,
    config: &WorkerConfig,
    paths: RunPaths,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let db = sparza_db::connect(&config.mongo_uri, &config.database)
        .await
        .context("invalid MongoDB connection string")?;
    sparza_db::health_check(&db)
        .await
        .context("MongoDB is not reachable")?;
    tracing::info!(database = %config.database, "Connected to MongoDB");

    let store: Arc<dyn RecordStore> = Arc::new(MongoRecordStore::new(db));

    match command {
        Command::Classify(args) => {
            let task = ClassifyTask::new(args.data_type);
            enrich(store, &task, &args, config, paths, cancel).await
        }
        Command::Generate(args) => {
            let task = GenerateTask::new(args.data_type);
            enrich(store, &task, &args, config, paths, cancel).await
        }
        Command::Assign(args) => assign(store.as_ref(), &args, config, paths).await,
        Command::Reset(args) => reset(store.as_ref(), &args).await,
        Command::Verify(args) => verify_all(store.as_ref(), &args).await,
    }
}

async fn enrich(
    store: Arc<dyn RecordStore>,
    task: &dyn EnrichmentTask,
    args: &EnrichArgs,
    config: &WorkerConfig,
    paths: RunPaths,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let llm_config = LlmConfig::from_env()?;
    let llm = build_client(&llm_config)?;

    let concurrency = match args.concurrency {
        Some(n) => check_concurrency("--concurrency", usize::from(n))?,
        None => config.concurrency,
    };
    let options = BatchOptions {
        concurrency,
        batch_size: args.batch_size.map_or(config.batch_size, |n| n as usize),
        limit: args.limit,
        cache_path: (!args.no_cache).then(|| cache_path(&config.cache_dir, task)),
    };

    let run_log = Arc::new(RunLog::create(paths)?);
    let runner = BatchRunner::new(
        store,
        llm,
        llm_config.retry_policy(),
        options,
        run_log,
        cancel,
    );
    let summary = runner.run(task).await?;
    print_json(&summary)?;

    if summary.status == RunStatus::Cancelled {
        anyhow::bail!("{} run {} was interrupted", task.name(), summary.run_id);
    }
    Ok(())
}

fn cache_path(cache_dir: &Path, task: &dyn EnrichmentTask) -> std::path::PathBuf {
    cache_dir.join(format!("{}_{}.json", task.name(), task.data_type().as_str()))
}

async fn assign(
    store: &dyn RecordStore,
    args: &AssignArgs,
    config: &WorkerConfig,
    paths: RunPaths,
) -> anyhow::Result<()> {
    let book = match &args.tiers {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read tier book {}", path.display()))?;
            TierBook::from_json_str(&json)?
        }
        None => TierBook::default(),
    };

    let options = AssignOptions {
        seed: args.seed,
        overwrite: args.overwrite,
        dry_run: args.dry_run,
        batch_size: args.batch_size.map_or(config.batch_size, |n| n as usize),
    };
    let run_log = if args.dry_run {
        None
    } else {
        Some(RunLog::create(paths)?)
    };

    let report = assign_fields(store, args.data_type, &book, &options, run_log.as_ref()).await?;
    print_json(&report)?;

    if report.failed > 0 {
        anyhow::bail!("{} of {} assignments failed to write", report.failed, report.total);
    }
    Ok(())
}

async fn reset(store: &dyn RecordStore, args: &ResetArgs) -> anyhow::Result<()> {
    let report = reset_fields(store, args.data_type, args.scope, args.mode, args.dry_run).await?;
    print_json(&report)
}

async fn verify_all(store: &dyn RecordStore, args: &VerifyArgs) -> anyhow::Result<()> {
    let data_types: Vec<DataType> = match args.data_type {
        Some(dt) => vec![dt],
        None => DataType::ALL.to_vec(),
    };

    let mut reports = Vec::with_capacity(data_types.len());
    for data_type in data_types {
        reports.push(verify(store, data_type).await?);
    }
    print_json(&reports)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
