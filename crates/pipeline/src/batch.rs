//! The batch-retry-bulk-write loop shared by every LLM enrichment job.
//!
//! Records are fetched once, processed with bounded concurrency, staged
//! into batches and written with [`write_updates`]. Record-level failures
//! are logged and counted; only a failed fetch aborts the run.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, StreamExt};
use sparza_core::progress::RunCounters;
use sparza_core::retry::RetryPolicy;
use sparza_core::store::{FieldUpdate, RecordStore, RunStatus, RunSummary};
use sparza_core::types::{Fields, Record};
use sparza_llm::{complete_json, LlmClient, LlmError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::IntermediateResults;
use crate::error::PipelineError;
use crate::run_log::{FailureStage, RunLog};
use crate::run_record::RunRecorder;
use crate::tasks::EnrichmentTask;
use crate::writer::write_updates;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const MAX_CONCURRENCY: usize = 64;
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Records in flight at once, clamped to `1..=64`.
    pub concurrency: usize,
    /// Staged updates per bulk write.
    pub batch_size: usize,
    /// Process at most this many records.
    pub limit: Option<u64>,
    /// Intermediate results file; `None` disables caching.
    pub cache_path: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
            cache_path: None,
        }
    }
}

/// Runs one [`EnrichmentTask`] over its pending records.
pub struct BatchRunner {
    store: Arc<dyn RecordStore>,
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
    options: BatchOptions,
    run_log: Arc<RunLog>,
    cancel: CancellationToken,
}

/// Per-run state shared by the workers.
struct RunState {
    counters: RunCounters,
    cache: Option<Mutex<IntermediateResults>>,
}

impl RunState {
    fn cache(&self) -> Option<MutexGuard<'_, IntermediateResults>> {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        llm: Arc<dyn LlmClient>,
        policy: RetryPolicy,
        options: BatchOptions,
        run_log: Arc<RunLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            llm,
            policy,
            options,
            run_log,
            cancel,
        }
    }

    pub async fn run(&self, task: &dyn EnrichmentTask) -> Result<RunSummary, PipelineError> {
        let data_type = task.data_type();
        let recorder = RunRecorder::start(self.store.as_ref(), task.name(), data_type).await?;
        let counters = RunCounters::new();

        let records = match self
            .store
            .find(data_type, &task.pending_filter(), self.options.limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(data_type = %data_type, error = %e, "Failed to fetch pending records");
                recorder.finish(RunStatus::Failed, &counters.snapshot()).await;
                return Err(e.into());
            }
        };

        let cache = match self.options.cache_path.as_ref().map(IntermediateResults::open) {
            None => None,
            Some(Ok(cache)) => Some(Mutex::new(cache)),
            Some(Err(e)) => {
                recorder.finish(RunStatus::Failed, &counters.snapshot()).await;
                return Err(e.into());
            }
        };
        let state = RunState { counters, cache };
        state.counters.set_total(records.len() as u64);

        let concurrency = self.options.concurrency.clamp(1, MAX_CONCURRENCY);
        let batch_size = self.options.batch_size.max(1);
        tracing::info!(
            run_id = recorder.run_id(),
            task = task.name(),
            data_type = %data_type,
            total = records.len(),
            concurrency,
            batch_size,
            "Processing pending records",
        );

        // Records keep flowing through the LLM stage while a batch is being
        // written; the writer side drains the channel.
        let (tx, mut rx) = mpsc::unbounded_channel::<FieldUpdate>();
        let state_ref = &state;

        let produce = async move {
            let mut results = stream::iter(records)
                .map(|record| self.process(task, record, state_ref))
                .buffer_unordered(concurrency);
            while let Some(update) = results.next().await {
                if let Some(update) = update {
                    if tx.send(update).is_err() {
                        break;
                    }
                }
            }
        };

        let consume = async {
            let mut staged: Vec<FieldUpdate> = Vec::with_capacity(batch_size);
            while let Some(update) = rx.recv().await {
                staged.push(update);
                if staged.len() >= batch_size {
                    self.flush(task, std::mem::take(&mut staged), state_ref).await;
                }
            }
            self.flush(task, staged, state_ref).await;
        };

        tokio::join!(produce, consume);

        if let Some(mut cache) = state.cache() {
            if let Err(e) = cache.persist() {
                tracing::warn!(error = %e, "Failed to persist intermediate results");
            }
        }

        let status = if self.cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        let snapshot = state.counters.snapshot();
        self.run_log.write_progress(&snapshot);
        Ok(recorder.finish(status, &snapshot).await)
    }

    /// LLM stage for one record. Returns the update to stage, or `None`
    /// when the record was skipped or failed.
    async fn process(
        &self,
        task: &dyn EnrichmentTask,
        record: Record,
        state: &RunState,
    ) -> Option<FieldUpdate> {
        if self.cancel.is_cancelled() {
            state.counters.add_skipped(1);
            return None;
        }

        let cached = state
            .cache()
            .and_then(|cache| cache.get(&record.id).map(|c| c.fields.clone()));

        let response: Fields = match cached {
            Some(fields) => {
                tracing::debug!(id = %record.id, "Using cached result");
                fields
            }
            None => {
                let Some(prompt) = task.build_prompt(&record) else {
                    tracing::debug!(id = %record.id, "Record has no input, skipping");
                    state.counters.add_skipped(1);
                    return None;
                };

                let keys = task.required_keys();
                match complete_json(self.llm.as_ref(), &prompt, &keys, &self.policy, &self.cancel)
                    .await
                {
                    Ok(fields) => {
                        if let Some(mut cache) = state.cache() {
                            cache.insert(record.id.clone(), fields.clone());
                        }
                        fields
                    }
                    Err(LlmError::Cancelled) => {
                        state.counters.add_skipped(1);
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(id = %record.id, error = %e, "LLM stage failed");
                        state.counters.add_processed(1);
                        state.counters.add_failed(1);
                        self.run_log
                            .record_failure(&record.id, FailureStage::Llm, &e.to_string());
                        return None;
                    }
                }
            }
        };

        state.counters.add_processed(1);
        match task.to_update(&record, response) {
            Ok(update) => Some(update),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Response failed validation");
                state.counters.add_failed(1);
                self.run_log
                    .record_failure(&record.id, FailureStage::Validation, &e.to_string());
                if let Some(mut cache) = state.cache() {
                    cache.remove(&record.id);
                }
                None
            }
        }
    }

    async fn flush(&self, task: &dyn EnrichmentTask, updates: Vec<FieldUpdate>, state: &RunState) {
        if updates.is_empty() {
            return;
        }

        let report = write_updates(self.store.as_ref(), task.data_type(), &updates).await;

        state.counters.add_succeeded(report.written.len() as u64);
        state.counters.add_failed(report.failed.len() as u64);
        for id in &report.written {
            self.run_log.record_success(id);
        }
        for (id, error) in &report.failed {
            self.run_log.record_failure(id, FailureStage::Write, error);
        }

        if let Some(mut cache) = state.cache() {
            cache.remove_many(&report.written);
            if let Err(e) = cache.persist() {
                tracing::warn!(error = %e, "Failed to persist intermediate results");
            }
        }

        let snapshot = state.counters.snapshot();
        self.run_log.write_progress(&snapshot);
        tracing::info!(
            written = report.written.len(),
            failed = report.failed.len(),
            percent_complete = snapshot.percent_complete,
            "Flushed batch",
        );
    }
}
