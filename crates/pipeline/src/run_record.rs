//! Start/finish bookkeeping for the `pipeline_runs` record.

use sparza_core::data_type::DataType;
use sparza_core::progress::ProgressSnapshot;
use sparza_core::store::{RecordStore, RunStatus, RunSummary, StoreError};

/// Saves a `running` record on start and the final counts on finish.
pub struct RunRecorder<'a> {
    store: &'a dyn RecordStore,
    summary: RunSummary,
}

impl<'a> RunRecorder<'a> {
    pub async fn start(
        store: &'a dyn RecordStore,
        task: &str,
        data_type: DataType,
    ) -> Result<RunRecorder<'a>, StoreError> {
        let summary = RunSummary {
            run_id: uuid::Uuid::now_v7().to_string(),
            task: task.to_string(),
            data_type,
            status: RunStatus::Running,
            started_at: chrono::Utc::now(),
            finished_at: None,
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        };
        store.save_run(&summary).await?;
        tracing::info!(run_id = %summary.run_id, task, data_type = %data_type, "Run started");
        Ok(Self { store, summary })
    }

    pub fn run_id(&self) -> &str {
        &self.summary.run_id
    }

    /// Save the final record. A failure to save is logged, not returned, so
    /// the caller still gets the counts.
    pub async fn finish(mut self, status: RunStatus, progress: &ProgressSnapshot) -> RunSummary {
        self.summary.status = status;
        self.summary.finished_at = Some(chrono::Utc::now());
        self.summary.total = progress.total;
        self.summary.succeeded = progress.succeeded;
        self.summary.failed = progress.failed;
        self.summary.skipped = progress.skipped;

        if let Err(e) = self.store.save_run(&self.summary).await {
            tracing::warn!(run_id = %self.summary.run_id, error = %e, "Failed to save run record");
        }
        tracing::info!(
            run_id = %self.summary.run_id,
            status = status.as_str(),
            total = progress.total,
            succeeded = progress.succeeded,
            failed = progress.failed,
            skipped = progress.skipped,
            "Run finished",
        );
        self.summary
    }
}
