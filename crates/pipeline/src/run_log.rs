//! Per-run log files.
//!
//! Every run gets a file stem `<task>_<data_type>_<YYYYmmdd_HHMMSS>` under
//! the log directory. The `.log` file is written by the worker's tracing
//! setup; this module owns the JSON-lines success/failure logs and the
//! progress snapshot.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use sparza_core::progress::ProgressSnapshot;
use sparza_core::types::{RecordId, Timestamp};

use crate::error::PipelineError;

/// Where a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Llm,
    Validation,
    Write,
}

/// File names for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub stem: String,
    pub log: PathBuf,
    pub success: PathBuf,
    pub failure: PathBuf,
    pub progress: PathBuf,
}

impl RunPaths {
    pub fn new(dir: &Path, task: &str, scope: &str, started_at: Timestamp) -> Self {
        let stem = format!("{task}_{scope}_{}", started_at.format("%Y%m%d_%H%M%S"));
        Self {
            log: dir.join(format!("{stem}.log")),
            success: dir.join(format!("{stem}_success.jsonl")),
            failure: dir.join(format!("{stem}_failure.jsonl")),
            progress: dir.join(format!("{stem}_progress.json")),
            stem,
        }
    }
}

#[derive(Serialize)]
struct SuccessLine<'a> {
    id: &'a RecordId,
    at: Timestamp,
}

#[derive(Serialize)]
struct FailureLine<'a> {
    id: &'a RecordId,
    stage: FailureStage,
    error: &'a str,
    at: Timestamp,
}

/// Append-only success/failure logs plus the overwritten progress file.
///
/// Safe to share between workers; each line is written under a lock.
pub struct RunLog {
    paths: RunPaths,
    success: Mutex<File>,
    failure: Mutex<File>,
}

impl RunLog {
    /// Create the log directory if needed and open the JSON-lines files.
    pub fn create(paths: RunPaths) -> Result<Self, PipelineError> {
        if let Some(dir) = paths.success.parent() {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let success = open_append(&paths.success)?;
        let failure = open_append(&paths.failure)?;
        Ok(Self {
            paths,
            success: Mutex::new(success),
            failure: Mutex::new(failure),
        })
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    pub fn record_success(&self, id: &RecordId) {
        let line = SuccessLine {
            id,
            at: chrono::Utc::now(),
        };
        append_line(&self.success, &self.paths.success, &line);
    }

    pub fn record_failure(&self, id: &RecordId, stage: FailureStage, error: &str) {
        let line = FailureLine {
            id,
            stage,
            error,
            at: chrono::Utc::now(),
        };
        append_line(&self.failure, &self.paths.failure, &line);
    }

    /// Overwrite the progress file with the latest snapshot.
    pub fn write_progress(&self, snapshot: &ProgressSnapshot) {
        let result = serde_json::to_vec_pretty(snapshot)
            .map_err(std::io::Error::from)
            .and_then(|bytes| std::fs::write(&self.paths.progress, bytes));
        if let Err(e) = result {
            tracing::warn!(path = %self.paths.progress.display(), error = %e, "Failed to write progress file");
        }
    }
}

fn open_append(path: &Path) -> Result<File, PipelineError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Log-file write failures are reported but never abort a run.
fn append_line<T: Serialize>(file: &Mutex<File>, path: &Path, line: &T) {
    let mut bytes = match serde_json::to_vec(line) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode run log line");
            return;
        }
    };
    bytes.push(b'\n');

    let mut file = match file.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(e) = file.write_all(&bytes) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to append to run log");
    }
}
