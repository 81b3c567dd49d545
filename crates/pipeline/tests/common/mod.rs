#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sparza_core::data_type::DataType;
use sparza_core::retry::RetryPolicy;
use sparza_core::store::{
    BulkOutcome, FieldFilter, FieldUpdate, RecordStore, RunSummary, StoreError,
};
use sparza_core::types::{Fields, Record, RecordId};
use sparza_llm::{LlmApiError, LlmClient};
use sparza_pipeline::run_log::{RunLog, RunPaths};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// [`RecordStore`] over plain vectors, with switches for failure paths.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<DataType, Vec<Record>>>,
    runs: Mutex<Vec<RunSummary>>,
    /// Make every `bulk_update` fail as a whole.
    pub fail_bulk: AtomicBool,
    /// Make `find` fail.
    pub fail_find: AtomicBool,
    /// Ids the bulk reports as write errors (without applying them).
    pub reject_in_bulk: Mutex<HashSet<RecordId>>,
    /// Ids `update_one` refuses.
    pub reject_single: Mutex<HashSet<RecordId>>,
    /// When set, the next `bulk_update` waits for this to be notified.
    pub bulk_gate: Mutex<Option<Arc<Notify>>>,
    pub bulk_calls: AtomicU32,
    pub single_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, data_type: DataType, id: i64, fields: serde_json::Value) {
        let serde_json::Value::Object(map) = fields else {
            panic!("fields must be an object");
        };
        self.collections
            .lock()
            .unwrap()
            .entry(data_type)
            .or_default()
            .push(Record::new(RecordId::Int(id), map));
    }

    pub fn get(&self, data_type: DataType, id: i64) -> Record {
        self.collections.lock().unwrap()[&data_type]
            .iter()
            .find(|r| r.id == RecordId::Int(id))
            .cloned()
            .expect("record exists")
    }

    pub fn all(&self, data_type: DataType) -> Vec<Record> {
        self.collections
            .lock()
            .unwrap()
            .get(&data_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<RunSummary> {
        self.runs.lock().unwrap().clone()
    }

    fn apply(&self, data_type: DataType, update: &FieldUpdate) -> bool {
        let mut collections = self.collections.lock().unwrap();
        let Some(record) = collections
            .get_mut(&data_type)
            .and_then(|records| records.iter_mut().find(|r| r.id == update.id))
        else {
            return false;
        };
        update.apply_to(record);
        true
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(
        &self,
        data_type: DataType,
        filter: &FieldFilter,
        limit: Option<u64>,
    ) -> Result<Vec<Record>, StoreError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".into()));
        }
        let mut records: Vec<Record> = self
            .all(data_type)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = limit {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    async fn bulk_update(
        &self,
        data_type: DataType,
        updates: &[FieldUpdate],
    ) -> Result<BulkOutcome, StoreError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.bulk_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("bulk write timed out".into()));
        }

        let rejected = self.reject_in_bulk.lock().unwrap().clone();
        let mut outcome = BulkOutcome::default();
        for update in updates {
            if rejected.contains(&update.id) {
                outcome.failed.push(update.id.clone());
            } else if self.apply(data_type, update) {
                outcome.written += 1;
            }
        }
        Ok(outcome)
    }

    async fn update_one(
        &self,
        data_type: DataType,
        update: &FieldUpdate,
    ) -> Result<bool, StoreError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_single.lock().unwrap().contains(&update.id) {
            return Err(StoreError::Backend("write conflict".into()));
        }
        Ok(self.apply(data_type, update))
    }

    async fn unset_fields(
        &self,
        data_type: DataType,
        fields: &[&str],
        filter: &FieldFilter,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let mut modified = 0;
        for record in collections.entry(data_type).or_default().iter_mut() {
            if !filter.matches(record) {
                continue;
            }
            let before = record.fields.len();
            for field in fields {
                record.fields.remove(*field);
            }
            if record.fields.len() != before {
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn count(&self, data_type: DataType, filter: &FieldFilter) -> Result<u64, StoreError> {
        Ok(self
            .all(data_type)
            .iter()
            .filter(|r| filter.matches(r))
            .count() as u64)
    }

    async fn save_run(&self, summary: &RunSummary) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.run_id == summary.run_id) {
            Some(existing) => *existing = summary.clone(),
            None => runs.push(summary.clone()),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake LLM
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&str) -> Result<String, LlmApiError> + Send + Sync;

/// Answers prompts with a closure and counts calls.
pub struct FakeLlm {
    respond: Box<Responder>,
    calls: AtomicU32,
}

impl FakeLlm {
    pub fn new(
        respond: impl Fn(&str) -> Result<String, LlmApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }

    fn model(&self) -> &str {
        "fake"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Retry policy with no sleeps.
pub fn instant_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 2.0,
    }
}

pub fn run_log(dir: &Path, task: &str) -> Arc<RunLog> {
    let paths = RunPaths::new(dir, task, "test", chrono::Utc::now());
    Arc::new(RunLog::create(paths).expect("run log"))
}

pub fn fields(value: serde_json::Value) -> Fields {
    value.as_object().expect("object").clone()
}

pub fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect()
}
