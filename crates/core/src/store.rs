//! Storage seam between the pipeline and MongoDB.
//!
//! [`RecordStore`] is implemented by `sparza_db::MongoRecordStore` in
//! production and by in-memory fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::types::{Fields, Record, RecordId, Timestamp};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Document selector. A field is *present* when it exists and is not null.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// Every document.
    All,
    /// Every listed field present.
    AllPresent(Vec<String>),
    /// At least one listed field present.
    AnyPresent(Vec<String>),
    /// At least one listed field missing.
    AnyMissing(Vec<String>),
    /// Every listed field missing.
    AllMissing(Vec<String>),
    /// Field equals a value.
    Equals(String, serde_json::Value),
    /// Conjunction.
    And(Vec<FieldFilter>),
}

impl FieldFilter {
    pub fn all_present(fields: &[&str]) -> Self {
        FieldFilter::AllPresent(owned(fields))
    }

    pub fn any_present(fields: &[&str]) -> Self {
        FieldFilter::AnyPresent(owned(fields))
    }

    pub fn any_missing(fields: &[&str]) -> Self {
        FieldFilter::AnyMissing(owned(fields))
    }

    pub fn all_missing(fields: &[&str]) -> Self {
        FieldFilter::AllMissing(owned(fields))
    }

    pub fn equals(field: &str, value: impl Into<serde_json::Value>) -> Self {
        FieldFilter::Equals(field.to_string(), value.into())
    }

    /// Evaluate the filter against an in-memory record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FieldFilter::All => true,
            FieldFilter::AllPresent(fields) => fields.iter().all(|f| record.has(f)),
            FieldFilter::AnyPresent(fields) => fields.iter().any(|f| record.has(f)),
            FieldFilter::AnyMissing(fields) => fields.iter().any(|f| !record.has(f)),
            FieldFilter::AllMissing(fields) => fields.iter().all(|f| !record.has(f)),
            FieldFilter::Equals(field, value) => record.fields.get(field) == Some(value),
            FieldFilter::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// `$set` / `$unset` for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub id: RecordId,
    #[serde(default)]
    pub set: Fields,
    #[serde(default)]
    pub unset: Vec<String>,
}

impl FieldUpdate {
    pub fn set(id: RecordId, set: Fields) -> Self {
        Self {
            id,
            set,
            unset: Vec::new(),
        }
    }

    /// Apply to an in-memory record.
    pub fn apply_to(&self, record: &mut Record) {
        for (key, value) in &self.set {
            record.fields.insert(key.clone(), value.clone());
        }
        for key in &self.unset {
            record.fields.remove(key);
        }
    }
}

/// Result of a bulk write that reached the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// Documents matched by the bulk (modified or already identical).
    pub written: u64,
    /// Updates the server rejected.
    pub failed: Vec<RecordId>,
}

// ---------------------------------------------------------------------------
// Run records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        }
    }
}

/// One row of the `pipeline_runs` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub task: String,
    pub data_type: DataType,
    pub status: RunStatus,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

// ---------------------------------------------------------------------------
// Errors and trait
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Backend(String),

    #[error("Malformed document: {0}")]
    InvalidDocument(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `filter` in `_id` order, at most `limit` when given.
    async fn find(
        &self,
        data_type: DataType,
        filter: &FieldFilter,
        limit: Option<u64>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Apply many updates in one round trip.
    ///
    /// `Err` means the bulk as a whole failed and nothing can be assumed
    /// written; the caller falls back to [`RecordStore::update_one`].
    async fn bulk_update(
        &self,
        data_type: DataType,
        updates: &[FieldUpdate],
    ) -> Result<BulkOutcome, StoreError>;

    /// Apply one update. `Ok(false)` when no document matched.
    async fn update_one(&self, data_type: DataType, update: &FieldUpdate)
        -> Result<bool, StoreError>;

    /// `$unset` the fields on every matching document; returns modified count.
    async fn unset_fields(
        &self,
        data_type: DataType,
        fields: &[&str],
        filter: &FieldFilter,
    ) -> Result<u64, StoreError>;

    async fn count(&self, data_type: DataType, filter: &FieldFilter) -> Result<u64, StoreError>;

    /// Upsert the run record keyed by `run_id`.
    async fn save_run(&self, summary: &RunSummary) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(fields: serde_json::Value) -> Record {
        let serde_json::Value::Object(map) = fields else {
            panic!("fields must be an object");
        };
        Record::new(RecordId::Int(1), map)
    }

    #[test]
    fn presence_filters() {
        let r = record(json!({ "a": 1, "b": null }));

        assert!(FieldFilter::all_present(&["a"]).matches(&r));
        assert!(!FieldFilter::all_present(&["a", "b"]).matches(&r));
        assert!(FieldFilter::any_present(&["a", "b"]).matches(&r));
        assert!(FieldFilter::any_missing(&["a", "b"]).matches(&r));
        assert!(FieldFilter::all_missing(&["b", "c"]).matches(&r));
    }

    #[test]
    fn equals_and_conjunction() {
        let r = record(json!({ "llm_generated": true, "topic": "Cards" }));
        let f = FieldFilter::And(vec![
            FieldFilter::equals("llm_generated", true),
            FieldFilter::all_present(&["topic"]),
        ]);
        assert!(f.matches(&r));
        assert!(!FieldFilter::equals("topic", "Loans").matches(&r));
    }

    #[test]
    fn update_sets_and_unsets() {
        let mut r = record(json!({ "keep": 1, "drop": 2 }));
        let mut set = Fields::new();
        set.insert("new".into(), json!("x"));
        let update = FieldUpdate {
            id: RecordId::Int(1),
            set,
            unset: vec!["drop".into()],
        };
        update.apply_to(&mut r);
        assert_eq!(r.fields, json!({ "keep": 1, "new": "x" }).as_object().unwrap().clone());
    }
}
