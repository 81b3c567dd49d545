//! Repository for the `pipeline_runs` collection.

use mongodb::bson::{doc, Bson, DateTime, Document};
use sparza_core::store::RunSummary;
use sparza_core::types::Timestamp;

use crate::error::DbError;
use crate::Database;

pub const RUNS_COLLECTION: &str = "pipeline_runs";

pub struct RunRepo;

impl RunRepo {
    /// Insert or update the run record keyed by `run_id`.
    pub async fn save(db: &Database, summary: &RunSummary) -> Result<(), DbError> {
        db.collection::<Document>(RUNS_COLLECTION)
            .update_one(
                doc! { "run_id": &summary.run_id },
                doc! { "$set": run_document(summary) },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}

fn bson_date(ts: Timestamp) -> Bson {
    Bson::DateTime(DateTime::from_millis(ts.timestamp_millis()))
}

fn run_document(summary: &RunSummary) -> Document {
    doc! {
        "run_id": &summary.run_id,
        "task": &summary.task,
        "data_type": summary.data_type.as_str(),
        "status": summary.status.as_str(),
        "started_at": bson_date(summary.started_at),
        "finished_at": summary.finished_at.map(bson_date).unwrap_or(Bson::Null),
        "total": count(summary.total),
        "succeeded": count(summary.succeeded),
        "failed": count(summary.failed),
        "skipped": count(summary.skipped),
    }
}

fn count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sparza_core::data_type::DataType;
    use sparza_core::store::RunStatus;

    use super::*;

    #[test]
    fn run_document_shape() {
        let started = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let summary = RunSummary {
            run_id: "r1".into(),
            task: "classify".into(),
            data_type: DataType::Ticket,
            status: RunStatus::Running,
            started_at: started,
            finished_at: None,
            total: 10,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        };

        let doc = run_document(&summary);
        assert_eq!(doc.get_str("data_type").unwrap(), "ticket");
        assert_eq!(doc.get_str("status").unwrap(), "running");
        assert_eq!(doc.get_i64("total").unwrap(), 10);
        assert_eq!(doc.get("finished_at"), Some(&Bson::Null));
        assert_eq!(
            doc.get_datetime("started_at").unwrap().timestamp_millis(),
            started.timestamp_millis()
        );
    }
}
