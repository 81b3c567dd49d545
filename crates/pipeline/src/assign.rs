//! Statistical field assignment from tier tables.
//!
//! No LLM calls: classified records are grouped by topic and each group is
//! dealt priorities and follow-up flags by [`tiers::assign`], so the
//! distribution within a topic matches its table exactly.

use std::collections::BTreeMap;

use serde::Serialize;
use sparza_core::data_type::DataType;
use sparza_core::fields::{ASSIGNED_AT, DOMINANT_TOPIC, PRIORITY};
use sparza_core::progress::RunCounters;
use sparza_core::store::{FieldFilter, FieldUpdate, RecordStore, RunStatus};
use sparza_core::tiers::{self, normalize_topic, TierBook};
use sparza_core::types::{ext_json_date, Record, RecordId};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::error::PipelineError;
use crate::run_log::{FailureStage, RunLog};
use crate::run_record::RunRecorder;
use crate::writer::write_updates;

#[derive(Debug, Clone)]
pub struct AssignOptions {
    pub seed: u64,
    /// Reassign records that already have a priority.
    pub overwrite: bool,
    /// Compute and report without writing.
    pub dry_run: bool,
    pub batch_size: usize,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            overwrite: false,
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicReport {
    /// Topic as first seen in the data.
    pub topic: String,
    pub records: u64,
    /// Count per priority label.
    pub priorities: BTreeMap<String, u64>,
    pub urgent: u64,
    pub follow_up_required: u64,
    pub action_pending: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentReport {
    pub data_type: DataType,
    pub dry_run: bool,
    pub total: u64,
    pub urgent: u64,
    pub topics: Vec<TopicReport>,
    pub written: u64,
    pub failed: u64,
}

/// Assign tier fields to the classified records of one collection.
pub async fn assign_fields(
    store: &dyn RecordStore,
    data_type: DataType,
    book: &TierBook,
    options: &AssignOptions,
    run_log: Option<&RunLog>,
) -> Result<AssignmentReport, PipelineError> {
    book.validate()?;

    let recorder = if options.dry_run {
        None
    } else {
        Some(RunRecorder::start(store, "assign", data_type).await?)
    };

    let mut filters = vec![FieldFilter::all_present(&[DOMINANT_TOPIC])];
    if !options.overwrite {
        filters.push(FieldFilter::all_missing(&[PRIORITY]));
    }
    let counters = RunCounters::new();
    let records = match store.find(data_type, &FieldFilter::And(filters), None).await {
        Ok(records) => records,
        Err(e) => {
            if let Some(recorder) = recorder {
                recorder.finish(RunStatus::Failed, &counters.snapshot()).await;
            }
            return Err(e.into());
        }
    };
    counters.set_total(records.len() as u64);

    let groups = group_by_topic(&records);
    let assigned_at = ext_json_date(chrono::Utc::now());

    let mut report = AssignmentReport {
        data_type,
        dry_run: options.dry_run,
        total: records.len() as u64,
        urgent: 0,
        topics: Vec::with_capacity(groups.len()),
        written: 0,
        failed: 0,
    };
    let mut updates = Vec::with_capacity(records.len());

    for (key, (topic, ids)) in &groups {
        let table = book.table_for(key);
        let mut topic_report = TopicReport {
            topic: topic.clone(),
            records: ids.len() as u64,
            ..Default::default()
        };

        for (id, assignment) in tiers::assign(key, ids, table, options.seed) {
            *topic_report
                .priorities
                .entry(assignment.priority.as_str().to_string())
                .or_default() += 1;
            topic_report.urgent += u64::from(assignment.urgency());
            topic_report.follow_up_required += u64::from(assignment.follow_up_required);
            topic_report.action_pending += u64::from(assignment.action_pending);

            let mut set = assignment.to_fields();
            set.insert(ASSIGNED_AT.into(), assigned_at.clone());
            updates.push(FieldUpdate::set(id, set));
        }

        tracing::debug!(
            topic = %topic,
            records = topic_report.records,
            urgent = topic_report.urgent,
            "Assigned topic",
        );
        report.urgent += topic_report.urgent;
        report.topics.push(topic_report);
    }

    if !options.dry_run {
        for chunk in updates.chunks(options.batch_size.max(1)) {
            let written = write_updates(store, data_type, chunk).await;
            counters.add_succeeded(written.written.len() as u64);
            counters.add_failed(written.failed.len() as u64);
            if let Some(log) = run_log {
                for id in &written.written {
                    log.record_success(id);
                }
                for (id, error) in &written.failed {
                    log.record_failure(id, FailureStage::Write, error);
                }
                log.write_progress(&counters.snapshot());
            }
        }
    }

    let snapshot = counters.snapshot();
    report.written = snapshot.succeeded;
    report.failed = snapshot.failed;

    tracing::info!(
        data_type = %data_type,
        total = report.total,
        topics = report.topics.len(),
        urgent = report.urgent,
        written = report.written,
        failed = report.failed,
        dry_run = options.dry_run,
        "Field assignment finished",
    );

    if let Some(recorder) = recorder {
        recorder.finish(RunStatus::Completed, &snapshot).await;
    }
    Ok(report)
}

/// Group record ids by normalised topic, keeping the first spelling seen.
fn group_by_topic(records: &[Record]) -> BTreeMap<String, (String, Vec<RecordId>)> {
    let mut groups: BTreeMap<String, (String, Vec<RecordId>)> = BTreeMap::new();
    for record in records {
        let topic = record.get_str(DOMINANT_TOPIC).unwrap_or_default();
        groups
            .entry(normalize_topic(topic))
            .or_insert_with(|| (topic.to_string(), Vec::new()))
            .1
            .push(record.id.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn topics_group_case_insensitively() {
        let records = vec![
            Record::new(RecordId::Int(1), json!({ "dominant_topic": "Cards" }).as_object().unwrap().clone()),
            Record::new(RecordId::Int(2), json!({ "dominant_topic": " cards " }).as_object().unwrap().clone()),
            Record::new(RecordId::Int(3), json!({ "dominant_topic": "Loans" }).as_object().unwrap().clone()),
        ];
        let groups = group_by_topic(&records);
        assert_eq!(groups.len(), 2);
        let (display, ids) = &groups["cards"];
        assert_eq!(display, "Cards");
        assert_eq!(ids, &vec![RecordId::Int(1), RecordId::Int(2)]);
    }
}
