//! Field assignment, reset and verification against the in-memory store.

mod common;

use std::collections::BTreeMap;

use serde_json::json;
use sparza_core::data_type::DataType;
use sparza_core::fields::FieldGroup;
use sparza_core::store::RunStatus;
use sparza_core::tiers::TierBook;
use sparza_pipeline::assign::{assign_fields, AssignOptions};
use sparza_pipeline::reset::{reset_fields, ResetMode, ResetScope};
use sparza_pipeline::verify::verify;

use common::{read_lines, run_log, MemoryStore};

fn seed_classified(store: &MemoryStore) {
    for id in 1..=10 {
        store.insert(DataType::Email, id, json!({ "dominant_topic": "Cards" }));
    }
    for id in 11..=20 {
        store.insert(DataType::Email, id, json!({ "dominant_topic": "fraud &  security" }));
    }
    store.insert(DataType::Email, 21, json!({ "subject": "unclassified" }));
    store.insert(
        DataType::Email,
        22,
        json!({ "dominant_topic": "Cards", "priority": "P5 - Very Low" }),
    );
}

// ---------------------------------------------------------------------------
// assign
// ---------------------------------------------------------------------------

#[tokio::test]
async fn assignment_follows_topic_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    seed_classified(&store);
    let log = run_log(dir.path(), "assign");

    let report = assign_fields(
        store.as_ref(),
        DataType::Email,
        &TierBook::default(),
        &AssignOptions::default(),
        Some(log.as_ref()),
    )
    .await
    .unwrap();

    assert_eq!(report.total, 20);
    assert_eq!((report.written, report.failed), (20, 0));
    assert_eq!(report.topics.len(), 2);

    let cards = report.topics.iter().find(|t| t.topic == "Cards").unwrap();
    let expected: BTreeMap<String, u64> = [
        ("P1 - Critical", 1),
        ("P2 - High", 2),
        ("P3 - Medium", 4),
        ("P4 - Low", 3),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    assert_eq!(cards.priorities, expected);
    assert_eq!(cards.urgent, 3);

    let fraud = report
        .topics
        .iter()
        .find(|t| t.topic == "fraud &  security")
        .unwrap();
    assert_eq!(fraud.urgent, 7);
    assert_eq!(report.urgent, 10);

    assert_eq!(read_lines(&log.paths().success).len(), 20);
    assert_eq!(store.runs()[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn assigned_fields_are_coherent() {
    let store = MemoryStore::new();
    seed_classified(&store);

    assign_fields(
        store.as_ref(),
        DataType::Email,
        &TierBook::default(),
        &AssignOptions::default(),
        None,
    )
    .await
    .unwrap();

    for id in 1..=20 {
        let record = store.get(DataType::Email, id);
        let f = &record.fields;
        let priority = f["priority"].as_str().unwrap();
        let urgent = priority.starts_with("P1") || priority.starts_with("P2");
        assert_eq!(f["urgency"], urgent, "record {id}");

        if f["follow_up_required"] == "no" {
            assert_eq!(f["action_pending_status"], "no", "record {id}");
        }
        if f["action_pending_status"] == "yes" {
            assert!(
                f["action_pending_from"] == "company" || f["action_pending_from"] == "customer",
                "record {id}"
            );
        } else {
            assert!(f["action_pending_from"].is_null(), "record {id}");
        }
        assert!(f.contains_key("fields_assigned_at"));
    }

    // Already assigned and unclassified records are untouched.
    assert_eq!(store.get(DataType::Email, 22).fields["priority"], "P5 - Very Low");
    assert!(!store.get(DataType::Email, 21).fields.contains_key("priority"));
}

#[tokio::test]
async fn assignment_is_deterministic_for_a_seed() {
    let first = MemoryStore::new();
    let second = MemoryStore::new();
    seed_classified(&first);
    seed_classified(&second);
    let options = AssignOptions {
        seed: 42,
        ..Default::default()
    };

    for store in [&first, &second] {
        assign_fields(store.as_ref(), DataType::Email, &TierBook::default(), &options, None)
            .await
            .unwrap();
    }

    for id in 1..=20 {
        let a = first.get(DataType::Email, id).fields;
        let b = second.get(DataType::Email, id).fields;
        for key in ["priority", "follow_up_required", "action_pending_status", "action_pending_from"] {
            assert_eq!(a[key], b[key], "record {id} field {key}");
        }
    }
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let store = MemoryStore::new();
    seed_classified(&store);

    let report = assign_fields(
        store.as_ref(),
        DataType::Email,
        &TierBook::default(),
        &AssignOptions {
            dry_run: true,
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.total, 20);
    assert_eq!(report.written, 0);
    assert!(!store.get(DataType::Email, 1).fields.contains_key("priority"));
    assert!(store.runs().is_empty());
}

#[tokio::test]
async fn overwrite_reassigns_existing_priorities() {
    let store = MemoryStore::new();
    seed_classified(&store);

    let report = assign_fields(
        store.as_ref(),
        DataType::Email,
        &TierBook::default(),
        &AssignOptions {
            overwrite: true,
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.total, 21);
    assert!(store.get(DataType::Email, 22).fields.contains_key("urgency"));
}

// ---------------------------------------------------------------------------
// reset
// ---------------------------------------------------------------------------

fn seed_mixed(store: &MemoryStore) {
    // Partial classification.
    store.insert(DataType::Ticket, 1, json!({ "dominant_topic": "Cards", "classified_at": "x" }));
    // Complete classification.
    store.insert(
        DataType::Ticket,
        2,
        json!({ "dominant_topic": "Cards", "subtopics": ["Fees"], "title": "t" }),
    );
    // Untouched.
    store.insert(DataType::Ticket, 3, json!({ "title": "t" }));
}

#[tokio::test]
async fn partial_reset_only_touches_partial_documents() {
    let store = MemoryStore::new();
    seed_mixed(&store);

    let report = reset_fields(
        store.as_ref(),
        DataType::Ticket,
        ResetScope::Classification,
        ResetMode::Partial,
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!((report.groups[0].matched, report.groups[0].modified), (1, 1));
    let partial = store.get(DataType::Ticket, 1);
    assert!(!partial.fields.contains_key("dominant_topic"));
    assert!(!partial.fields.contains_key("classified_at"));
    assert!(store.get(DataType::Ticket, 2).fields.contains_key("dominant_topic"));
    assert_eq!(store.runs()[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn any_reset_clears_complete_documents_too() {
    let store = MemoryStore::new();
    seed_mixed(&store);

    let report = reset_fields(
        store.as_ref(),
        DataType::Ticket,
        ResetScope::Classification,
        ResetMode::Any,
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.total_modified(), 2);
    assert!(!store.get(DataType::Ticket, 2).fields.contains_key("subtopics"));
    assert_eq!(store.get(DataType::Ticket, 2).fields["title"], "t");
}

#[tokio::test]
async fn generated_reset_keeps_original_content() {
    let store = MemoryStore::new();
    // Original email, classified but never generated.
    store.insert(
        DataType::Email,
        1,
        json!({ "subject": "Card declined", "body": "Help", "dominant_topic": "Cards", "subtopics": [] }),
    );
    // Generation interrupted after the summary was written.
    store.insert(
        DataType::Email,
        2,
        json!({ "subject": "Generated", "dominant_topic": "Cards", "summary": "s" }),
    );

    for mode in [ResetMode::Partial, ResetMode::Any] {
        reset_fields(store.as_ref(), DataType::Email, ResetScope::Generated, mode, false)
            .await
            .unwrap();
    }

    let original = store.get(DataType::Email, 1);
    assert_eq!(original.fields["subject"], "Card declined");
    assert_eq!(original.fields["body"], "Help");

    let interrupted = store.get(DataType::Email, 2);
    assert!(!interrupted.fields.contains_key("subject"));
    assert!(!interrupted.fields.contains_key("summary"));
    assert_eq!(interrupted.fields["dominant_topic"], "Cards");
}

#[tokio::test]
async fn dry_run_reset_only_counts() {
    let store = MemoryStore::new();
    seed_mixed(&store);

    let report = reset_fields(
        store.as_ref(),
        DataType::Ticket,
        ResetScope::All,
        ResetMode::Any,
        true,
    )
    .await
    .unwrap();

    assert_eq!(report.groups.len(), 3);
    assert_eq!(report.groups[0].matched, 2);
    assert_eq!(report.total_modified(), 0);
    assert!(store.get(DataType::Ticket, 1).fields.contains_key("dominant_topic"));
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verification_counts_completeness() {
    let store = MemoryStore::new();
    seed_mixed(&store);
    store.insert(
        DataType::Ticket,
        4,
        json!({
            "priority": "P1 - Critical",
            "urgency": true,
            "follow_up_required": "yes",
            "action_pending_status": "yes",
            "action_pending_from": "customer",
        }),
    );

    let report = verify(store.as_ref(), DataType::Ticket).await.unwrap();

    assert_eq!(report.collection, "tickets");
    assert_eq!(report.total, 4);
    let classification = report.group(FieldGroup::Classification).unwrap();
    assert_eq!(
        (classification.complete, classification.partial, classification.untouched),
        (1, 1, 2)
    );
    // Original titles are not generation output.
    let generated = report.group(FieldGroup::Generated).unwrap();
    assert_eq!((generated.complete, generated.partial, generated.untouched), (0, 0, 4));
    let assigned = report.group(FieldGroup::Assigned).unwrap();
    assert_eq!(assigned.complete, 1);
    assert_eq!(
        (report.urgent, report.follow_up_required, report.action_pending),
        (1, 1, 1)
    );
}
