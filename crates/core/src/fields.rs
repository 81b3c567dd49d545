//! Field names and field groups written by the enrichment jobs.

use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::CoreError;
use crate::store::FieldFilter;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

pub const DOMINANT_TOPIC: &str = "dominant_topic";
pub const SUBTOPICS: &str = "subtopics";
pub const CLASSIFIED_AT: &str = "classified_at";

pub const SUMMARY: &str = "summary";
pub const SENTIMENT: &str = "sentiment";
pub const LLM_GENERATED: &str = "llm_generated";
pub const LLM_GENERATED_AT: &str = "llm_generated_at";

pub const PRIORITY: &str = "priority";
pub const URGENCY: &str = "urgency";
pub const FOLLOW_UP_REQUIRED: &str = "follow_up_required";
pub const ACTION_PENDING_STATUS: &str = "action_pending_status";
pub const ACTION_PENDING_FROM: &str = "action_pending_from";
pub const ASSIGNED_AT: &str = "fields_assigned_at";

/// Fields set by topic classification.
pub const CLASSIFICATION_FIELDS: &[&str] = &[DOMINANT_TOPIC, SUBTOPICS];

/// Fields set by statistical assignment.
///
/// `action_pending_from` is excluded: it is null whenever no action is
/// pending.
pub const ASSIGNED_FIELDS: &[&str] = &[
    PRIORITY,
    URGENCY,
    FOLLOW_UP_REQUIRED,
    ACTION_PENDING_STATUS,
];

/// Fields the generator adds next to the content. Unlike content fields,
/// which original records carry too, these only exist once it ran.
pub const GENERATION_FIELDS: &[&str] = &[SUMMARY, SENTIMENT, LLM_GENERATED, LLM_GENERATED_AT];

/// Fields produced by content generation for a data type.
pub fn generated_fields(data_type: DataType) -> Vec<&'static str> {
    let mut fields = data_type.content_fields().to_vec();
    fields.push(SUMMARY);
    fields.push(SENTIMENT);
    fields
}

// ---------------------------------------------------------------------------
// FieldGroup
// ---------------------------------------------------------------------------

/// A group of fields one job is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Classification,
    Generated,
    Assigned,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 3] = [
        FieldGroup::Classification,
        FieldGroup::Generated,
        FieldGroup::Assigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::Classification => "classification",
            FieldGroup::Generated => "generated",
            FieldGroup::Assigned => "assigned",
        }
    }

    /// Fields that must all be present for a document to be complete.
    pub fn required_fields(&self, data_type: DataType) -> Vec<&'static str> {
        match self {
            FieldGroup::Classification => CLASSIFICATION_FIELDS.to_vec(),
            FieldGroup::Generated => {
                let mut fields = generated_fields(data_type);
                fields.push(LLM_GENERATED);
                fields
            }
            FieldGroup::Assigned => ASSIGNED_FIELDS.to_vec(),
        }
    }

    /// Fields only this group's job writes. A document carrying any of them
    /// has been touched by the job.
    pub fn job_fields(&self) -> Vec<&'static str> {
        match self {
            FieldGroup::Classification => vec![DOMINANT_TOPIC, SUBTOPICS, CLASSIFIED_AT],
            FieldGroup::Generated => GENERATION_FIELDS.to_vec(),
            FieldGroup::Assigned => {
                let mut fields = ASSIGNED_FIELDS.to_vec();
                fields.push(ACTION_PENDING_FROM);
                fields.push(ASSIGNED_AT);
                fields
            }
        }
    }

    /// Every required field present.
    pub fn complete_filter(&self, data_type: DataType) -> FieldFilter {
        FieldFilter::all_present(&self.required_fields(data_type))
    }

    /// Touched by the job but missing a required field.
    pub fn partial_filter(&self, data_type: DataType) -> FieldFilter {
        FieldFilter::And(vec![
            self.touched_filter(),
            FieldFilter::any_missing(&self.required_fields(data_type)),
        ])
    }

    /// Carrying any field the job writes.
    pub fn touched_filter(&self) -> FieldFilter {
        FieldFilter::any_present(&self.job_fields())
    }

    /// Never touched by the job.
    pub fn untouched_filter(&self) -> FieldFilter {
        FieldFilter::all_missing(&self.job_fields())
    }

    /// Every field a reset of this group removes, including marker fields.
    pub fn reset_fields(&self, data_type: DataType) -> Vec<&'static str> {
        let mut fields = self.required_fields(data_type);
        match self {
            FieldGroup::Classification => fields.push(CLASSIFIED_AT),
            FieldGroup::Generated => fields.push(LLM_GENERATED_AT),
            FieldGroup::Assigned => {
                fields.push(ACTION_PENDING_FROM);
                fields.push(ASSIGNED_AT);
            }
        }
        fields
    }
}

impl std::str::FromStr for FieldGroup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" | "topics" => Ok(FieldGroup::Classification),
            "generated" | "generation" => Ok(FieldGroup::Generated),
            "assigned" | "assignment" => Ok(FieldGroup::Assigned),
            other => Err(CoreError::Validation(format!("Unknown field group '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_fields_include_content_and_analysis() {
        let fields = generated_fields(DataType::Email);
        assert_eq!(fields, vec!["subject", "body", SUMMARY, SENTIMENT]);
    }

    #[test]
    fn reset_fields_include_markers() {
        let fields = FieldGroup::Generated.reset_fields(DataType::Voice);
        assert!(fields.contains(&"transcript"));
        assert!(fields.contains(&LLM_GENERATED));
        assert!(fields.contains(&LLM_GENERATED_AT));

        let fields = FieldGroup::Assigned.reset_fields(DataType::Voice);
        assert!(fields.contains(&ACTION_PENDING_FROM));
    }

    #[test]
    fn action_pending_from_is_not_required() {
        assert!(!FieldGroup::Assigned
            .required_fields(DataType::Ticket)
            .contains(&ACTION_PENDING_FROM));
    }

    fn record(fields: serde_json::Value) -> crate::types::Record {
        crate::types::Record::new(
            crate::types::RecordId::Int(1),
            fields.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn original_content_is_not_partial_generation() {
        let original = record(serde_json::json!({ "subject": "s", "body": "b" }));
        let group = FieldGroup::Generated;

        assert!(!group.partial_filter(DataType::Email).matches(&original));
        assert!(group.untouched_filter().matches(&original));
        assert!(!group.complete_filter(DataType::Email).matches(&original));
    }

    #[test]
    fn interrupted_generation_is_partial() {
        let interrupted = record(serde_json::json!({ "subject": "s", "summary": "x" }));
        let generated = record(serde_json::json!({
            "subject": "s", "body": "b", "summary": "x", "sentiment": "neutral", "llm_generated": true,
        }));
        let group = FieldGroup::Generated;

        assert!(group.partial_filter(DataType::Email).matches(&interrupted));
        assert!(!group.untouched_filter().matches(&interrupted));
        assert!(group.complete_filter(DataType::Email).matches(&generated));
        assert!(!group.partial_filter(DataType::Email).matches(&generated));
    }

    #[test]
    fn parses_group_names() {
        assert_eq!("topics".parse::<FieldGroup>().unwrap(), FieldGroup::Classification);
        assert_eq!("Assigned".parse::<FieldGroup>().unwrap(), FieldGroup::Assigned);
        assert!("other".parse::<FieldGroup>().is_err());
    }
}
