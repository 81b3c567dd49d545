use serde_json::Value;
use sparza_core::data_type::DataType;
use sparza_core::fields::{
    generated_fields, DOMINANT_TOPIC, LLM_GENERATED, LLM_GENERATED_AT, SENTIMENT, SUBTOPICS, SUMMARY,
};
use sparza_core::store::{FieldFilter, FieldUpdate};
use sparza_core::types::{ext_json_date, Fields, Record};

use super::{required_string, EnrichmentTask};
use crate::error::TaskError;
use crate::prompt::{render, GENERATE_TEMPLATE};

/// Writes synthetic content, a summary and a sentiment for classified
/// records.
pub struct GenerateTask {
    data_type: DataType,
    template: String,
}

impl GenerateTask {
    pub fn new(data_type: DataType) -> Self {
        Self::with_template(data_type, GENERATE_TEMPLATE)
    }

    /// Use a custom template with `{data_type}`, `{topic}`, `{subtopics}`
    /// and `{fields}` placeholders.
    pub fn with_template(data_type: DataType, template: impl Into<String>) -> Self {
        Self {
            data_type,
            template: template.into(),
        }
    }
}

impl EnrichmentTask for GenerateTask {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn pending_filter(&self) -> FieldFilter {
        FieldFilter::And(vec![
            FieldFilter::all_present(&[DOMINANT_TOPIC]),
            FieldFilter::all_missing(&[LLM_GENERATED]),
        ])
    }

    fn build_prompt(&self, record: &Record) -> Option<String> {
        let topic = record.get_str(DOMINANT_TOPIC)?;
        let subtopics = match record.get(SUBTOPICS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let subtopics = if subtopics.trim().is_empty() {
            "none".to_string()
        } else {
            subtopics
        };
        let fields = generated_fields(self.data_type)
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");

        Some(render(
            &self.template,
            &[
                ("data_type", self.data_type.label()),
                ("topic", topic),
                ("subtopics", subtopics.as_str()),
                ("fields", fields.as_str()),
            ],
        ))
    }

    fn required_keys(&self) -> Vec<&'static str> {
        generated_fields(self.data_type)
    }

    fn to_update(&self, record: &Record, response: Fields) -> Result<FieldUpdate, TaskError> {
        let mut set = Fields::new();

        for &field in self.data_type.content_fields() {
            set.insert(field.into(), content_value(&response, field)?);
        }
        set.insert(SUMMARY.into(), required_string(&response, SUMMARY)?.into());
        set.insert(
            SENTIMENT.into(),
            normalize_sentiment(&required_string(&response, SENTIMENT)?)?.into(),
        );
        set.insert(LLM_GENERATED.into(), true.into());
        set.insert(LLM_GENERATED_AT.into(), ext_json_date(chrono::Utc::now()));

        Ok(FieldUpdate::set(record.id.clone(), set))
    }
}

/// Content is usually a string; a chat conversation may come back as a
/// non-empty list of turns.
fn content_value(response: &Fields, field: &str) -> Result<Value, TaskError> {
    match response.get(field) {
        Some(Value::Array(turns)) if !turns.is_empty() => Ok(Value::Array(turns.clone())),
        Some(Value::Array(_)) => Err(TaskError::invalid(field, "empty list")),
        _ => required_string(response, field).map(Value::from),
    }
}

/// Map the model's sentiment label onto `positive | neutral | negative`.
pub fn normalize_sentiment(raw: &str) -> Result<&'static str, TaskError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "positive" | "pos" | "very positive" => Ok("positive"),
        "negative" | "neg" | "very negative" => Ok("negative"),
        "neutral" | "mixed" => Ok("neutral"),
        other => Err(TaskError::invalid(
            SENTIMENT,
            format!("unknown sentiment '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use sparza_core::types::RecordId;

    use super::*;

    fn record(fields: Value) -> Record {
        Record::new(RecordId::Text("e-1".into()), fields.as_object().unwrap().clone())
    }

    fn response(v: Value) -> Fields {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn prompt_carries_topic_subtopics_and_keys() {
        let task = GenerateTask::with_template(DataType::Email, "{topic}|{subtopics}|{fields}");
        let prompt = task
            .build_prompt(&record(json!({ "dominant_topic": "Cards", "subtopics": ["Lost", "Fees"] })))
            .unwrap();
        assert_eq!(prompt, r#"Cards|Lost, Fees|"subject", "body", "summary", "sentiment""#);
    }

    #[test]
    fn unclassified_record_has_no_prompt() {
        assert!(GenerateTask::new(DataType::Email)
            .build_prompt(&record(json!({ "subject": "x" })))
            .is_none());
    }

    #[test]
    fn update_sets_content_and_markers() {
        let task = GenerateTask::new(DataType::Ticket);
        let update = task
            .to_update(
                &record(json!({})),
                response(json!({
                    "title": "Card declined abroad",
                    "description": "My card was declined in Lisbon.",
                    "summary": "Customer's card declined while travelling.",
                    "sentiment": "Negative",
                })),
            )
            .unwrap();
        assert_eq!(update.set["title"], "Card declined abroad");
        assert_eq!(update.set[SENTIMENT], "negative");
        assert_eq!(update.set[LLM_GENERATED], true);
        assert!(update.set.contains_key(LLM_GENERATED_AT));
    }

    #[test]
    fn chat_conversation_may_be_a_list() {
        let task = GenerateTask::new(DataType::Chat);
        let update = task
            .to_update(
                &record(json!({})),
                response(json!({
                    "conversation": [{ "from": "customer", "text": "Hi" }],
                    "summary": "Greeting.",
                    "sentiment": "neutral",
                })),
            )
            .unwrap();
        assert!(update.set["conversation"].is_array());
    }

    #[test]
    fn bad_fields_rejected() {
        let task = GenerateTask::new(DataType::Voice);
        assert_matches!(
            task.to_update(
                &record(json!({})),
                response(json!({ "transcript": "", "summary": "s", "sentiment": "neutral" })),
            ),
            Err(TaskError::InvalidField { ref field, .. }) if field == "transcript"
        );
        assert_matches!(
            task.to_update(
                &record(json!({})),
                response(json!({ "transcript": "t", "summary": "s", "sentiment": "angry" })),
            ),
            Err(TaskError::InvalidField { ref field, .. }) if field == SENTIMENT
        );
    }

    #[test]
    fn pending_filter() {
        let filter = GenerateTask::new(DataType::Email).pending_filter();
        assert!(filter.matches(&record(json!({ "dominant_topic": "Cards" }))));
        assert!(!filter.matches(&record(json!({ "dominant_topic": "Cards", "llm_generated": true }))));
        assert!(!filter.matches(&record(json!({}))));
    }
}
