use serde_json::Value;
use sparza_core::data_type::DataType;
use sparza_core::fields::{CLASSIFICATION_FIELDS, CLASSIFIED_AT, DOMINANT_TOPIC, SUBTOPICS};
use sparza_core::store::{FieldFilter, FieldUpdate};
use sparza_core::types::{ext_json_date, Fields, Record};

use super::{content_text, required_string, EnrichmentTask};
use crate::error::TaskError;
use crate::prompt::{render, CLASSIFY_TEMPLATE};

/// Assigns `dominant_topic` and `subtopics` from the record's content.
pub struct ClassifyTask {
    data_type: DataType,
    template: String,
}

impl ClassifyTask {
    pub fn new(data_type: DataType) -> Self {
        Self::with_template(data_type, CLASSIFY_TEMPLATE)
    }

    /// Use a custom template with `{data_type}` and `{content}` placeholders.
    pub fn with_template(data_type: DataType, template: impl Into<String>) -> Self {
        Self {
            data_type,
            template: template.into(),
        }
    }
}

impl EnrichmentTask for ClassifyTask {
    fn name(&self) -> &'static str {
        "classify"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn pending_filter(&self) -> FieldFilter {
        FieldFilter::And(vec![
            FieldFilter::any_missing(CLASSIFICATION_FIELDS),
            FieldFilter::all_present(self.data_type.content_fields()),
        ])
    }

    fn build_prompt(&self, record: &Record) -> Option<String> {
        let lines: Vec<String> = self
            .data_type
            .content_fields()
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .and_then(content_text)
                    .map(|v| format!("{field}: {v}"))
            })
            .collect();
        if lines.is_empty() {
            return None;
        }
        let content = lines.join("\n");

        Some(render(
            &self.template,
            &[
                ("data_type", self.data_type.label()),
                ("content", content.as_str()),
            ],
        ))
    }

    fn required_keys(&self) -> Vec<&'static str> {
        CLASSIFICATION_FIELDS.to_vec()
    }

    fn to_update(&self, record: &Record, response: Fields) -> Result<FieldUpdate, TaskError> {
        let topic = required_string(&response, DOMINANT_TOPIC)?;
        let subtopics = parse_subtopics(response.get(SUBTOPICS))?;

        let mut set = Fields::new();
        set.insert(DOMINANT_TOPIC.into(), topic.into());
        set.insert(SUBTOPICS.into(), subtopics.into());
        set.insert(CLASSIFIED_AT.into(), ext_json_date(chrono::Utc::now()));
        Ok(FieldUpdate::set(record.id.clone(), set))
    }
}

/// Accept a list of strings or a comma-separated string. Blank entries are
/// dropped.
fn parse_subtopics(value: Option<&Value>) -> Result<Vec<String>, TaskError> {
    let clean = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(clean(s)),
                other => Err(TaskError::invalid(
                    SUBTOPICS,
                    format!("expected strings, got {other}"),
                )),
            })
            .filter_map(Result::transpose)
            .collect(),
        Some(Value::String(s)) => Ok(s.split(',').filter_map(clean).collect()),
        Some(other) => Err(TaskError::invalid(
            SUBTOPICS,
            format!("expected a list, got {other}"),
        )),
        None => Err(TaskError::invalid(SUBTOPICS, "missing")),
    }
}
