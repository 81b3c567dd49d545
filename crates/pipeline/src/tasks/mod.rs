//! LLM enrichment tasks run by the [`BatchRunner`](crate::batch::BatchRunner).

use serde_json::Value;
use sparza_core::data_type::DataType;
use sparza_core::store::{FieldFilter, FieldUpdate};
use sparza_core::types::{Fields, Record};

use crate::error::TaskError;

pub mod classify;
pub mod generate;

pub use classify::ClassifyTask;
pub use generate::GenerateTask;

/// One kind of per-record LLM enrichment.
pub trait EnrichmentTask: Send + Sync {
    /// Short name used in log file names and run records.
    fn name(&self) -> &'static str;

    fn data_type(&self) -> DataType;

    /// Records this task still has to process.
    fn pending_filter(&self) -> FieldFilter;

    /// `None` when the record lacks the input the prompt needs; the record
    /// is skipped.
    fn build_prompt(&self, record: &Record) -> Option<String>;

    /// Keys the model's JSON object must carry.
    fn required_keys(&self) -> Vec<&'static str>;

    /// Validate the response and turn it into a document update.
    fn to_update(&self, record: &Record, response: Fields) -> Result<FieldUpdate, TaskError>;
}

/// Non-empty trimmed string value of `key`.
pub(crate) fn required_string(response: &Fields, key: &str) -> Result<String, TaskError> {
    match response.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(serde_json::Value::String(_)) => Err(TaskError::invalid(key, "empty string")),
        Some(other) => Err(TaskError::invalid(key, format!("expected a string, got {other}"))),
        None => Err(TaskError::invalid(key, "missing")),
    }
}

/// Prompt text for a content field. Strings are used as-is; a list (a chat
/// conversation) becomes one line per turn.
pub(crate) fn content_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(turns) => turns.iter().filter_map(turn_text).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// `speaker: text` when the turn names both, otherwise its text or JSON.
fn turn_text(turn: &Value) -> Option<String> {
    match turn {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => {
            let speaker = first_str(map, &["from", "speaker", "role", "sender"]);
            match (speaker, first_str(map, &["text", "message", "content"])) {
                (Some(speaker), Some(text)) => Some(format!("{speaker}: {text}")),
                (None, Some(text)) => Some(text.to_string()),
                _ => Some(turn.to_string()),
            }
        }
        other => Some(other.to_string()),
    }
}

fn first_str<'a>(map: &'a Fields, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
}
