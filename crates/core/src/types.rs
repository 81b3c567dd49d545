use std::fmt;

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Loosely typed document body: every field except `_id`.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Identifier of a MongoDB document.
///
/// Most collections use ObjectIds, but imported documents sometimes carry
/// string or integer keys, and updates must filter on the original type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordId {
    /// 24-character hex ObjectId.
    ObjectId(String),
    Text(String),
    Int(i64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::ObjectId(hex) => f.write_str(hex),
            RecordId::Text(s) => f.write_str(s),
            RecordId::Int(n) => write!(f, "{n}"),
        }
    }
}

/// A document read from one of the dataset collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

/// Extended-JSON date (`{"$date": "<rfc3339>"}`), stored by MongoDB as a
/// native date rather than a string.
pub fn ext_json_date(ts: Timestamp) -> serde_json::Value {
    serde_json::json!({ "$date": ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true) })
}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Field value when present and not null.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Non-empty string field, trimmed.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}
