//! Conversions between BSON documents and the core record types.
//!
//! Field values cross the boundary as relaxed extended JSON, so dates and
//! ObjectIds survive a read-modify-write cycle without loss.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use sparza_core::types::{Fields, Record, RecordId};

use crate::error::DbError;

pub fn record_id_from_bson(id: &Bson) -> Result<RecordId, DbError> {
    match id {
        Bson::ObjectId(oid) => Ok(RecordId::ObjectId(oid.to_hex())),
        Bson::String(s) => Ok(RecordId::Text(s.clone())),
        Bson::Int32(n) => Ok(RecordId::Int(i64::from(*n))),
        Bson::Int64(n) => Ok(RecordId::Int(*n)),
        other => Err(DbError::InvalidDocument(format!(
            "unsupported _id type: {:?}",
            other.element_type()
        ))),
    }
}

pub fn record_id_to_bson(id: &RecordId) -> Result<Bson, DbError> {
    match id {
        RecordId::ObjectId(hex) => ObjectId::parse_str(hex)
            .map(Bson::ObjectId)
            .map_err(|e| DbError::InvalidDocument(format!("invalid ObjectId '{hex}': {e}"))),
        RecordId::Text(s) => Ok(Bson::String(s.clone())),
        RecordId::Int(n) => Ok(Bson::Int64(*n)),
    }
}

/// Convert a fetched document into a [`Record`].
pub fn record_from_document(mut doc: Document) -> Result<Record, DbError> {
    let raw_id = doc
        .remove("_id")
        .ok_or_else(|| DbError::InvalidDocument("document has no _id".into()))?;
    let id = record_id_from_bson(&raw_id)?;

    let serde_json::Value::Object(fields) = Bson::Document(doc).into_relaxed_extjson() else {
        return Err(DbError::InvalidDocument(format!(
            "document {id} did not convert to a JSON object"
        )));
    };

    Ok(Record::new(id, fields))
}

/// Convert a JSON value (extended JSON allowed) into BSON.
pub fn json_to_bson(value: &serde_json::Value) -> Result<Bson, DbError> {
    Bson::try_from(value.clone())
        .map_err(|e| DbError::InvalidDocument(format!("value is not valid extended JSON: {e}")))
}

/// Convert a JSON field map into a BSON document.
pub fn fields_to_document(fields: &Fields) -> Result<Document, DbError> {
    let mut doc = Document::new();
    for (key, value) in fields {
        doc.insert(key.clone(), json_to_bson(value)?);
    }
    Ok(doc)
}

/// Build the update document for a `$set` / `$unset` pair.
///
/// Returns `None` when there is nothing to change; MongoDB rejects empty
/// update documents.
pub fn update_document(set: &Fields, unset: &[String]) -> Result<Option<Document>, DbError> {
    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", fields_to_document(set)?);
    }
    if !unset.is_empty() {
        let fields: Document = unset
            .iter()
            .map(|f| (f.clone(), Bson::String(String::new())))
            .collect();
        update.insert("$unset", fields);
    }
    Ok((!update.is_empty()).then_some(update))
}
