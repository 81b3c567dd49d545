//! Translation of [`FieldFilter`] into MongoDB query documents.
//!
//! `{field: null}` matches documents where the field is missing or null, and
//! `{field: {$ne: null}}` matches the complement, which is exactly the
//! present/missing split the core filters use.

use mongodb::bson::{doc, Bson, Document};
use sparza_core::store::FieldFilter;

use crate::convert::json_to_bson;
use crate::error::DbError;

pub fn to_query(filter: &FieldFilter) -> Result<Document, DbError> {
    let query = match filter {
        FieldFilter::All => Document::new(),
        FieldFilter::AllPresent(fields) => and(fields.iter().map(|f| present(f)).collect()),
        FieldFilter::AnyPresent(fields) => or(fields.iter().map(|f| present(f)).collect()),
        FieldFilter::AnyMissing(fields) => or(fields.iter().map(|f| missing(f)).collect()),
        FieldFilter::AllMissing(fields) => and(fields.iter().map(|f| missing(f)).collect()),
        FieldFilter::Equals(field, value) => {
            let mut query = Document::new();
            query.insert(field.clone(), json_to_bson(value)?);
            query
        }
        FieldFilter::And(filters) => and(
            filters
                .iter()
                .map(to_query)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(query)
}

fn present(field: &str) -> Document {
    let mut query = Document::new();
    query.insert(field, doc! { "$ne": Bson::Null });
    query
}

fn missing(field: &str) -> Document {
    let mut query = Document::new();
    query.insert(field, Bson::Null);
    query
}

/// Conjunction; an empty list matches everything.
fn and(mut clauses: Vec<Document>) -> Document {
    match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    }
}

/// Disjunction; an empty list matches nothing.
fn or(mut clauses: Vec<Document>) -> Document {
    match clauses.len() {
        0 => doc! { "_id": { "$exists": false } },
        1 => clauses.remove(0),
        _ => doc! { "$or": clauses },
    }
}
