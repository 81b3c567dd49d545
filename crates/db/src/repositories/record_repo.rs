//! Repository for the dataset collections (`emailmessages`, `tickets`, ...).

use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use sparza_core::data_type::DataType;
use sparza_core::store::{BulkOutcome, FieldFilter, FieldUpdate};
use sparza_core::types::{Record, RecordId};

use crate::convert::{record_from_document, record_id_to_bson, update_document};
use crate::error::DbError;
use crate::filter::to_query;
use crate::Database;

/// Provides reads and field-level writes on the dataset collections.
pub struct RecordRepo;

impl RecordRepo {
    fn collection(db: &Database, data_type: DataType) -> mongodb::Collection<Document> {
        db.collection::<Document>(data_type.collection())
    }

    /// Fetch matching records in `_id` order.
    pub async fn find(
        db: &Database,
        data_type: DataType,
        filter: &FieldFilter,
        limit: Option<u64>,
    ) -> Result<Vec<Record>, DbError> {
        let query = to_query(filter)?;
        let collection = Self::collection(db, data_type);
        let mut find = collection.find(query).sort(doc! { "_id": 1 });
        if let Some(limit) = limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let docs: Vec<Document> = find.await?.try_collect().await?;
        docs.into_iter().map(record_from_document).collect()
    }

    /// Apply many single-document updates with one unordered `update`
    /// command.
    ///
    /// Accepted by every server version (`Client::bulk_write` needs 8.0+).
    /// Statements the server rejects come back in `writeErrors` and are
    /// reported as failed.
    pub async fn bulk_update(
        db: &Database,
        data_type: DataType,
        updates: &[FieldUpdate],
    ) -> Result<BulkOutcome, DbError> {
        let mut statements = Vec::with_capacity(updates.len());
        let mut statement_ids: Vec<&RecordId> = Vec::with_capacity(updates.len());

        for update in updates {
            let Some(update_doc) = update_document(&update.set, &update.unset)? else {
                continue;
            };
            statements.push(doc! {
                "q": { "_id": record_id_to_bson(&update.id)? },
                "u": update_doc,
                "upsert": false,
                "multi": false,
            });
            statement_ids.push(&update.id);
        }

        if statements.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let reply = db
            .run_command(doc! {
                "update": data_type.collection(),
                "updates": statements,
                "ordered": false,
            })
            .await?;

        let written = read_count(&reply, "n");
        let failed = match reply.get_array("writeErrors") {
            Ok(errors) => errors
                .iter()
                .filter_map(|e| e.as_document())
                .filter_map(|e| read_index(e).and_then(|i| statement_ids.get(i)))
                .map(|id| (*id).clone())
                .collect(),
            Err(_) => Vec::new(),
        };

        if !failed.is_empty() {
            tracing::warn!(
                collection = data_type.collection(),
                failed = failed.len(),
                "Bulk update reported write errors",
            );
        }

        Ok(BulkOutcome { written, failed })
    }

    /// Apply a single update. Returns whether a document matched.
    pub async fn update_one(
        db: &Database,
        data_type: DataType,
        update: &FieldUpdate,
    ) -> Result<bool, DbError> {
        let Some(update_doc) = update_document(&update.set, &update.unset)? else {
            return Ok(true);
        };
        let result = Self::collection(db, data_type)
            .update_one(doc! { "_id": record_id_to_bson(&update.id)? }, update_doc)
            .await?;
        Ok(result.matched_count > 0)
    }

    /// `$unset` the given fields on every matching document.
    pub async fn unset_fields(
        db: &Database,
        data_type: DataType,
        fields: &[&str],
        filter: &FieldFilter,
    ) -> Result<u64, DbError> {
        if fields.is_empty() {
            return Ok(0);
        }
        let unset: Document = fields
            .iter()
            .map(|f| (f.to_string(), Bson::String(String::new())))
            .collect();
        let result = Self::collection(db, data_type)
            .update_many(to_query(filter)?, doc! { "$unset": unset })
            .await?;
        Ok(result.modified_count)
    }

    pub async fn count(
        db: &Database,
        data_type: DataType,
        filter: &FieldFilter,
    ) -> Result<u64, DbError> {
        let count = Self::collection(db, data_type)
            .count_documents(to_query(filter)?)
            .await?;
        Ok(count)
    }
}

/// Read a numeric reply field regardless of its integer width.
fn read_count(reply: &Document, key: &str) -> u64 {
    match reply.get(key) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(n)) if *n >= 0.0 => *n as u64,
        _ => 0,
    }
}

fn read_index(write_error: &Document) -> Option<usize> {
    match write_error.get("index") {
        Some(Bson::Int32(n)) => usize::try_from(*n).ok(),
        Some(Bson::Int64(n)) => usize::try_from(*n).ok(),
        _ => None,
    }
}
