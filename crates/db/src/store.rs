//! [`RecordStore`] backed by a MongoDB database.

use async_trait::async_trait;
use sparza_core::data_type::DataType;
use sparza_core::store::{
    BulkOutcome, FieldFilter, FieldUpdate, RecordStore, RunSummary, StoreError,
};
use sparza_core::types::Record;

use crate::repositories::{RecordRepo, RunRepo};
use crate::Database;

#[derive(Clone)]
pub struct MongoRecordStore {
    db: Database,
}

impl MongoRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn find(
        &self,
        data_type: DataType,
        filter: &FieldFilter,
        limit: Option<u64>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(RecordRepo::find(&self.db, data_type, filter, limit).await?)
    }

    async fn bulk_update(
        &self,
        data_type: DataType,
        updates: &[FieldUpdate],
    ) -> Result<BulkOutcome, StoreError> {
        Ok(RecordRepo::bulk_update(&self.db, data_type, updates).await?)
    }

    async fn update_one(
        &self,
        data_type: DataType,
        update: &FieldUpdate,
    ) -> Result<bool, StoreError> {
        Ok(RecordRepo::update_one(&self.db, data_type, update).await?)
    }

    async fn unset_fields(
        &self,
        data_type: DataType,
        fields: &[&str],
        filter: &FieldFilter,
    ) -> Result<u64, StoreError> {
        Ok(RecordRepo::unset_fields(&self.db, data_type, fields, filter).await?)
    }

    async fn count(&self, data_type: DataType, filter: &FieldFilter) -> Result<u64, StoreError> {
        Ok(RecordRepo::count(&self.db, data_type, filter).await?)
    }

    async fn save_run(&self, summary: &RunSummary) -> Result<(), StoreError> {
        Ok(RunRepo::save(&self.db, summary).await?)
    }
}
