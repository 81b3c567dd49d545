use sparza_core::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Malformed document: {0}")]
    InvalidDocument(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Mongo(e) => StoreError::Backend(e.to_string()),
            DbError::InvalidDocument(msg) => StoreError::InvalidDocument(msg),
        }
    }
}
