//! MongoDB access for the Sparza dataset collections.
//!
//! Repositories follow the same shape as elsewhere in the workspace: unit
//! structs with associated async functions taking a `&Database`.
//! [`MongoRecordStore`] adapts them to the pipeline's
//! [`RecordStore`](sparza_core::store::RecordStore) trait.

use mongodb::bson::doc;
use mongodb::options::ClientOptions;

pub mod convert;
pub mod error;
pub mod filter;
pub mod repositories;
pub mod store;

pub use error::DbError;
pub use store::MongoRecordStore;

pub type Database = mongodb::Database;

/// Application name reported to the server in the connection handshake.
const APP_NAME: &str = "sparza-worker";

/// Upper bound on pooled connections per host.
const MAX_POOL_SIZE: u32 = 20;

/// Connect to MongoDB and return a handle on the named database.
pub async fn connect(connection_string: &str, database_name: &str) -> Result<Database, DbError> {
    let mut options = ClientOptions::parse(connection_string).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.max_pool_size = Some(MAX_POOL_SIZE);

    let client = mongodb::Client::with_options(options)?;
    Ok(client.database(database_name))
}

/// Round-trip a `ping` command to verify the server is reachable.
pub async fn health_check(db: &Database) -> Result<(), DbError> {
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}
