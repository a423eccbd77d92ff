//! Database configuration module.
//!
//! This module handles the `SQLite` connection backing the key-value store and
//! creates the `records` table from its entity definition with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! model without hand-written SQL.

use crate::entities::Record;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Establishes a connection to the database at `database_url`.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the `records` table if it does not exist yet.
///
/// Safe to call on every startup.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut record_table = schema.create_table_from_entity(Record);
    record_table.if_not_exists();

    db.execute(builder.build(&record_table)).await?;
    info!("Database tables ensured");

    Ok(())
}
