//! Entity module - SeaORM entity definitions for the database.
//! The store needs a single table; each entity has a Model struct for data
//! and an Entity struct for operations.

/// The `records` key-value table
pub mod record;

pub use record::{Column as RecordColumn, Entity as Record, Model as RecordModel};
