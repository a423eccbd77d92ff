//! Record entity - one row per key in the key-value store.
//!
//! Values are JSON documents (user, ticket, thread index, guild, counter and
//! cooldown records); the key prefix decides which shape a row holds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Key-value record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "records")]
pub struct Model {
    /// Store key (e.g., `"ticket:1718000000000"`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// JSON document stored under the key
    pub value: Json,
    /// When this record was last written
    pub updated_at: DateTimeUtc,
}

/// Records are independent; consistency between them is by convention only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
