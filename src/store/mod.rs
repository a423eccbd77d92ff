//! Key-value store used for all ticket state.
//!
//! Records are JSON documents addressed by string keys (see [`keys`]). There
//! are no multi-key transactions: each call is applied on its own. The two
//! conditional primitives, [`KeyValueStore::compare_and_swap`] and
//! [`KeyValueStore::increment`], are atomic per key and back the per-user
//! ticket slot and the per-guild case counter.

/// Key builders for every record kind
pub mod keys;
mod sea_orm_store;

pub use sea_orm_store::SeaOrmStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Async associative store of JSON records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the record stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous record.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Shallow-merges the fields of `patch` into the record under `key`,
    /// creating it when missing. Returns the merged record.
    async fn update(&self, key: &str, patch: Value) -> Result<Value>;

    /// Removes the record under `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Replaces the record under `key` with `new` only if the current record
    /// equals `expected` (`None` meaning "no record"). Returns whether the
    /// write happened.
    async fn compare_and_swap(&self, key: &str, expected: Option<&Value>, new: Value)
    -> Result<bool>;

    /// Atomically increments the integer `field` of the record under `key`
    /// (missing record or field counts as 0) and returns the new value.
    async fn increment(&self, key: &str, field: &str) -> Result<i64>;
}

/// Reads and deserializes the record under `key`.
pub async fn read<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    store
        .get(key)
        .await?
        .map(serde_json::from_value)
        .transpose()
        .map_err(Into::into)
}

/// Serializes `record` and stores it under `key`, replacing any previous record.
pub async fn write<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    record: &T,
) -> Result<()> {
    store.set(key, serde_json::to_value(record)?).await
}

/// Merges `patch` into `target`. Non-object targets are replaced outright.
pub(crate) fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(fields), Value::Object(changes)) => {
            for (name, value) in changes {
                fields.insert(name, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut record = json!({"guildId": "1", "pingRoleId": "2", "status": "active"});
        merge_into(&mut record, json!({"pingRoleId": null, "guildName": "Support"}));
        assert_eq!(
            record,
            json!({"guildId": "1", "pingRoleId": null, "status": "active", "guildName": "Support"})
        );
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        let mut record = json!(42);
        merge_into(&mut record, json!({"lastCaseNumber": 1}));
        assert_eq!(record, json!({"lastCaseNumber": 1}));
    }
}
