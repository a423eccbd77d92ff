use super::{KeyValueStore, merge_into};
use crate::{
    entities::{Record, record},
    errors::Result,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseConnection, EntityTrait, TransactionTrait,
    sea_query::OnConflict,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

/// [`KeyValueStore`] backed by the SeaORM `records` table.
///
/// Conditional operations run inside a database transaction, so they are
/// atomic with respect to other writers of the same database.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Wraps an open connection. The `records` table must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

async fn find_value<C>(conn: &C, key: &str) -> Result<Option<Value>>
where
    C: ConnectionTrait,
{
    Ok(Record::find_by_id(key.to_owned())
        .one(conn)
        .await?
        .map(|row| row.value))
}

async fn upsert<C>(conn: &C, key: &str, value: Value) -> Result<()>
where
    C: ConnectionTrait,
{
    let row = record::ActiveModel {
        key: Set(key.to_owned()),
        value: Set(value),
        updated_at: Set(Utc::now()),
    };
    Record::insert(row)
        .on_conflict(
            OnConflict::column(record::Column::Key)
                .update_columns([record::Column::Value, record::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for SeaOrmStore {
    #[instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        find_value(&self.db, key).await
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn set(&self, key: &str, value: Value) -> Result<()> {
        upsert(&self.db, key, value).await?;
        trace!("record written");
        Ok(())
    }

    #[instrument(level = "debug", skip(self, patch))]
    async fn update(&self, key: &str, patch: Value) -> Result<Value> {
        let txn = self.db.begin().await?;
        let mut merged = find_value(&txn, key)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
        merge_into(&mut merged, patch);
        upsert(&txn, key, merged.clone()).await?;
        txn.commit().await?;
        Ok(merged)
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let result = Record::delete_by_id(key.to_owned()).exec(&self.db).await?;
        debug!(rows = result.rows_affected, "record deleted");
        Ok(())
    }

    #[instrument(level = "debug", skip(self, expected, new))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool> {
        let txn = self.db.begin().await?;
        let current = find_value(&txn, key).await?;
        if current.as_ref() != expected {
            txn.rollback().await?;
            debug!("compare-and-swap lost: record changed since it was read");
            return Ok(false);
        }
        upsert(&txn, key, new).await?;
        txn.commit().await?;
        Ok(true)
    }

    #[instrument(level = "debug", skip(self))]
    async fn increment(&self, key: &str, field: &str) -> Result<i64> {
        let txn = self.db.begin().await?;
        let mut record = find_value(&txn, key)
            .await?
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()));
        let next = record.get(field).and_then(Value::as_i64).unwrap_or(0) + 1;
        record[field] = Value::from(next);
        upsert(&txn, key, record).await?;
        txn.commit().await?;
        debug!(value = next, "counter incremented");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::{keys, read, write};
    use crate::test_utils::{init_test_tracing, setup_file_store, setup_test_store};
    use std::sync::Arc;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get_round_trip() -> Result<()> {
        init_test_tracing();
        let store = setup_test_store().await?;

        store.set("ticket:1", json!({"ticketId": "1", "status": "open"})).await?;
        let value = store.get("ticket:1").await?;

        assert_eq!(value, Some(json!({"ticketId": "1", "status": "open"})));
        assert_eq!(store.get("ticket:2").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_overwrites_whole_record() -> Result<()> {
        let store = setup_test_store().await?;

        store.set("guild:1", json!({"guildId": "1", "pingRoleId": "9"})).await?;
        store.set("guild:1", json!({"guildId": "1"})).await?;

        assert_eq!(store.get("guild:1").await?, Some(json!({"guildId": "1"})));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_merges_and_creates() -> Result<()> {
        let store = setup_test_store().await?;

        let created = store.update("user:7", json!({"accessToken": "abc"})).await?;
        assert_eq!(created, json!({"accessToken": "abc"}));

        store.update("user:7", json!({"activeTicketId": "t1"})).await?;
        assert_eq!(
            store.get("user:7").await?,
            Some(json!({"accessToken": "abc", "activeTicketId": "t1"}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() -> Result<()> {
        let store = setup_test_store().await?;

        store.set("thread:5", json!({"ticketId": "t"})).await?;
        store.delete("thread:5").await?;
        store.delete("thread:5").await?;

        assert_eq!(store.get("thread:5").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_compare_and_swap_insert_if_absent() -> Result<()> {
        let store = setup_test_store().await?;

        let first = store.compare_and_swap("ticket:1", None, json!({"n": 1})).await?;
        let second = store.compare_and_swap("ticket:1", None, json!({"n": 2})).await?;

        assert!(first);
        assert!(!second, "second insert must lose");
        assert_eq!(store.get("ticket:1").await?, Some(json!({"n": 1})));
        Ok(())
    }

    #[tokio::test]
    async fn test_compare_and_swap_detects_stale_read() -> Result<()> {
        let store = setup_test_store().await?;
        store.set("user:1", json!({"activeTicketId": null})).await?;

        let seen = store.get("user:1").await?.unwrap();
        store.update("user:1", json!({"activeTicketId": "other"})).await?;

        let swapped = store
            .compare_and_swap("user:1", Some(&seen), json!({"activeTicketId": "mine"}))
            .await?;
        assert!(!swapped);
        assert_eq!(
            store.get("user:1").await?,
            Some(json!({"activeTicketId": "other"}))
        );

        let fresh = store.get("user:1").await?.unwrap();
        assert!(
            store
                .compare_and_swap("user:1", Some(&fresh), json!({"activeTicketId": "mine"}))
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_increment_counts_from_one() -> Result<()> {
        let store = setup_test_store().await?;
        let key = keys::case_counter("42");

        assert_eq!(store.increment(&key, "lastCaseNumber").await?, 1);
        assert_eq!(store.increment(&key, "lastCaseNumber").await?, 2);
        assert_eq!(store.increment(&key, "lastCaseNumber").await?, 3);
        assert_eq!(store.get(&key).await?, Some(json!({"lastCaseNumber": 3})));
        Ok(())
    }

    #[tokio::test]
    async fn test_increment_continues_existing_counter() -> Result<()> {
        let store = setup_test_store().await?;
        store.set("counter:9", json!({"lastCaseNumber": 41})).await?;

        assert_eq!(store.increment("counter:9", "lastCaseNumber").await?, 42);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_hand_out_distinct_values() -> Result<()> {
        const WRITERS: i64 = 20;
        let (_dir, store) = setup_file_store().await?;
        let store = Arc::new(store);
        let key = keys::case_counter("42");

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                tokio::spawn(async move { store.increment(&key, "lastCaseNumber").await })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap()?);
        }
        values.sort_unstable();

        assert_eq!(values, (1..=WRITERS).collect::<Vec<_>>());
        assert_eq!(store.get(&key).await?, Some(json!({"lastCaseNumber": WRITERS})));
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_read_and_write() -> Result<()> {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Index {
            ticket_id: String,
        }

        let store = setup_test_store().await?;
        write(
            &store,
            "thread:3",
            &Index {
                ticket_id: "t3".into(),
            },
        )
        .await?;

        let index: Option<Index> = read(&store, "thread:3").await?;
        assert_eq!(
            index,
            Some(Index {
                ticket_id: "t3".into()
            })
        );
        assert_eq!(store.get("thread:3").await?, Some(json!({"ticketId": "t3"})));
        Ok(())
    }
}
