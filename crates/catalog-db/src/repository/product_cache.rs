//! # Product Cache Repository
//!
//! SQL for the two cache tables.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  upsert_all(records, at): one transaction              │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    INSERT ... ON CONFLICT(id) DO UPDATE   ← record 1 (full replace)    │
//! │    INSERT ... ON CONFLICT(id) DO UPDATE   ← record 2                   │
//! │    ...                                                                  │
//! │    INSERT ... ON CONFLICT(id) DO UPDATE   ← cache_metadata.last_updated│
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any failure before COMMIT rolls everything back when the transaction  │
//! │  is dropped, so readers see either the old set or the new one.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use catalog_core::{CacheMetadata, ProductRecord};

/// Repository for the `product_cache` and `cache_metadata` tables.
#[derive(Debug, Clone)]
pub struct ProductCacheRepository {
    pool: SqlitePool,
}

impl ProductCacheRepository {
    /// Creates a new ProductCacheRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductCacheRepository { pool }
    }

    /// Upserts every record by id and stamps `last_updated = at`, atomically.
    ///
    /// ## Returns
    /// Number of records written.
    pub async fn upsert_all(&self, records: &[ProductRecord], at: DateTime<Utc>) -> DbResult<usize> {
        debug!(records = records.len(), "Upserting cached records");

        let mut tx = self.pool.begin().await?;

        for record in records {
            upsert_record(&mut tx, record, at).await?;
        }
        write_last_updated(&mut tx, at).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(records.len())
    }

    /// Replaces the whole cached set with `records`, atomically.
    ///
    /// Records absent from `records` are removed. Used when full syncs are
    /// configured to prune remotely deleted records.
    pub async fn replace_all(&self, records: &[ProductRecord], at: DateTime<Utc>) -> DbResult<usize> {
        debug!(records = records.len(), "Replacing cached record set");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_cache")
            .execute(&mut *tx)
            .await?;
        for record in records {
            upsert_record(&mut tx, record, at).await?;
        }
        write_last_updated(&mut tx, at).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(records.len())
    }

    /// Returns every cached record, in no particular order.
    pub async fn list_all(&self) -> DbResult<Vec<ProductRecord>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, payload FROM product_cache")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, payload)| decode_record(&id, &payload))
            .collect()
    }

    /// Gets a single cached record by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductRecord>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM product_cache WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        payload
            .map(|payload| decode_record(id, &payload))
            .transpose()
    }

    /// Reads the metadata row, if one has been written.
    pub async fn metadata(&self) -> DbResult<Option<CacheMetadata>> {
        let last_updated: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_updated FROM cache_metadata WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(last_updated.map(|last_updated| CacheMetadata { last_updated }))
    }

    /// Counts cached records.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_cache")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Empties both tables in one transaction.
    pub async fn clear(&self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_cache")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cache_metadata")
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

async fn upsert_record(
    conn: &mut SqliteConnection,
    record: &ProductRecord,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let payload = serde_json::to_string(record)
        .map_err(|e| DbError::Internal(format!("encode record {}: {}", record.id, e)))?;

    sqlx::query(
        r#"
        INSERT INTO product_cache (id, payload, modified_at, cached_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            payload = excluded.payload,
            modified_at = excluded.modified_at,
            cached_at = excluded.cached_at
        "#,
    )
    .bind(&record.id)
    .bind(payload)
    .bind(record.modified_at())
    .bind(at)
    .execute(conn)
    .await?;

    Ok(())
}

async fn write_last_updated(conn: &mut SqliteConnection, at: DateTime<Utc>) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cache_metadata (id, last_updated)
        VALUES (1, ?1)
        ON CONFLICT(id) DO UPDATE SET last_updated = excluded.last_updated
        "#,
    )
    .bind(at)
    .execute(conn)
    .await?;

    Ok(())
}

fn decode_record(id: &str, payload: &str) -> DbResult<ProductRecord> {
    serde_json::from_str(payload).map_err(|e| DbError::corrupt_record(id, e))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    async fn repo() -> ProductCacheRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .product_cache()
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_record() {
        let repo = repo().await;
        let original = ProductRecord::new("p-1", "Maple Co", at(0))
            .with_categories(["Food"])
            .with_tags(["organic"]);
        repo.upsert_all(&[original], at(1)).await.unwrap();

        let replacement = ProductRecord::new("p-1", "Maple Company", at(10)).with_categories(["Food"]);
        repo.upsert_all(&[replacement.clone()], at(11)).await.unwrap();

        let stored = repo.get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(stored, replacement);
        assert!(stored.tags.is_empty());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_metadata_tracks_last_write() {
        let repo = repo().await;
        assert!(repo.metadata().await.unwrap().is_none());

        repo.upsert_all(&[], at(5)).await.unwrap();
        assert_eq!(repo.metadata().await.unwrap().unwrap().last_updated, at(5));

        repo.upsert_all(&[ProductRecord::new("p-1", "A", at(0))], at(5) + Duration::minutes(3))
            .await
            .unwrap();
        assert_eq!(
            repo.metadata().await.unwrap().unwrap().last_updated,
            at(185)
        );
    }

    #[tokio::test]
    async fn test_replace_all_prunes_missing_records() {
        let repo = repo().await;
        repo.upsert_all(
            &[
                ProductRecord::new("p-1", "A", at(0)),
                ProductRecord::new("p-2", "B", at(0)),
            ],
            at(1),
        )
        .await
        .unwrap();

        repo.replace_all(&[ProductRecord::new("p-2", "B", at(2))], at(3))
            .await
            .unwrap();

        let ids: Vec<String> = repo.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["p-2".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_empties_both_tables() {
        let repo = repo().await;
        repo.upsert_all(&[ProductRecord::new("p-1", "A", at(0))], at(1))
            .await
            .unwrap();

        repo.clear().await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.metadata().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_payload_is_reported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO product_cache (id, payload, modified_at, cached_at) VALUES ('bad', 'not json', '', '')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.product_cache().list_all().await.unwrap_err();
        assert!(matches!(err, DbError::CorruptRecord { ref id, .. } if id == "bad"));
    }
}
