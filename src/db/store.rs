use anyhow::{Context, Result};

use super::{queries, DbPool};
use crate::models::LocationRecord;

/// Append-only access to the `locations` table. Rows are never updated or
/// deleted individually.
#[derive(Debug, Clone)]
pub struct LocationStore {
    pool: DbPool,
}

impl LocationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Writes the record and returns the id the database assigned to it.
    /// The record's own `id` is ignored.
    pub async fn insert(&self, record: &LocationRecord) -> Result<i64> {
        let result = sqlx::query(queries::INSERT_LOCATION)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(&record.student_id)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .context("failed to insert location")?;
        Ok(result.last_insert_rowid())
    }

    /// All stored records in insertion order.
    pub async fn read_all(&self) -> Result<Vec<LocationRecord>> {
        let records = sqlx::query_as::<_, LocationRecord>(queries::SELECT_ALL_LOCATIONS)
            .fetch_all(&self.pool)
            .await
            .context("failed to read locations")?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(queries::COUNT_LOCATIONS)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Maintenance only; ingestion never clears.
    #[allow(dead_code)]
    pub async fn clear(&self) -> Result<()> {
        sqlx::query(queries::DELETE_ALL_LOCATIONS)
            .execute(&self.pool)
            .await
            .context("failed to clear locations")?;
        Ok(())
    }
}
