use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::{info, warn};

pub mod queries;
pub mod store;

pub use store::LocationStore;

pub type DbPool = Pool<Sqlite>;

/// Bumping this drops and recreates the `locations` table on next start.
pub const SCHEMA_VERSION: i64 = 1;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url '{}'", database_url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Brings the schema to [`SCHEMA_VERSION`]. Older schemas are dropped, not migrated.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    migrate_to(pool, SCHEMA_VERSION).await
}

async fn migrate_to(pool: &DbPool, target: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let current: i64 = sqlx::query_scalar(queries::SELECT_USER_VERSION)
        .fetch_one(&mut *tx)
        .await?;

    if current == target {
        return Ok(());
    }
    if current > target {
        bail!(
            "database schema version {} is newer than supported version {}; downgrade not supported",
            current,
            target
        );
    }

    if current == 0 {
        info!("Creating locations table (schema v{})", target);
    } else {
        warn!(
            "Upgrading schema v{} -> v{}: dropping stored locations",
            current, target
        );
        sqlx::query(queries::DROP_LOCATIONS).execute(&mut *tx).await?;
    }

    sqlx::query(queries::CREATE_LOCATIONS).execute(&mut *tx).await?;
    // PRAGMA does not accept bound parameters
    let set_version = format!("PRAGMA user_version = {};", target);
    sqlx::query(&set_version).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> DbPool {
    // one connection: every `sqlite::memory:` connection is its own database
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}
