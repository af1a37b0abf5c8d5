//! Opening the indexer store and applying `schema.sql`.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const SCHEMA: &str = include_str!("schema.sql");
const POOL_SIZE: u32 = 5;

/// Open (creating if missing) the store at `db_path` and bring its schema up to date.
///
/// Every pooled connection enforces foreign keys and runs in WAL mode with a
/// 5s busy timeout.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let path = Path::new(db_path);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(sqlx::Error::Io)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_SIZE)
        .connect_with(options)
        .await?;

    let applied = apply_schema(&pool).await?;
    let tables = count_tables(&pool).await?;
    info!(path = db_path, statements = applied, tables, "Indexer store ready");
    Ok(pool)
}

fn schema_statements() -> impl Iterator<Item = &'static str> {
    SCHEMA.split(';').map(str::trim).filter(|stmt| !stmt.is_empty())
}

/// Apply every schema statement in one transaction. Statements are `IF NOT EXISTS`,
/// so reapplying to an existing store is a no-op.
async fn apply_schema(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0;
    for stmt in schema_statements() {
        sqlx::query(stmt).execute(&mut *tx).await?;
        applied += 1;
    }
    tx.commit().await?;
    Ok(applied)
}

async fn count_tables(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (tables,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(pool)
    .await?;
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("nested")
            .join("test.db")
            .to_string_lossy()
            .to_string();

        let pool = init_db(&db_path).await.expect("init_db failed");
        assert!(Path::new(&db_path).exists());

        let result: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_schema_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .expect("query failed");
        let tables: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        for expected in [
            "assets",
            "blocks",
            "funding_index_updates",
            "liquidity_tiers",
            "markets",
            "orders",
            "perpetual_markets",
            "perpetual_positions",
            "tendermint_events",
            "vaults",
        ] {
            assert!(tables.contains(&expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_orders_reject_both_expiries() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");

        let err = sqlx::query(
            r#"
            INSERT INTO orders (
                id, subaccount_id, client_id, clob_pair_id, side, size, total_filled, price,
                type, status, time_in_force, reduce_only, order_flags, good_til_block,
                good_til_block_time, client_metadata, updated_at, updated_at_height
            )
            VALUES ('a', 'b', 1, 1, 'BUY', '1', '0', '1', 'LIMIT', 'OPEN', 'GTT', 0, 0, 10, 1000, 0, 0, 1)
            "#,
        )
        .execute(&pool)
        .await
        .expect_err("insert with both expiries should fail");
        let db_err = err.as_database_error().expect("database error");
        assert!(db_err.is_check_violation());
    }

    #[tokio::test]
    async fn test_schema_reapply_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");

        let before = count_tables(&pool).await.unwrap();
        let applied = apply_schema(&pool).await.expect("second schema run failed");
        assert_eq!(applied, schema_statements().count());
        assert_eq!(count_tables(&pool).await.unwrap(), before);
        assert_eq!(before, 10);
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");

        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);

        let result: (i64,) = sqlx::query_as("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 5000);

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert!(
            matches!(result.0.as_str(), "wal" | "delete"),
            "journal_mode {}",
            result.0
        );
    }
}
