use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_name ON categories (name)"#,
    r#"CREATE TABLE IF NOT EXISTS medicines (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        batch_no TEXT NOT NULL,
        expiry_date TEXT NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0,
        category_id INTEGER NOT NULL REFERENCES categories (id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS coupons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coupon_code TEXT NOT NULL,
        expiry_date TEXT NOT NULL,
        usage_type TEXT NOT NULL,
        min_order_value REAL NOT NULL DEFAULT 0,
        valid_time_window_start TEXT,
        valid_time_window_end TEXT,
        terms_and_conditions TEXT NOT NULL DEFAULT '',
        discount_type TEXT NOT NULL,
        discount_value REAL NOT NULL,
        max_usage_per_user INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_coupons_coupon_code ON coupons (coupon_code)"#,
    // Medicine and category ids are stored by value; catalog rows need not exist yet.
    r#"CREATE TABLE IF NOT EXISTS coupon_medicines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coupon_id INTEGER NOT NULL REFERENCES coupons (id) ON DELETE CASCADE,
        medicine_id TEXT NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_coupon_medicines_coupon_id ON coupon_medicines (coupon_id)"#,
    r#"CREATE TABLE IF NOT EXISTS coupon_categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coupon_id INTEGER NOT NULL REFERENCES coupons (id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_coupon_categories_coupon_id ON coupon_categories (coupon_id)"#,
];

/// Opens the SQLite store, creating the file if missing, and ensures the schema exists.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database url {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .context("Failed to open SQLite database")?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Creates every table and index the service needs. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    debug!("Ensuring coupon schema exists");
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(tx.as_mut())
            .await
            .context("Failed to migrate database")?;
    }
    tx.commit().await?;
    info!("Database schema ensured");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn migrate_creates_all_tables() {
        let pool = test_pool().await;
        let tables = table_names(&pool).await;
        for expected in [
            "categories",
            "coupon_categories",
            "coupon_medicines",
            "coupons",
            "medicines",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = test_pool().await;
        tokio_test::assert_ok!(migrate(&pool).await);
    }

    #[tokio::test]
    async fn coupon_delete_cascades_to_links() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO coupons (coupon_code, expiry_date, usage_type, discount_type, discount_value, created_at, updated_at)
             VALUES ('X', '2030-01-01T00:00:00Z', 'one_time', 'flat', 1, '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO coupon_medicines (coupon_id, medicine_id) VALUES (1, 'med_1')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO coupon_categories (coupon_id, category_id) VALUES (1, 7)")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query("DELETE FROM coupons WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        let links: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM coupon_medicines) + (SELECT COUNT(*) FROM coupon_categories)",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(links, 0);
    }

    #[tokio::test]
    async fn init_pool_fails_on_unreachable_path() {
        tokio_test::assert_err!(init_pool("sqlite:///no-such-dir/nested/coupons.db").await);
    }
}
