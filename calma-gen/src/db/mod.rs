//! Database access for calma-gen
//!
//! **[GEN-DB-010]** SQLite-backed durable state: generation records, the
//! voice and background-track catalogs with pricing, and per-user credit
//! accounting.

pub mod meditations;
pub mod profiles;
pub mod voices;

use calma_common::{Result, RetryPolicy};
use sqlx::SqlitePool;
use std::path::Path;

/// Retry policy for transient SQLite lock contention
pub(crate) fn lock_retry_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 8,
        base_delay: std::time::Duration::from_millis(10),
        max_delay: std::time::Duration::from_secs(1),
        jitter: std::time::Duration::from_millis(20),
    }
}

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create calma-gen tables if they don't exist and seed catalog defaults
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meditations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            language_code TEXT NOT NULL,
            is_beginner INTEGER NOT NULL DEFAULT 0,
            purpose TEXT NOT NULL,
            voice_id TEXT,
            background_track TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            script TEXT,
            technique TEXT,
            title TEXT,
            description TEXT,
            storage_path TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voices (
            voice_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            speed REAL NOT NULL DEFAULT 1.0,
            price_multiplier REAL NOT NULL DEFAULT 1.0,
            is_default INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bg_tracks (
            bgtrack_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price_multiplier REAL NOT NULL DEFAULT 1.0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            meditation_credits_used INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    seed_catalog_defaults(pool).await?;

    Ok(())
}

/// Seed the canonical default voice and background tracks so a fresh
/// database can serve jobs without manual catalog setup.
async fn seed_catalog_defaults(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO voices (voice_id, name, speed, price_multiplier, is_default)
        VALUES ('XB0fDUnXU5powFXDhCwa', 'Charlotte', 0.85, 1.0, 1)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO bg_tracks (bgtrack_id, name, price_multiplier) VALUES
            ('gentle', 'Gentle', 1.0),
            ('silence', 'Silence', 1.0)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
