//! Database access for VNAP
//!
//! **[APA-DB-010]** SQLite-backed persistence for the three collections:
//! `admin_units` (the gazetteer), `address_cache` (durable L2 tier) and
//! `learned_aliases` (editorial feedback feeding index synonyms).

pub mod address_cache;
pub mod admin_units;
pub mod learned_aliases;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and ensure the schema exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests and ephemeral runs.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the VNAP tables and indexes if they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admin_units (
            admin_id TEXT PRIMARY KEY,
            parent_id TEXT,
            level INTEGER NOT NULL,
            admin_subtype TEXT NOT NULL,
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            path TEXT NOT NULL DEFAULT '[]',
            path_normalized TEXT NOT NULL DEFAULT '[]',
            gazetteer_version TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_admin_units_parent ON admin_units(parent_id)",
        "CREATE INDEX IF NOT EXISTS idx_admin_units_level ON admin_units(level)",
        "CREATE INDEX IF NOT EXISTS idx_admin_units_subtype ON admin_units(admin_subtype)",
        "CREATE INDEX IF NOT EXISTS idx_admin_units_version ON admin_units(gazetteer_version)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS address_cache (
            fingerprint TEXT PRIMARY KEY,
            raw_address TEXT NOT NULL,
            normalized TEXT NOT NULL,
            canonical_text TEXT NOT NULL DEFAULT '',
            result TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 0.0,
            match_strategy TEXT NOT NULL DEFAULT 'fuzzy',
            gazetteer_version TEXT NOT NULL,
            manually_verified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_accessed TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_address_cache_version ON address_cache(gazetteer_version)",
        "CREATE INDEX IF NOT EXISTS idx_address_cache_accessed ON address_cache(last_accessed)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_aliases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias TEXT NOT NULL,
            canonical TEXT NOT NULL,
            admin_id TEXT,
            level INTEGER,
            approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(alias, canonical)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (admin_units, address_cache, learned_aliases)");

    Ok(())
}
