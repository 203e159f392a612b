//! Durable (L2) address cache operations
//!
//! **[APA-CSH-020]** Keyed by fingerprint, version-scoped, idempotent upserts.
//! Access-stat updates are issued fire-and-forget by the caller and must
//! never gate the response path.

use crate::models::CacheEntry;
use crate::Result;
use sqlx::{Row, SqlitePool};

/// Idempotent upsert keyed by fingerprint.
pub async fn upsert(pool: &SqlitePool, entry: &CacheEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO address_cache (
            fingerprint, raw_address, normalized, canonical_text, result,
            confidence, match_strategy, gazetteer_version, manually_verified,
            created_at, last_accessed, access_count
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fingerprint) DO UPDATE SET
            raw_address = excluded.raw_address,
            normalized = excluded.normalized,
            canonical_text = excluded.canonical_text,
            result = excluded.result,
            confidence = excluded.confidence,
            match_strategy = excluded.match_strategy,
            gazetteer_version = excluded.gazetteer_version,
            last_accessed = excluded.last_accessed
        "#,
    )
    .bind(&entry.fingerprint)
    .bind(&entry.raw)
    .bind(&entry.normalized)
    .bind(&entry.result.canonical_text)
    .bind(serde_json::to_string(&entry.result)?)
    .bind(entry.result.confidence)
    .bind(entry.result.match_strategy.as_str())
    .bind(&entry.gazetteer_version)
    .bind(entry.manually_verified as i64)
    .bind(entry.created_at.to_rfc3339())
    .bind(entry.last_accessed.to_rfc3339())
    .bind(entry.access_count)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch an entry by fingerprint, regardless of version. The caller is
/// responsible for the version-currency check before serving it.
pub async fn get(pool: &SqlitePool, fingerprint: &str) -> Result<Option<CacheEntry>> {
    let row = sqlx::query(
        r#"
        SELECT fingerprint, raw_address, normalized, result, gazetteer_version,
               manually_verified, created_at, last_accessed, access_count
        FROM address_cache
        WHERE fingerprint = ?
        "#,
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(decode_row(row)?)),
        None => Ok(None),
    }
}

/// Bump access statistics for a served entry.
pub async fn touch_access(pool: &SqlitePool, fingerprint: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE address_cache
        SET last_accessed = ?, access_count = access_count + 1
        WHERE fingerprint = ?
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(fingerprint)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete entries carrying the given version. Manually verified rows are
/// retained as editorial seed (they are version-checked at read time and
/// never served stale).
pub async fn invalidate_version(pool: &SqlitePool, version: &str) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM address_cache WHERE gazetteer_version = ? AND manually_verified = 0",
    )
    .bind(version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete all entries whose version differs from the current one, except
/// manually verified rows.
pub async fn purge_stale(pool: &SqlitePool, current_version: &str) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM address_cache WHERE gazetteer_version != ? AND manually_verified = 0",
    )
    .bind(current_version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Most-accessed current-version entries, for L1 warm-up.
pub async fn top_accessed(
    pool: &SqlitePool,
    current_version: &str,
    limit: i64,
) -> Result<Vec<CacheEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT fingerprint, raw_address, normalized, result, gazetteer_version,
               manually_verified, created_at, last_accessed, access_count
        FROM address_cache
        WHERE gazetteer_version = ?
        ORDER BY access_count DESC, last_accessed DESC
        LIMIT ?
        "#,
    )
    .bind(current_version)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}

/// Total number of cached entries.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM address_cache")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Entries awaiting review: confidence in the [review_low, high) band.
pub async fn review_count(pool: &SqlitePool, review_low: f64, high: f64) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM address_cache WHERE confidence >= ? AND confidence < ?",
    )
    .bind(review_low)
    .bind(high)
    .fetch_one(pool)
    .await?;
    Ok(n)
}

/// Mark an entry as editorially verified.
pub async fn mark_verified(pool: &SqlitePool, fingerprint: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE address_cache SET manually_verified = 1 WHERE fingerprint = ?")
        .bind(fingerprint)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<CacheEntry> {
    let result: String = row.get("result");
    let created_at: String = row.get("created_at");
    let last_accessed: String = row.get("last_accessed");
    let manually_verified: i64 = row.get("manually_verified");

    Ok(CacheEntry {
        fingerprint: row.get("fingerprint"),
        raw: row.get("raw_address"),
        normalized: row.get("normalized"),
        result: serde_json::from_str(&result)?,
        gazetteer_version: row.get("gazetteer_version"),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| crate::Error::Internal(format!("bad created_at: {}", e)))?
            .with_timezone(&chrono::Utc),
        last_accessed: chrono::DateTime::parse_from_rfc3339(&last_accessed)
            .map_err(|e| crate::Error::Internal(format!("bad last_accessed: {}", e)))?
            .with_timezone(&chrono::Utc),
        access_count: row.get("access_count"),
        manually_verified: manually_verified != 0,
    })
}
