//! Gazetteer table operations
//!
//! **[APA-DB-020]** The admin_units table holds exactly one gazetteer
//! snapshot. Seeding replaces the whole set in a single transaction so
//! readers never observe a half-loaded version.

use crate::models::{AdminLevel, AdminSubtype, AdminUnit};
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Replace the entire gazetteer with a new version, atomically.
pub async fn replace_all(pool: &SqlitePool, units: &[AdminUnit], version: &str) -> Result<u64> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM admin_units").execute(&mut *tx).await?;

    for unit in units {
        sqlx::query(
            r#"
            INSERT INTO admin_units (
                admin_id, parent_id, level, admin_subtype, name, normalized_name,
                aliases, path, path_normalized, gazetteer_version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&unit.admin_id)
        .bind(&unit.parent_id)
        .bind(unit.level.as_u8() as i64)
        .bind(unit.admin_subtype.as_str())
        .bind(&unit.name)
        .bind(&unit.normalized_name)
        .bind(serde_json::to_string(&unit.aliases)?)
        .bind(serde_json::to_string(&unit.path)?)
        .bind(serde_json::to_string(&unit.path_normalized)?)
        .bind(version)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        units = units.len(),
        gazetteer_version = version,
        "Gazetteer snapshot replaced"
    );

    Ok(units.len() as u64)
}

/// Load the full gazetteer snapshot.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<AdminUnit>> {
    let rows = sqlx::query(
        r#"
        SELECT admin_id, parent_id, level, admin_subtype, name, normalized_name,
               aliases, path, path_normalized, gazetteer_version
        FROM admin_units
        ORDER BY admin_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}

/// The version token of the resident snapshot, if any.
pub async fn current_version(pool: &SqlitePool) -> Result<Option<String>> {
    let version: Option<String> =
        sqlx::query_scalar("SELECT gazetteer_version FROM admin_units LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(version)
}

/// Number of units in the resident snapshot.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_units")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<AdminUnit> {
    let level: i64 = row.get("level");
    let level = AdminLevel::try_from(level as u8).map_err(Error::Gazetteer)?;

    let subtype: String = row.get("admin_subtype");
    let admin_subtype: AdminSubtype = serde_json::from_value(serde_json::Value::String(subtype))?;

    let aliases: String = row.get("aliases");
    let path: String = row.get("path");
    let path_normalized: String = row.get("path_normalized");

    Ok(AdminUnit {
        admin_id: row.get("admin_id"),
        parent_id: row.get("parent_id"),
        level,
        admin_subtype,
        name: row.get("name"),
        normalized_name: row.get("normalized_name"),
        aliases: serde_json::from_str(&aliases)?,
        path: serde_json::from_str(&path)?,
        path_normalized: serde_json::from_str(&path_normalized)?,
        gazetteer_version: row.get("gazetteer_version"),
    })
}
