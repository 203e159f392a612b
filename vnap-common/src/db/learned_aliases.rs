//! Learned alias operations
//!
//! Editorial feedback rows: alternative surface forms confirmed by reviewers.
//! Approved aliases are folded into the gazetteer index synonyms on the next
//! settings rebuild.

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// One learned alias row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedAlias {
    pub alias: String,
    pub canonical: String,
    pub admin_id: Option<String>,
    pub level: Option<i64>,
    pub approved: bool,
}

/// Insert or refresh an alias suggestion.
pub async fn upsert(pool: &SqlitePool, alias: &LearnedAlias) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learned_aliases (alias, canonical, admin_id, level, approved, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(alias, canonical) DO UPDATE SET
            admin_id = excluded.admin_id,
            level = excluded.level,
            approved = excluded.approved
        "#,
    )
    .bind(&alias.alias)
    .bind(&alias.canonical)
    .bind(&alias.admin_id)
    .bind(alias.level)
    .bind(alias.approved as i64)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// All approved aliases, for synonym rebuilds.
pub async fn approved(pool: &SqlitePool) -> Result<Vec<LearnedAlias>> {
    let rows = sqlx::query(
        r#"
        SELECT alias, canonical, admin_id, level, approved
        FROM learned_aliases
        WHERE approved = 1
        ORDER BY alias
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let approved: i64 = row.get("approved");
            LearnedAlias {
                alias: row.get("alias"),
                canonical: row.get("canonical"),
                admin_id: row.get("admin_id"),
                level: row.get("level"),
                approved: approved != 0,
            }
        })
        .collect())
}

/// Total number of learned aliases.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM learned_aliases")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
