// Migration Runner

use crate::error::map_sqlx_error;
use scrapetrack_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Ordered schema migrations: (version, description, SQL)
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "Initial schema (jobs, pages, logs)",
        include_str!("../migrations/001_initial_schema.sql"),
    ),
    (
        2,
        "Row-level security policies",
        include_str!("../migrations/002_row_level_security.sql"),
    ),
];

/// Latest schema version this build knows about
pub fn latest_schema_version() -> i64 {
    MIGRATIONS.last().map_or(0, |(v, _, _)| *v)
}

/// Run database migrations; returns the schema version afterwards
pub async fn run_migrations(pool: &SqlitePool) -> Result<i64> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY NOT NULL,
            description TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    let current_version = current_schema_version(pool).await?;
    info!("Current schema version: {}", current_version);

    // Apply migrations sequentially
    for (version, description, sql) in MIGRATIONS {
        if current_version < *version {
            info!("Applying migration {:03}: {}", version, description);
            apply_migration(pool, *version, description, sql).await?;
        }
    }

    info!("All migrations applied successfully");
    current_schema_version(pool).await
}

pub async fn current_schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(version.unwrap_or(0))
}

/// Apply a single migration SQL file and record it, atomically
async fn apply_migration(pool: &SqlitePool, version: i64, description: &str, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    for statement in split_statements(sql) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    sqlx::query(
        "INSERT INTO schema_version (version, description, applied_at) \
         VALUES (?, ?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
    )
    .bind(version)
    .bind(description)
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx_error)?;

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

/// Drop `--` comment lines, then split what remains on `;`
///
/// Comments go first so a `;` inside one never produces a statement.
fn split_statements(sql: &str) -> Vec<String> {
    let code = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(|statement| statement.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
