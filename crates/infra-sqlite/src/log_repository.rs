// SQLite LogRepository Implementation

use crate::error::{decode_json_map, map_sqlx_error};
use async_trait::async_trait;
use scrapetrack_core::domain::{JobId, LogEntry, LogId, LogLevel};
use scrapetrack_core::error::{AppError, Result};
use scrapetrack_core::port::{LogQuery, LogRepository};
use sqlx::SqlitePool;
use std::str::FromStr;

pub struct SqliteLogRepository {
    pool: SqlitePool,
}

impl SqliteLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepository for SqliteLogRepository {
    async fn insert(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO logs (id, job_id, level, message, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.job_id)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(serde_json::to_string(&entry.details)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_job(&self, job_id: &JobId, query: &LogQuery) -> Result<Vec<LogEntry>> {
        // Newest `limit` lines, handed back oldest first (tail semantics).
        // Ties on created_at fall back to insertion order (rowid).
        // A negative LIMIT means "no limit" in SQLite.
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, job_id, level, message, details, created_at FROM (
                SELECT id, job_id, level, message, details, created_at, rowid AS seq
                FROM logs
                WHERE job_id = ?
                  AND (? IS NULL OR level = ?)
                ORDER BY created_at DESC, seq DESC
                LIMIT ?
            )
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(job_id)
        .bind(query.level.map(|l| l.as_str()))
        .bind(query.level.map(|l| l.as_str()))
        .bind(query.limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    async fn delete(&self, id: &LogId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: String,
    job_id: String,
    level: String,
    message: String,
    details: String,
    created_at: i64,
}

impl LogRow {
    fn into_entry(self) -> Result<LogEntry> {
        let level = LogLevel::from_str(&self.level)
            .map_err(|e| AppError::Database(format!("Log {}: {}", self.id, e)))?;

        Ok(LogEntry {
            details: decode_json_map("details", &self.details)?,
            id: self.id,
            job_id: self.job_id,
            level,
            message: self.message,
            created_at: self.created_at,
        })
    }
}
