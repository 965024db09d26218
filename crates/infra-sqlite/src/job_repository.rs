// SQLite JobRepository Implementation

use crate::error::{decode_json_map, map_sqlx_error};
use async_trait::async_trait;
use rust_decimal::Decimal;
use scrapetrack_core::domain::{Job, JobId, JobStatus};
use scrapetrack_core::error::{AppError, Result};
use scrapetrack_core::port::{JobCompletion, JobRepository, StatusCount};
use sqlx::SqlitePool;
use std::str::FromStr;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, parent_job_id, query, agent, role, report_type,
                started_at, finished_at, status,
                research_costs, visited_urls, report, error_message, additional_info
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.parent_job_id)
        .bind(&job.query)
        .bind(&job.agent)
        .bind(&job.role)
        .bind(&job.report_type)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.status.as_str())
        .bind(job.research_costs.to_string())
        .bind(serde_json::to_string(&job.visited_urls)?)
        .bind(&job.report)
        .bind(&job.error_message)
        .bind(serde_json::to_string(&job.additional_info)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn complete(&self, completion: &JobCompletion) -> Result<Job> {
        let visited_urls = completion
            .visited_urls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Columns the caller left out keep their stored value, so cost and
        // URL writes racing with the completion are never rolled back
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?,
                finished_at = ?,
                error_message = ?,
                research_costs = COALESCE(?, research_costs),
                visited_urls = COALESCE(?, visited_urls),
                report = COALESCE(?, report)
            WHERE id = ?
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.finished_at)
        .bind(&completion.error_message)
        .bind(completion.research_costs.map(|c| c.to_string()))
        .bind(visited_urls)
        .bind(&completion.report)
        .bind(&completion.job_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Job {} not found",
                completion.job_id
            )));
        }

        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(&completion.job_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        row.into_job()
    }

    async fn add_cost(&self, id: &JobId, delta: Decimal) -> Result<Decimal> {
        // research_costs is TEXT to keep decimals exact, so the sum happens
        // here. The no-op UPDATE takes the write lock before the read, which
        // lets the busy timeout queue concurrent adders instead of racing them.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let locked = sqlx::query("UPDATE jobs SET research_costs = research_costs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if locked.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", id)));
        }

        let stored: String = sqlx::query_scalar("SELECT research_costs FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let updated = parse_decimal(&stored)? + delta;

        sqlx::query("UPDATE jobs SET research_costs = ? WHERE id = ?")
            .bind(updated.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(updated)
    }

    async fn append_visited_urls(&self, id: &JobId, urls: &[String]) -> Result<Vec<String>> {
        // Writes come first so the transaction takes the write lock up front
        // instead of upgrading from a read snapshot
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Each append is a single statement, so concurrent appenders never
        // overwrite each other's URLs
        for url in urls {
            sqlx::query(
                r#"
                UPDATE jobs
                SET visited_urls = json_insert(visited_urls, '$[#]', ?)
                WHERE id = ?
                  AND NOT EXISTS (
                      SELECT 1 FROM json_each(jobs.visited_urls) WHERE json_each.value = ?
                  )
                "#,
            )
            .bind(url)
            .bind(id)
            .bind(url)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        let raw: Option<String> =
            sqlx::query_scalar("SELECT visited_urls FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some(raw) = raw else {
            return Err(AppError::NotFound(format!("Job {} not found", id)));
        };

        tx.commit().await.map_err(map_sqlx_error)?;

        decode_url_list(&raw)
    }

    async fn find_children(&self, parent_id: &JobId) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE parent_job_id = ?
            ORDER BY started_at ASC, rowid ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn find_by_status(&self, status: &JobStatus, limit: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE status = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(status.as_str())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }

    async fn delete(&self, id: &JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Database(format!("Invalid research_costs {:?}: {}", raw, e)))
}

fn decode_url_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Database(format!("Column visited_urls holds invalid JSON: {}", e)))
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    parent_job_id: Option<String>,
    query: Option<String>,
    agent: Option<String>,
    role: Option<String>,
    report_type: Option<String>,
    started_at: i64,
    finished_at: Option<i64>,
    status: String,
    research_costs: String, // exact decimal text
    visited_urls: String,   // JSON array
    report: Option<String>,
    error_message: Option<String>,
    additional_info: String, // JSON object
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::new(self.status)?;

        Ok(Job {
            research_costs: parse_decimal(&self.research_costs)?,
            visited_urls: decode_url_list(&self.visited_urls)?,
            additional_info: decode_json_map("additional_info", &self.additional_info)?,
            id: self.id,
            parent_job_id: self.parent_job_id,
            query: self.query,
            agent: self.agent,
            role: self.role,
            report_type: self.report_type,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status,
            report: self.report,
            error_message: self.error_message,
        })
    }
}
