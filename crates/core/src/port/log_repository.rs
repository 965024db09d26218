// Log Repository Port (Interface)

use crate::domain::{JobId, LogEntry, LogId, LogLevel};
use crate::error::Result;
use async_trait::async_trait;

/// Filter for reading a job's log lines
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Only lines at exactly this level
    pub level: Option<LogLevel>,
    /// Keep the newest `limit` lines (returned oldest first)
    pub limit: Option<i64>,
}

/// Repository interface for job logs
#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn insert(&self, entry: &LogEntry) -> Result<()>;

    async fn find_by_job(&self, job_id: &JobId, query: &LogQuery) -> Result<Vec<LogEntry>>;

    async fn delete(&self, id: &LogId) -> Result<bool>;
}
