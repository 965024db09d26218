// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Number of jobs carrying a given status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Outcome written by [`JobRepository::complete`]
///
/// `None` optionals leave the stored column untouched, except
/// `error_message` and `finished_at`, which are always written.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub status: JobStatus,
    pub finished_at: Option<i64>,
    pub research_costs: Option<Decimal>,
    pub visited_urls: Option<Vec<String>>,
    pub report: Option<String>,
    pub error_message: Option<String>,
}

impl JobCompletion {
    /// Stamp `finished_at = now` only when `status` is terminal
    pub fn new(job_id: impl Into<String>, status: JobStatus, now_millis: i64) -> Self {
        Self {
            job_id: job_id.into(),
            finished_at: status.is_terminal().then_some(now_millis),
            status,
            research_costs: None,
            visited_urls: None,
            report: None,
            error_message: None,
        }
    }
}

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Write a job's outcome in one statement and return the stored row;
    /// `NotFound` if the row does not exist
    async fn complete(&self, completion: &JobCompletion) -> Result<Job>;

    /// Atomically add `delta` to research_costs, returning the new total
    async fn add_cost(&self, id: &JobId, delta: Decimal) -> Result<Decimal>;

    /// Atomically append URLs not yet in visited_urls, returning the full list
    async fn append_visited_urls(&self, id: &JobId, urls: &[String]) -> Result<Vec<String>>;

    /// Direct children of a job, oldest first
    async fn find_children(&self, parent_id: &JobId) -> Result<Vec<Job>>;

    /// Most recently started jobs with the given status
    async fn find_by_status(&self, status: &JobStatus, limit: i64) -> Result<Vec<Job>>;

    /// Most recently started jobs
    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>>;

    /// Job counts grouped by status
    async fn count_by_status(&self) -> Result<Vec<StatusCount>>;

    /// Delete a job row; returns whether a row was removed
    async fn delete(&self, id: &JobId) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_completion_stamps_finished_at() {
        let completion = JobCompletion::new("job-1", JobStatus::completed(), 5000);
        assert_eq!(completion.finished_at, Some(5000));
        assert!(completion.research_costs.is_none());
        assert!(completion.visited_urls.is_none());
    }

    #[test]
    fn test_non_terminal_completion_leaves_finished_at_null() {
        let completion = JobCompletion::new("job-1", JobStatus::new("summarizing").unwrap(), 5000);
        assert!(completion.finished_at.is_none());
    }
}
