// Job Domain Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Open-ended JSON object stored alongside rows (additional_info, metadata, details)
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// URLs visited while a job ran, in first-visit order
pub type VisitedUrls = Vec<String>;

/// Job status
///
/// The schema carries no check constraint on `status`, so any non-empty
/// string is storable. The well-known values below are the ones the ledger
/// itself writes; only `completed`, `failed` and `cancelled` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(String);

impl JobStatus {
    pub const IN_PROGRESS: &'static str = "in_progress";
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";
    pub const CANCELLED: &'static str = "cancelled";

    pub fn new(s: impl Into<String>) -> crate::domain::error::Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(crate::domain::error::DomainError::InvalidStatus(s));
        }
        Ok(Self(s))
    }

    pub fn in_progress() -> Self {
        Self(Self::IN_PROGRESS.to_string())
    }

    pub fn completed() -> Self {
        Self(Self::COMPLETED.to_string())
    }

    pub fn failed() -> Self {
        Self(Self::FAILED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::COMPLETED | Self::FAILED | Self::CANCELLED
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub parent_job_id: Option<JobId>,

    pub query: Option<String>,
    pub agent: Option<String>,
    pub role: Option<String>,
    pub report_type: Option<String>,

    pub started_at: i64, // epoch ms, always set
    pub finished_at: Option<i64>,
    pub status: JobStatus,

    pub research_costs: Decimal,
    pub visited_urls: VisitedUrls,
    pub report: Option<String>,
    pub error_message: Option<String>,
    pub additional_info: JsonMap,
}

impl Job {
    /// Create a job carrying only the required fields
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `started_at` - Start timestamp in epoch ms (injected, not system time)
    /// * `status` - Initial status
    pub fn new(id: impl Into<String>, started_at: i64, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            parent_job_id: None,
            query: None,
            agent: None,
            role: None,
            report_type: None,
            started_at,
            finished_at: None,
            status,
            research_costs: Decimal::ZERO,
            visited_urls: Vec::new(),
            report: None,
            error_message: None,
            additional_info: JsonMap::new(),
        }
    }

    /// Create a test job with deterministic ID and timestamp (for tests only)
    ///
    /// IDs are `test-job-1`, `test-job-2`, ...; timestamps advance by 1000.
    pub fn new_test(query: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let mut job = Self::new(
            format!("test-job-{}", counter),
            (counter * 1000) as i64,
            JobStatus::in_progress(),
        );
        job.query = Some(query.into());
        job
    }

    pub fn is_root(&self) -> bool {
        self.parent_job_id.is_none()
    }

    pub fn add_cost(&mut self, delta: Decimal) -> crate::domain::error::Result<()> {
        if delta.is_sign_negative() && !delta.is_zero() {
            return Err(crate::domain::error::DomainError::NegativeCost(
                delta.to_string(),
            ));
        }
        self.research_costs += delta;
        Ok(())
    }

    /// Append `url` unless it was already visited; returns whether it was new
    pub fn record_visited_url(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.visited_urls.contains(&url) {
            return false;
        }
        self.visited_urls.push(url);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new("job-1", 1000, JobStatus::in_progress());

        assert_eq!(job.started_at, 1000);
        assert!(job.finished_at.is_none());
        assert!(job.visited_urls.is_empty());
        assert!(job.additional_info.is_empty());
        assert_eq!(job.research_costs, Decimal::ZERO);
        assert!(job.is_root());
    }

    #[test]
    fn test_empty_status_rejected() {
        assert!(JobStatus::new("").is_err());
        assert!(JobStatus::new("   ").is_err());
        assert!(JobStatus::new("queued_for_review").is_ok());
    }

    #[test]
    fn test_add_cost_accumulates() {
        let mut job = Job::new_test("cost");
        job.add_cost(Decimal::new(125, 3)).unwrap(); // 0.125
        job.add_cost(Decimal::new(5, 2)).unwrap(); // 0.05

        assert_eq!(job.research_costs, Decimal::new(175, 3));
        assert!(job.add_cost(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_record_visited_url_dedupes() {
        let mut job = Job::new_test("urls");

        assert!(job.record_visited_url("https://example.com/a"));
        assert!(job.record_visited_url("https://example.com/b"));
        assert!(!job.record_visited_url("https://example.com/a"));
        assert_eq!(job.visited_urls.len(), 2);
    }
}
