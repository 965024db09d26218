// Scrape Ledger - Use cases for recording scrape jobs, pages and logs
//
// Every operation runs as a `Principal` and is checked against the loaded
// `PolicySet` before any repository is touched.

pub mod requests;


pub use requests::{CreateJobRequest, InsertLogRequest, InsertPageRequest, UpdateJobRequest};

use crate::domain::{
    Command, Job, JobId, JobStatus, LogEntry, LogId, LogLevel, Page, PageId, PolicySet, Principal, Table,
};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, JobCompletion, JobRepository, LogQuery, LogRepository, PageRepository, PolicyRepository,
    StatusCount, TimeProvider,
};
use requests::{validate_cost_delta, validate_json_map, validate_message, validate_url};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A job together with all of its descendants
#[derive(Debug, Clone, Serialize)]
pub struct JobTree {
    pub job: Job,
    pub children: Vec<JobTree>,
}

impl JobTree {
    /// Number of jobs in the tree, root included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(JobTree::size).sum::<usize>()
    }

    /// Sum of research_costs over the whole tree
    pub fn total_cost(&self) -> Decimal {
        self.job.research_costs
            + self
                .children
                .iter()
                .map(JobTree::total_cost)
                .sum::<Decimal>()
    }
}

/// Job counts grouped by status
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub total_jobs: i64,
    pub by_status: Vec<(String, i64)>,
}

impl LedgerSummary {
    fn from_counts(counts: Vec<StatusCount>) -> Self {
        let total_jobs = counts.iter().map(|c| c.count).sum();
        Self {
            total_jobs,
            by_status: counts.into_iter().map(|c| (c.status, c.count)).collect(),
        }
    }

    pub fn count(&self, status: &str) -> i64 {
        self.by_status
            .iter()
            .find(|(s, _)| s == status)
            .map_or(0, |(_, c)| *c)
    }
}

/// Scrape ledger service
pub struct ScrapeLedger {
    jobs: Arc<dyn JobRepository>,
    pages: Arc<dyn PageRepository>,
    logs: Arc<dyn LogRepository>,
    policy: PolicySet,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ScrapeLedger {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        pages: Arc<dyn PageRepository>,
        logs: Arc<dyn LogRepository>,
        policy: PolicySet,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            jobs,
            pages,
            logs,
            policy,
            id_provider,
            time_provider,
        }
    }

    /// Build a ledger whose policies come from the store
    pub async fn load(
        jobs: Arc<dyn JobRepository>,
        pages: Arc<dyn PageRepository>,
        logs: Arc<dyn LogRepository>,
        policies: &dyn PolicyRepository,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let policy = policies.load_policy_set().await?;
        debug!(
            policies = policy.policies().len(),
            "Loaded row-level security policies"
        );
        Ok(Self::new(jobs, pages, logs, policy, id_provider, time_provider))
    }

    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }

    // --- jobs -------------------------------------------------------------

    /// Create a job in `in_progress` with zero cost and no visited URLs
    pub async fn create_job(&self, principal: &Principal, req: CreateJobRequest) -> Result<JobId> {
        self.policy.check(principal, Table::Jobs, Command::Insert)?;

        let additional_info = validate_json_map("additional_info", req.additional_info)?;

        if let Some(parent_id) = &req.parent_job_id {
            if self.jobs.find_by_id(parent_id).await?.is_none() {
                return Err(AppError::Validation(format!(
                    "parent_job_id {} does not reference an existing job",
                    parent_id
                )));
            }
        }

        let job_id = self.id_provider.generate_id();
        let mut job = Job::new(
            job_id.clone(),
            self.time_provider.now_millis(),
            JobStatus::in_progress(),
        );
        job.parent_job_id = req.parent_job_id;
        job.query = req.query;
        job.agent = req.agent;
        job.role = req.role;
        job.report_type = req.report_type;
        job.additional_info = additional_info;

        debug!(job_id = %job_id, parent_job_id = ?job.parent_job_id, "Creating research job");

        if let Err(e) = self.jobs.insert(&job).await {
            warn!(
                error = %e,
                query = ?job.query,
                agent = ?job.agent,
                role = ?job.role,
                report_type = ?job.report_type,
                "Failed to create research job"
            );
            return Err(e);
        }

        info!(job_id = %job_id, principal = %principal, "Created research job");
        Ok(job_id)
    }

    /// Record a job's outcome; a terminal status stamps finished_at
    pub async fn update_job(&self, principal: &Principal, req: UpdateJobRequest) -> Result<Job> {
        self.policy.check(principal, Table::Jobs, Command::Update)?;
        let status = JobStatus::new(req.status)?;
        if let Some(cost) = req.research_costs {
            validate_cost_delta(cost)?;
        }

        let mut completion =
            JobCompletion::new(req.job_id, status, self.time_provider.now_millis());
        completion.research_costs = req.research_costs;
        completion.visited_urls = req.visited_urls.map(|urls| {
            let mut unique: Vec<String> = Vec::with_capacity(urls.len());
            for url in urls {
                if !unique.contains(&url) {
                    unique.push(url);
                }
            }
            unique
        });
        completion.report = req.report;
        completion.error_message = req.error_message;

        let job = self.jobs.complete(&completion).await?;

        info!(
            job_id = %job.id,
            status = %job.status,
            research_costs = %job.research_costs,
            visited_urls = job.visited_urls.len(),
            "Updated research job"
        );
        Ok(job)
    }

    pub async fn get_job(&self, principal: &Principal, id: &JobId) -> Result<Option<Job>> {
        self.policy.check(principal, Table::Jobs, Command::Select)?;

        let job = self.jobs.find_by_id(id).await?;
        if job.is_none() {
            warn!(job_id = %id, "No research job found");
        }
        Ok(job)
    }

    /// Fetch a job and every descendant under it
    pub async fn get_job_tree(&self, principal: &Principal, id: &JobId) -> Result<JobTree> {
        let root = self.require_job(principal, id).await?;

        let mut children_of: HashMap<JobId, Vec<Job>> = HashMap::new();
        let mut seen: HashSet<JobId> = HashSet::from([root.id.clone()]);
        let mut frontier = vec![root.id.clone()];

        while let Some(parent_id) = frontier.pop() {
            let children = self.jobs.find_children(&parent_id).await?;
            let mut kept = Vec::with_capacity(children.len());
            for child in children {
                if seen.insert(child.id.clone()) {
                    frontier.push(child.id.clone());
                    kept.push(child);
                }
            }
            children_of.insert(parent_id, kept);
        }

        Ok(assemble_tree(root, &mut children_of))
    }

    /// Newest jobs first, optionally restricted to one status
    pub async fn list_jobs(
        &self,
        principal: &Principal,
        status: Option<&JobStatus>,
        limit: i64,
    ) -> Result<Vec<Job>> {
        self.policy.check(principal, Table::Jobs, Command::Select)?;

        match status {
            Some(status) => self.jobs.find_by_status(status, limit).await,
            None => self.jobs.list_recent(limit).await,
        }
    }

    /// Add to a job's accumulated research cost
    pub async fn add_cost(
        &self,
        principal: &Principal,
        id: &JobId,
        delta: Decimal,
    ) -> Result<Decimal> {
        self.policy.check(principal, Table::Jobs, Command::Update)?;
        validate_cost_delta(delta)?;

        let total = self.jobs.add_cost(id, delta).await?;
        debug!(job_id = %id, delta = %delta, total = %total, "Added research cost");
        Ok(total)
    }

    /// Append URLs to a job's visited list, skipping ones already present
    pub async fn record_visited_urls(
        &self,
        principal: &Principal,
        id: &JobId,
        urls: &[String],
    ) -> Result<Vec<String>> {
        self.policy.check(principal, Table::Jobs, Command::Update)?;
        for url in urls {
            validate_url(url)?;
        }

        let visited = self.jobs.append_visited_urls(id, urls).await?;
        debug!(job_id = %id, visited = visited.len(), "Recorded visited URLs");
        Ok(visited)
    }

    /// Remove a job row. No delete policy exists, so only the bypass role
    /// gets past RLS; the store still rejects rows that are referenced.
    pub async fn delete_job(&self, principal: &Principal, id: &JobId) -> Result<()> {
        self.policy.check(principal, Table::Jobs, Command::Delete)?;

        if !self.jobs.delete(id).await? {
            return Err(AppError::NotFound(format!("Job {} not found", id)));
        }
        info!(job_id = %id, "Deleted research job");
        Ok(())
    }

    pub async fn summary(&self, principal: &Principal) -> Result<LedgerSummary> {
        self.policy.check(principal, Table::Jobs, Command::Select)?;
        let counts = self.jobs.count_by_status().await?;
        Ok(LedgerSummary::from_counts(counts))
    }

    // --- pages ------------------------------------------------------------

    pub async fn insert_page(&self, principal: &Principal, req: InsertPageRequest) -> Result<Page> {
        self.policy.check(principal, Table::Pages, Command::Insert)?;
        validate_url(&req.url)?;
        let metadata = validate_json_map("metadata", req.metadata)?;

        let mut page = Page::new(
            self.id_provider.generate_id(),
            req.job_id,
            req.url,
            self.time_provider.now_millis(),
        );
        page.title = req.title;
        page.content = req.content;
        page.metadata = metadata;

        debug!(job_id = %page.job_id, url = %page.url, "Inserting scraped page");

        if let Err(e) = self.pages.insert(&page).await {
            warn!(
                error = %e,
                job_id = %page.job_id,
                url = %page.url,
                content_length = page.content_length(),
                "Failed to insert scraped page"
            );
            return Err(e);
        }

        info!(job_id = %page.job_id, url = %page.url, "Inserted scraped page");
        Ok(page)
    }

    pub async fn get_pages(&self, principal: &Principal, job_id: &JobId) -> Result<Vec<Page>> {
        self.policy.check(principal, Table::Pages, Command::Select)?;

        let pages = self.pages.find_by_job(job_id).await?;
        info!(job_id = %job_id, count = pages.len(), "Retrieved scraped pages");
        Ok(pages)
    }

    /// Every stored capture of a URL, newest first
    pub async fn find_pages_by_url(&self, principal: &Principal, url: &str) -> Result<Vec<Page>> {
        self.policy.check(principal, Table::Pages, Command::Select)?;
        self.pages.find_by_url(url).await
    }

    /// Explicitly rewrite a page's title, content or metadata
    pub async fn update_page(&self, principal: &Principal, page: &Page) -> Result<()> {
        self.policy.check(principal, Table::Pages, Command::Update)?;
        validate_url(&page.url)?;
        validate_json_map(
            "metadata",
            Some(serde_json::Value::Object(page.metadata.clone())),
        )?;

        self.pages.update(page).await?;
        debug!(page_id = %page.id, "Updated scraped page");
        Ok(())
    }

    pub async fn delete_page(&self, principal: &Principal, id: &PageId) -> Result<()> {
        self.policy.check(principal, Table::Pages, Command::Delete)?;

        if !self.pages.delete(id).await? {
            return Err(AppError::NotFound(format!("Page {} not found", id)));
        }
        Ok(())
    }

    // --- logs -------------------------------------------------------------

    pub async fn insert_log(&self, principal: &Principal, req: InsertLogRequest) -> Result<LogEntry> {
        self.policy.check(principal, Table::Logs, Command::Insert)?;
        validate_message(&req.message)?;
        let details = validate_json_map("details", req.details)?;

        let mut entry = LogEntry::new(
            self.id_provider.generate_id(),
            req.job_id,
            req.level,
            req.message,
            self.time_provider.now_millis(),
        );
        entry.details = details;

        if let Err(e) = self.logs.insert(&entry).await {
            warn!(
                error = %e,
                job_id = %entry.job_id,
                level = %entry.level,
                "Failed to insert log"
            );
            return Err(e);
        }

        debug!(job_id = %entry.job_id, level = %entry.level, "Inserted log");
        Ok(entry)
    }

    pub async fn get_logs(
        &self,
        principal: &Principal,
        job_id: &JobId,
        level: Option<LogLevel>,
        limit: Option<i64>,
    ) -> Result<Vec<LogEntry>> {
        self.policy.check(principal, Table::Logs, Command::Select)?;
        self.logs
            .find_by_job(job_id, &LogQuery { level, limit })
            .await
    }

    pub async fn delete_log(&self, principal: &Principal, id: &LogId) -> Result<()> {
        self.policy.check(principal, Table::Logs, Command::Delete)?;

        if !self.logs.delete(id).await? {
            return Err(AppError::NotFound(format!("Log {} not found", id)));
        }
        Ok(())
    }

    async fn require_job(&self, principal: &Principal, id: &JobId) -> Result<Job> {
        self.get_job(principal, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
    }
}

fn assemble_tree(job: Job, children_of: &mut HashMap<JobId, Vec<Job>>) -> JobTree {
    let children = children_of
        .remove(&job.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| assemble_tree(child, children_of))
        .collect();
    JobTree { job, children }
}
