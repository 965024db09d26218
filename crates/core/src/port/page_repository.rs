// Page Repository Port (Interface)

use crate::domain::{JobId, Page, PageId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for scraped pages
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn insert(&self, page: &Page) -> Result<()>;

    async fn find_by_id(&self, id: &PageId) -> Result<Option<Page>>;

    /// Pages scraped for a job, in scrape order
    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<Page>>;

    /// Every capture of a URL across jobs, newest first
    async fn find_by_url(&self, url: &str) -> Result<Vec<Page>>;

    /// Explicit update of title/content/metadata; `NotFound` if missing
    async fn update(&self, page: &Page) -> Result<()>;

    async fn delete(&self, id: &PageId) -> Result<bool>;
}
