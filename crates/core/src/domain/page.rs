// Scraped Page Domain Model

use crate::domain::job::{JobId, JsonMap};
use serde::{Deserialize, Serialize};

/// Page ID (UUID v4)
pub type PageId = String;

/// A page scraped on behalf of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub job_id: JobId,
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub metadata: JsonMap,
    pub scraped_at: i64, // epoch ms
}

impl Page {
    pub fn new(
        id: impl Into<String>,
        job_id: impl Into<String>,
        url: impl Into<String>,
        scraped_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            url: url.into(),
            title: None,
            content: None,
            metadata: JsonMap::new(),
            scraped_at,
        }
    }

    /// Content length in characters (0 when no content was captured)
    pub fn content_length(&self) -> usize {
        self.content.as_deref().map_or(0, |c| c.chars().count())
    }
}
