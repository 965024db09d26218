// SQLite PageRepository Implementation

use crate::error::{decode_json_map, map_sqlx_error};
use async_trait::async_trait;
use scrapetrack_core::domain::{JobId, Page, PageId};
use scrapetrack_core::error::{AppError, Result};
use scrapetrack_core::port::PageRepository;
use sqlx::SqlitePool;

pub struct SqlitePageRepository {
    pool: SqlitePool,
}

impl SqlitePageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageRepository for SqlitePageRepository {
    async fn insert(&self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, job_id, url, title, content, metadata, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&page.id)
        .bind(&page.job_id)
        .bind(&page.url)
        .bind(&page.title)
        .bind(&page.content)
        .bind(serde_json::to_string(&page.metadata)?)
        .bind(page.scraped_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PageId) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>("SELECT * FROM pages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(PageRow::into_page).transpose()
    }

    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(
            "SELECT * FROM pages WHERE job_id = ? ORDER BY scraped_at ASC, rowid ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PageRow::into_page).collect()
    }

    async fn find_by_url(&self, url: &str) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(
            "SELECT * FROM pages WHERE url = ? ORDER BY scraped_at DESC, rowid DESC",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PageRow::into_page).collect()
    }

    async fn update(&self, page: &Page) -> Result<()> {
        // job_id and scraped_at identify the capture and are never rewritten
        let result = sqlx::query(
            "UPDATE pages SET url = ?, title = ?, content = ?, metadata = ? WHERE id = ?",
        )
        .bind(&page.url)
        .bind(&page.title)
        .bind(&page.content)
        .bind(serde_json::to_string(&page.metadata)?)
        .bind(&page.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Page {} not found", page.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &PageId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PageRow {
    id: String,
    job_id: String,
    url: String,
    title: Option<String>,
    content: Option<String>,
    metadata: String,
    scraped_at: i64,
}

impl PageRow {
    fn into_page(self) -> Result<Page> {
        Ok(Page {
            metadata: decode_json_map("metadata", &self.metadata)?,
            id: self.id,
            job_id: self.job_id,
            url: self.url,
            title: self.title,
            content: self.content,
            scraped_at: self.scraped_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use scrapetrack_core::domain::Job;
    use scrapetrack_core::port::JobRepository;

    async fn setup_with_job() -> (SqlitePool, Job) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let job = Job::new_test("pages");
        SqliteJobRepository::new(pool.clone())
            .insert(&job)
            .await
            .unwrap();
        (pool, job)
    }

    #[tokio::test]
    async fn test_insert_and_list_by_job() {
        let (pool, job) = setup_with_job().await;
        let repo = SqlitePageRepository::new(pool);

        let mut first = Page::new("p1", &job.id, "https://example.com/1", 10);
        first.title = Some("One".to_string());
        first
            .metadata
            .insert("scraper".to_string(), serde_json::json!("BeautifulSoupScraper"));
        let second = Page::new("p2", &job.id, "https://example.com/2", 20);

        repo.insert(&second).await.unwrap();
        repo.insert(&first).await.unwrap();

        let pages = repo.find_by_job(&job.id).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "p1");
        assert_eq!(pages[0].metadata["scraper"], "BeautifulSoupScraper");
        assert!(pages[1].content.is_none());
    }

    #[tokio::test]
    async fn test_same_timestamp_pages_keep_insertion_order() {
        let (pool, job) = setup_with_job().await;
        let repo = SqlitePageRepository::new(pool);

        for id in ["c", "b", "a"] {
            repo.insert(&Page::new(id, &job.id, "https://example.com/same", 10))
                .await
                .unwrap();
        }

        let pages = repo.find_by_job(&job.id).await.unwrap();
        assert_eq!(
            pages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["c", "b", "a"]
        );

        let captures = repo.find_by_url("https://example.com/same").await.unwrap();
        assert_eq!(
            captures.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn test_unknown_job_is_foreign_key_violation() {
        let (pool, _job) = setup_with_job().await;
        let repo = SqlitePageRepository::new(pool);

        let page = Page::new("p1", "no-such-job", "https://example.com", 10);
        let err = repo.insert(&page).await.unwrap_err();
        assert!(matches!(err, AppError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_update_and_find_by_url() {
        let (pool, job) = setup_with_job().await;
        let repo = SqlitePageRepository::new(pool);

        let mut page = Page::new("p1", &job.id, "https://example.com/a", 10);
        repo.insert(&page).await.unwrap();
        repo.insert(&Page::new("p2", &job.id, "https://example.com/a", 30))
            .await
            .unwrap();

        page.content = Some("rescraped body".to_string());
        repo.update(&page).await.unwrap();

        let found = repo.find_by_id(&"p1".to_string()).await.unwrap().unwrap();
        assert_eq!(found.content.as_deref(), Some("rescraped body"));
        assert_eq!(found.scraped_at, 10);

        let captures = repo.find_by_url("https://example.com/a").await.unwrap();
        assert_eq!(
            captures.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["p2", "p1"]
        );

        let missing = Page::new("p9", &job.id, "https://example.com", 0);
        assert!(matches!(
            repo.update(&missing).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
