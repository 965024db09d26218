//! Schema-level guarantees checked against a real SQLite database
//!
//! Raw SQL is used where the point is what the schema itself enforces,
//! independent of the ledger's own validation.

use scrapetrack_core::domain::{Command, JobStatus, Principal, Table};
use scrapetrack_core::port::{JobRepository, PolicyRepository};
use scrapetrack_core::AppError;
use scrapetrack_infra_sqlite::{
    create_pool, run_migrations, SqliteJobRepository, SqlitePolicyRepository, SqlitePool,
};

async fn migrated_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

async fn insert_minimal_job(pool: &SqlitePool, id: &str) {
    sqlx::query("INSERT INTO jobs (id, started_at, status) VALUES (?, ?, ?)")
        .bind(id)
        .bind(1_700_000_000_000i64)
        .bind("in_progress")
        .execute(pool)
        .await
        .unwrap();
}

/// A job inserted with only id, started_at and status picks up the column defaults
#[tokio::test]
async fn test_minimal_job_insert_gets_defaults() {
    let pool = migrated_pool().await;
    insert_minimal_job(&pool, "job-1").await;

    let job = SqliteJobRepository::new(pool)
        .find_by_id(&"job-1".to_string())
        .await
        .unwrap()
        .expect("job should exist");

    assert!(job.visited_urls.is_empty());
    assert!(job.additional_info.is_empty());
    assert!(job.research_costs.is_zero());
    assert!(job.finished_at.is_none());
    assert!(job.parent_job_id.is_none());
    assert_eq!(job.status, JobStatus::in_progress());
}

#[tokio::test]
async fn test_parent_job_must_exist() {
    let pool = migrated_pool().await;
    insert_minimal_job(&pool, "root").await;

    sqlx::query("INSERT INTO jobs (id, parent_job_id, started_at, status) VALUES ('child', 'root', 1, 'in_progress')")
        .execute(&pool)
        .await
        .unwrap();

    let orphan = sqlx::query(
        "INSERT INTO jobs (id, parent_job_id, started_at, status) VALUES ('orphan', 'missing', 1, 'in_progress')",
    )
    .execute(&pool)
    .await;
    assert!(orphan.is_err(), "dangling parent_job_id must be rejected");
}

#[tokio::test]
async fn test_pages_and_logs_reference_existing_jobs() {
    let pool = migrated_pool().await;
    insert_minimal_job(&pool, "job-1").await;

    for (table, sql) in [
        (
            "pages",
            "INSERT INTO pages (id, job_id, url, scraped_at) VALUES (?, ?, 'https://example.com', 1)",
        ),
        (
            "logs",
            "INSERT INTO logs (id, job_id, level, message, created_at) VALUES (?, ?, 'info', 'hi', 1)",
        ),
    ] {
        sqlx::query(sql)
            .bind(format!("{}-ok", table))
            .bind("job-1")
            .execute(&pool)
            .await
            .unwrap_or_else(|e| panic!("{} insert for existing job failed: {}", table, e));

        let dangling = sqlx::query(sql)
            .bind(format!("{}-bad", table))
            .bind("no-such-job")
            .execute(&pool)
            .await;
        assert!(dangling.is_err(), "{} row with unknown job_id accepted", table);
    }

    // job_id is mandatory as well
    let null_job = sqlx::query(
        "INSERT INTO pages (id, job_id, url, scraped_at) VALUES ('p-null', NULL, 'https://example.com', 1)",
    )
    .execute(&pool)
    .await;
    assert!(null_job.is_err());
}

#[tokio::test]
async fn test_referenced_job_cannot_be_deleted() {
    let pool = migrated_pool().await;
    insert_minimal_job(&pool, "job-1").await;
    sqlx::query("INSERT INTO logs (id, job_id, level, message, created_at) VALUES ('l1', 'job-1', 'info', 'hi', 1)")
        .execute(&pool)
        .await
        .unwrap();

    let repo = SqliteJobRepository::new(pool.clone());
    let err = repo.delete(&"job-1".to_string()).await.unwrap_err();
    assert!(matches!(err, AppError::ForeignKeyViolation(_)));

    sqlx::query("DELETE FROM logs WHERE id = 'l1'")
        .execute(&pool)
        .await
        .unwrap();
    assert!(repo.delete(&"job-1".to_string()).await.unwrap());
}

/// Stored policies: public read, authenticated write, no delete
#[tokio::test]
async fn test_stored_access_policies() {
    let pool = migrated_pool().await;
    let policy = SqlitePolicyRepository::new(pool)
        .load_policy_set()
        .await
        .unwrap();

    let anon = Principal::Anonymous;
    let user = Principal::authenticated("researcher");

    for table in Table::ALL {
        assert!(policy.is_rls_enabled(table));

        assert!(policy.allows(&anon, table, Command::Select));
        assert!(!policy.allows(&anon, table, Command::Insert));
        assert!(!policy.allows(&anon, table, Command::Update));
        assert!(!policy.allows(&anon, table, Command::Delete));

        assert!(policy.allows(&user, table, Command::Select));
        assert!(policy.allows(&user, table, Command::Insert));
        assert!(policy.allows(&user, table, Command::Update));
        assert!(!policy.allows(&user, table, Command::Delete));

        assert!(policy.allows(&Principal::ServiceRole, table, Command::Delete));
    }
}
