// Scrapetrack Infrastructure - SQLite Adapter
// Implements: JobRepository, PageRepository, LogRepository, PolicyRepository

mod connection;
mod error;
mod job_repository;
mod log_repository;
mod migration;
mod page_repository;
mod policy_repository;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use log_repository::SqliteLogRepository;
pub use migration::{current_schema_version, latest_schema_version, run_migrations};
pub use page_repository::SqlitePageRepository;
pub use policy_repository::SqlitePolicyRepository;
pub use sqlx::SqlitePool;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
