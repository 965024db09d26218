// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod log_repository;
pub mod page_repository;
pub mod policy_repository;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_repository::{JobCompletion, JobRepository, StatusCount};
pub use log_repository::{LogQuery, LogRepository};
pub use page_repository::PageRepository;
pub use policy_repository::PolicyRepository;
pub use time_provider::TimeProvider;
