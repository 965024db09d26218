// Domain Layer - Pure business logic and entities

pub mod access;
pub mod error;
pub mod job;
pub mod log;
pub mod page;

// Re-exports
pub use access::{Command, PolicyRoles, Principal, PolicySet, RowPolicy, Table};
pub use error::DomainError;
pub use job::{Job, JobId, JobStatus, JsonMap, VisitedUrls};
pub use log::{LogEntry, LogId, LogLevel};
pub use page::{Page, PageId};
