// Application Layer - Use Cases and Business Logic

pub mod ledger;

// Re-exports
pub use ledger::{
    CreateJobRequest, InsertLogRequest, InsertPageRequest, JobTree, LedgerSummary, ScrapeLedger,
    UpdateJobRequest,
};
