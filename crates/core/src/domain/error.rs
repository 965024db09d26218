// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job status: {0:?}")]
    InvalidStatus(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Cost delta must not be negative: {0}")]
    NegativeCost(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
