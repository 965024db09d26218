// Job Log Domain Model

use crate::domain::error::DomainError;
use crate::domain::job::{JobId, JsonMap};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Log ID (UUID v4)
pub type LogId = String;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(DomainError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// A structured log line attached to a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogId,
    pub job_id: JobId,
    pub level: LogLevel,
    pub message: String,
    pub details: JsonMap,
    pub created_at: i64, // epoch ms
}

impl LogEntry {
    pub fn new(
        id: impl Into<String>,
        job_id: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            level,
            message: message.into(),
            details: JsonMap::new(),
            created_at,
        }
    }
}
