// Ledger Requests & Validation

use crate::domain::{JobId, JsonMap, LogLevel};
use crate::error::{AppError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum nesting of JSON maps stored in additional_info/metadata/details
pub const MAX_JSON_DEPTH: usize = 32;

/// Create a root or child job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    #[serde(default)]
    pub additional_info: Option<serde_json::Value>,
}

/// Record a job's outcome
///
/// `error_message` is always written, so omitting it clears a previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobRequest {
    pub job_id: JobId,
    pub status: String,
    #[serde(default)]
    pub research_costs: Option<Decimal>,
    #[serde(default)]
    pub visited_urls: Option<Vec<String>>,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl UpdateJobRequest {
    pub fn new(job_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: status.into(),
            research_costs: None,
            visited_urls: None,
            report: None,
            error_message: None,
        }
    }
}

/// Store a scraped page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertPageRequest {
    pub job_id: JobId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Append a log line to a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertLogRequest {
    pub job_id: JobId,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Turn an optional JSON value into the open-ended map a row stores.
///
/// Absent or `null` becomes `{}`; anything other than an object is rejected.
pub fn validate_json_map(field: &str, value: Option<serde_json::Value>) -> Result<JsonMap> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(JsonMap::new()),
        Some(serde_json::Value::Object(map)) => {
            let depth = json_depth(&serde_json::Value::Object(map.clone()));
            if depth > MAX_JSON_DEPTH {
                return Err(AppError::Validation(format!(
                    "{} is too deeply nested ({} > {} levels)",
                    field, depth, MAX_JSON_DEPTH
                )));
            }
            Ok(map)
        }
        Some(other) => Err(AppError::Validation(format!(
            "{} must be a JSON object, got {}",
            field,
            json_kind(&other)
        ))),
    }
}

pub fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("url must not be empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AppError::Validation(format!(
            "url must use http or https: {}",
            url
        )));
    }
    Ok(())
}

pub fn validate_cost_delta(delta: Decimal) -> Result<()> {
    if delta.is_sign_negative() && !delta.is_zero() {
        return Err(AppError::Validation(format!(
            "cost must not be negative: {}",
            delta
        )));
    }
    Ok(())
}

pub fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(AppError::Validation(
            "log message must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
