// sqlx::Error -> AppError mapping
//
// Orphan rules prevent `impl From<sqlx::Error> for AppError` here, so every
// query maps through this helper.

use scrapetrack_core::error::AppError;

/// Convert sqlx::Error to AppError; constraint failures keep their kind
/// (SQLite result codes: https://www.sqlite.org/rescode.html)
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return AppError::ForeignKeyViolation(message)
                }
                sqlx::error::ErrorKind::NotNullViolation => {
                    return AppError::NotNullViolation(message)
                }
                sqlx::error::ErrorKind::UniqueViolation => {
                    return AppError::Conflict(format!("Unique constraint violation: {}", message))
                }
                _ => {}
            }
            match db_err.code().as_deref() {
                // SQLITE_BUSY - database is locked
                Some("5") => {
                    AppError::Database(format!("Database locked (SQLITE_BUSY): {}", message))
                }
                // SQLITE_FULL - database or disk is full
                Some("13") => AppError::Database(format!("Database full: {}", message)),
                Some(code) => AppError::Database(format!("Database error [{}]: {}", code, message)),
                None => AppError::Database(format!("Database error: {}", message)),
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            AppError::Database(format!("Failed to decode column {}: {}", index, source))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// Decode a stored JSON object column, surfacing corruption as a database error
pub(crate) fn decode_json_map(
    column: &str,
    raw: &str,
) -> scrapetrack_core::Result<scrapetrack_core::domain::JsonMap> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(Default::default()),
        Ok(other) => Err(AppError::Database(format!(
            "Column {} holds non-object JSON: {}",
            column, other
        ))),
        Err(e) => Err(AppError::Database(format!(
            "Column {} holds invalid JSON: {}",
            column, e
        ))),
    }
}
