// SQLite PolicyRepository Implementation
//
// Reads the RLS declarations seeded by migration 002.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use scrapetrack_core::domain::{Command, PolicyRoles, PolicySet, RowPolicy, Table};
use scrapetrack_core::error::{AppError, Result};
use scrapetrack_core::port::PolicyRepository;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

pub struct SqlitePolicyRepository {
    pool: SqlitePool,
}

impl SqlitePolicyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyRepository for SqlitePolicyRepository {
    async fn load_policy_set(&self) -> Result<PolicySet> {
        let enabled: Vec<String> = sqlx::query_scalar("SELECT table_name FROM rls_tables")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut rls_tables = Vec::with_capacity(enabled.len());
        for name in enabled {
            match Table::from_str(&name) {
                Ok(table) => rls_tables.push(table),
                Err(e) => warn!(error = %e, "Ignoring RLS flag for unknown table"),
            }
        }

        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT table_name, name, command, roles FROM row_policies ORDER BY table_name, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut policies = Vec::with_capacity(rows.len());
        for (table, name, command, roles) in rows {
            let table = Table::from_str(&table)
                .map_err(|e| AppError::Database(format!("Policy {:?}: {}", name, e)))?;
            let command = Command::from_str(&command)
                .map_err(|e| AppError::Database(format!("Policy {:?}: {}", name, e)))?;
            policies.push(RowPolicy::new(name, table, command, PolicyRoles::parse(&roles)));
        }

        Ok(PolicySet::new(rls_tables, policies))
    }
}
