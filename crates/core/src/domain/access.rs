// Row-Level Security Model
//
// Mirrors the policy declarations shipped with the schema: a table with RLS
// enabled denies every command unless some policy grants it to the caller's
// role. The service role bypasses RLS entirely.

use crate::domain::error::DomainError;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Who is issuing a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    Anonymous,
    Authenticated { subject: String },
    ServiceRole,
}

impl Principal {
    pub const ANON_ROLE: &'static str = "anon";
    pub const AUTHENTICATED_ROLE: &'static str = "authenticated";
    pub const SERVICE_ROLE: &'static str = "service_role";

    pub fn authenticated(subject: impl Into<String>) -> Self {
        Principal::Authenticated {
            subject: subject.into(),
        }
    }

    /// Database role name this principal runs as
    pub fn role(&self) -> &'static str {
        match self {
            Principal::Anonymous => Self::ANON_ROLE,
            Principal::Authenticated { .. } => Self::AUTHENTICATED_ROLE,
            Principal::ServiceRole => Self::SERVICE_ROLE,
        }
    }

    pub fn bypasses_rls(&self) -> bool {
        matches!(self, Principal::ServiceRole)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::Authenticated { subject } => write!(f, "authenticated:{}", subject),
            other => f.write_str(other.role()),
        }
    }
}

/// Tables under policy control
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Jobs,
    Pages,
    Logs,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Jobs, Table::Pages, Table::Logs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Jobs => "jobs",
            Table::Pages => "pages",
            Table::Logs => "logs",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = DomainError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "jobs" => Ok(Table::Jobs),
            "pages" => Ok(Table::Pages),
            "logs" => Ok(Table::Logs),
            _ => Err(DomainError::UnknownTable(s.to_string())),
        }
    }
}

/// SQL command a policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Select,
    Insert,
    Update,
    Delete,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Select => "SELECT",
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = DomainError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Ok(Command::Select),
            "INSERT" => Ok(Command::Insert),
            "UPDATE" => Ok(Command::Update),
            "DELETE" => Ok(Command::Delete),
            _ => Err(DomainError::UnknownCommand(s.to_string())),
        }
    }
}

/// Roles a policy is granted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyRoles {
    /// `TO public`: every role
    Public,
    Role(String),
}

impl PolicyRoles {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("public") {
            PolicyRoles::Public
        } else {
            PolicyRoles::Role(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PolicyRoles::Public => "public",
            PolicyRoles::Role(r) => r,
        }
    }

    fn grants(&self, role: &str) -> bool {
        match self {
            PolicyRoles::Public => true,
            PolicyRoles::Role(r) => r == role,
        }
    }
}

/// One `CREATE POLICY` declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPolicy {
    pub name: String,
    pub table: Table,
    pub command: Command,
    pub roles: PolicyRoles,
}

impl RowPolicy {
    pub fn new(name: impl Into<String>, table: Table, command: Command, roles: PolicyRoles) -> Self {
        Self {
            name: name.into(),
            table,
            command,
            roles,
        }
    }
}

/// Policies plus the set of tables with RLS switched on
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    rls_enabled: BTreeSet<Table>,
    policies: Vec<RowPolicy>,
}

impl PolicySet {
    pub fn new(rls_enabled: impl IntoIterator<Item = Table>, policies: Vec<RowPolicy>) -> Self {
        Self {
            rls_enabled: rls_enabled.into_iter().collect(),
            policies,
        }
    }

    /// The rule set declared by the schema: public read, authenticated
    /// insert/update, no delete policy.
    pub fn scraping_defaults() -> Self {
        let mut policies = Vec::new();
        for table in Table::ALL {
            policies.push(RowPolicy::new(
                format!("Allow public read access on {}", table),
                table,
                Command::Select,
                PolicyRoles::Public,
            ));
            policies.push(RowPolicy::new(
                format!("Allow authenticated insert on {}", table),
                table,
                Command::Insert,
                PolicyRoles::Role(Principal::AUTHENTICATED_ROLE.to_string()),
            ));
            policies.push(RowPolicy::new(
                format!("Allow authenticated update on {}", table),
                table,
                Command::Update,
                PolicyRoles::Role(Principal::AUTHENTICATED_ROLE.to_string()),
            ));
        }
        Self::new(Table::ALL, policies)
    }

    pub fn policies(&self) -> &[RowPolicy] {
        &self.policies
    }

    pub fn is_rls_enabled(&self, table: Table) -> bool {
        self.rls_enabled.contains(&table)
    }

    pub fn allows(&self, principal: &Principal, table: Table, command: Command) -> bool {
        if principal.bypasses_rls() || !self.is_rls_enabled(table) {
            return true;
        }
        let role = principal.role();
        self.policies
            .iter()
            .any(|p| p.table == table && p.command == command && p.roles.grants(role))
    }

    /// Fail with `PermissionDenied` unless `principal` may run `command` on `table`
    pub fn check(&self, principal: &Principal, table: Table, command: Command) -> Result<()> {
        if self.allows(principal, table, command) {
            return Ok(());
        }
        tracing::warn!(
            principal = %principal,
            table = %table,
            command = %command,
            "Row-level security denied request"
        );
        Err(AppError::PermissionDenied(format!(
            "role {} may not {} on {}",
            principal.role(),
            command,
            table
        )))
    }
}
