//! Layered configuration: defaults < `scrapetrack.toml` < `--config` file < `SCRAPETRACK_*` env

use anyhow::{bail, Context, Result};
use scrapetrack_core::domain::Principal;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_DB_PATH: &str = "~/.scrapetrack/ledger.db";
pub const DEFAULT_LOG_FORMAT: &str = "pretty";

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// SQLite file path, or `:memory:`
    pub db_path: String,
    /// `pretty` or `json`
    pub log_format: String,
    /// Key that unlocks the bypass role (`--service-key`)
    #[serde(default)]
    pub service_role_key: Option<String>,
}

impl LedgerConfig {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("log_format", DEFAULT_LOG_FORMAT)?
            .add_source(config::File::with_name("scrapetrack").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("SCRAPETRACK"))
            .build()
            .context("Failed to read configuration")?;

        let mut cfg: LedgerConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.db_path = shellexpand::tilde(&cfg.db_path).into_owned();
        Ok(cfg)
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.contains(":memory:")
    }

    /// Work out who the command runs as
    ///
    /// `--service-key` wins over `--user`; a key that does not match the
    /// configured one is an error rather than a silent downgrade.
    pub fn resolve_principal(
        &self,
        user: Option<&str>,
        service_key: Option<&str>,
    ) -> Result<Principal> {
        if let Some(key) = service_key {
            match self.service_role_key.as_deref() {
                Some(expected) if !expected.is_empty() && expected == key => {
                    return Ok(Principal::ServiceRole)
                }
                Some(_) => bail!("Service role key rejected"),
                None => bail!("No service role key is configured (set SCRAPETRACK_SERVICE_ROLE_KEY)"),
            }
        }

        match user.map(str::trim) {
            Some("") => bail!("--user must not be empty"),
            Some(subject) => Ok(Principal::authenticated(subject)),
            None => Ok(Principal::Anonymous),
        }
    }
}
