//! Ledger configuration.
//!
//! Layered with the `config` crate: built-in defaults, then the optional file
//! `config/ledger.{toml,yaml,json}`, then `TAMIRHANE_*` environment variables with
//! `__` between nested keys (`TAMIRHANE_DATABASE__URL`, `TAMIRHANE_LOG__FILTER`).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::engine::AccountRoles;

pub const ENV_PREFIX: &str = "TAMIRHANE";
pub const CONFIG_FILE: &str = "config/ledger";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when absent.
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountsConfig {
    pub receivables: String,
    pub revenue: String,
    pub default_cash: String,
    pub default_expense: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    pub database: DatabaseConfig,
    pub accounts: AccountsConfig,
    pub log: LogConfig,
}

impl LedgerConfig {
    /// Defaults, then `config/ledger.*` if present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(environment())
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        Self::from_config(config)
    }

    /// Built-in defaults, ready for more sources to be layered on top.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.max_connections", 5)
            .and_then(|b| b.set_default("accounts.receivables", "1200"))
            .and_then(|b| b.set_default("accounts.revenue", "4000"))
            .and_then(|b| b.set_default("accounts.default_cash", "1001"))
            .and_then(|b| b.set_default("accounts.default_expense", "6000"))
            .and_then(|b| b.set_default("log.filter", "info"))
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let cfg: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ConfigError::Invalid("database.url must not be blank".to_string()));
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log.filter must not be empty".to_string()));
        }

        let roles = self.roles()?;
        if roles.receivables == roles.default_cash {
            return Err(ConfigError::Invalid(format!(
                "accounts.receivables and accounts.default_cash must differ (both {})",
                roles.receivables
            )));
        }
        if roles.receivables == roles.revenue {
            return Err(ConfigError::Invalid(format!(
                "accounts.receivables and accounts.revenue must differ (both {})",
                roles.receivables
            )));
        }
        Ok(())
    }

    pub fn roles(&self) -> Result<AccountRoles, ConfigError> {
        AccountRoles::new(
            &self.accounts.receivables,
            &self.accounts.revenue,
            &self.accounts.default_cash,
            &self.accounts.default_expense,
        )
        .map_err(|e| ConfigError::Invalid(format!("accounts: {e}")))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn with_env(vars: &[(&str, &str)]) -> Result<LedgerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = LedgerConfig::defaults()?
            .add_source(environment().source(Some(map)))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        LedgerConfig::from_config(config)
    }

    #[test]
    fn defaults_match_the_standard_chart() {
        let cfg = with_env(&[]).unwrap();
        assert_eq!(cfg.database.url, None);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.log.filter, "info");
        assert_eq!(cfg.roles().unwrap(), AccountRoles::standard());
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = with_env(&[
            ("TAMIRHANE_DATABASE__URL", "postgres://ledger@localhost/tamirhane"),
            ("TAMIRHANE_DATABASE__MAX_CONNECTIONS", "12"),
            ("TAMIRHANE_ACCOUNTS__DEFAULT_CASH", "1020"),
        ])
        .unwrap();
        assert_eq!(cfg.database.url.as_deref(), Some("postgres://ledger@localhost/tamirhane"));
        assert_eq!(cfg.database.max_connections, 12);
        assert_eq!(cfg.roles().unwrap().default_cash.as_str(), "1020");
    }

    #[test]
    fn file_values_are_layered_over_defaults() {
        let config = LedgerConfig::defaults()
            .unwrap()
            .add_source(File::from_str(
                "[accounts]\nrevenue = \"4100\"\n\n[log]\nfilter = \"tamirhane=debug\"\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let cfg = LedgerConfig::from_config(config).unwrap();
        assert_eq!(cfg.accounts.revenue, "4100");
        assert_eq!(cfg.accounts.receivables, "1200");
        assert_eq!(cfg.log.filter, "tamirhane=debug");
    }

    #[test]
    fn receivables_must_not_double_as_cash() {
        let err = with_env(&[("TAMIRHANE_ACCOUNTS__DEFAULT_CASH", "1200")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn blank_codes_and_zero_pool_are_rejected() {
        let err = with_env(&[("TAMIRHANE_ACCOUNTS__REVENUE", " ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = with_env(&[("TAMIRHANE_DATABASE__MAX_CONNECTIONS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
