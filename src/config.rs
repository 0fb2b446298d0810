//! Configuration for the credit ledger

use crate::core::{
    Bank, BankContext, CreditEngine, InMemoryEventBus, InMemoryProperties,
    InMemoryTransactionHistory, LeaseRetryPolicy, PropertiesManager, TransactionCoordinator,
    CREDIT_LIMIT_KEY,
};
use crate::storage::FileStore;
use crate::types::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `data_dir`
pub const ENV_DATA_DIR: &str = "CREDIT_LEDGER_DATA_DIR";

/// Environment variable overriding `credit_limit`
pub const ENV_CREDIT_LIMIT: &str = "CREDIT_LEDGER_CREDIT_LIMIT";

/// Environment variable overriding `lease.timeout_ms`
pub const ENV_LEASE_TIMEOUT_MS: &str = "CREDIT_LEDGER_LEASE_TIMEOUT_MS";

/// Errors raised while loading configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the ledger blocks
    pub data_dir: PathBuf,

    /// Credit limit in cents; unbounded when absent
    pub credit_limit: Option<i64>,

    /// Lease configuration
    pub lease: LeaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            credit_limit: None,
            lease: LeaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Lease configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Expire leases held longer than this (milliseconds); never when absent
    pub timeout_ms: Option<u64>,

    /// Lease requests per command before giving up; zero waits until granted
    pub max_attempts: u32,

    /// Pause between lease requests (milliseconds)
    pub retry_backoff_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_attempts: 0,
            retry_backoff_ms: 2,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LedgerConfig {
    /// Load from a TOML file
    ///
    /// Missing keys take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(data_dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Some(limit) = lookup(ENV_CREDIT_LIMIT) {
            self.credit_limit = Some(parse_env(ENV_CREDIT_LIMIT, &limit)?);
        }

        if let Some(timeout) = lookup(ENV_LEASE_TIMEOUT_MS) {
            self.lease.timeout_ms = Some(parse_env(ENV_LEASE_TIMEOUT_MS, &timeout)?);
        }

        Ok(self)
    }

    /// Build the transaction coordinator described by `lease`
    pub fn coordinator(&self) -> TransactionCoordinator {
        match self.lease.timeout_ms {
            Some(ms) => TransactionCoordinator::with_timeout(Duration::from_millis(ms)),
            None => TransactionCoordinator::new(),
        }
    }

    /// Caller-side lease retry policy described by `lease`
    pub fn retry_policy(&self) -> LeaseRetryPolicy {
        LeaseRetryPolicy {
            max_attempts: self.lease.max_attempts,
            backoff: Duration::from_millis(self.lease.retry_backoff_ms),
        }
    }

    /// Open the ledger in `data_dir` and wire up a credit engine over it
    ///
    /// The credit limit, when configured, is published as the `Bank.Limit`
    /// property before the bank opens.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Bank` if the data directory or the ledger block
    /// cannot be opened.
    pub fn open_engine(&self) -> Result<CreditEngine, EngineError> {
        let store = Arc::new(FileStore::open(&self.data_dir)?);
        let coordinator = Arc::new(self.coordinator());
        let properties = Arc::new(InMemoryProperties::new());
        if let Some(limit) = self.credit_limit {
            properties.set_property(CREDIT_LIMIT_KEY, limit.into());
        }

        let bank = Bank::open(BankContext {
            store,
            coordinator: coordinator.clone(),
            events: Arc::new(InMemoryEventBus::new()),
            properties,
        })?;

        tracing::info!(
            data_dir = %self.data_dir.display(),
            balance = bank.query_balance(),
            "ledger opened"
        );

        Ok(CreditEngine::new(
            Arc::new(bank),
            coordinator,
            Arc::new(InMemoryTransactionHistory::new()),
        )
        .with_retry(self.retry_policy()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionCoordination;
    use std::collections::HashMap;
    use crate::types::{Account, LedgerCommand, Operation, TransactionKind};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data/ledger"));
        assert_eq!(config.credit_limit, None);
        assert_eq!(config.lease.timeout_ms, None);
        assert_eq!(config.lease.max_attempts, 0);
        assert_eq!(config.lease.retry_backoff_ms, 2);
        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            credit_limit = 500000

            [lease]
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.credit_limit, Some(500_000));
        assert_eq!(config.lease.timeout_ms, Some(250));
        assert_eq!(config.lease.max_attempts, 0);
        assert_eq!(config.data_dir, PathBuf::from("./data/ledger"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "data_dir = \"/srv/ledger\"\n[logging]\njson = true").unwrap();

        let config = LedgerConfig::from_file(file.path()).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/ledger"));
        assert!(config.logging.json);
    }

    #[test]
    fn test_from_file_missing() {
        let result = LedgerConfig::from_file("/nonexistent/ledger.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let result = LedgerConfig::from_toml("credit_limit = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let config = LedgerConfig::default()
            .with_overrides(lookup(&[
                (ENV_DATA_DIR, "/tmp/ledger"),
                (ENV_CREDIT_LIMIT, "100000"),
                (ENV_LEASE_TIMEOUT_MS, " 1500 "),
            ]))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.credit_limit, Some(100_000));
        assert_eq!(config.lease.timeout_ms, Some(1500));
    }

    #[test]
    fn test_env_override_invalid_value() {
        let result = LedgerConfig::default().with_overrides(lookup(&[(ENV_CREDIT_LIMIT, "lots")]));

        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                key: ENV_CREDIT_LIMIT.to_string(),
                value: "lots".to_string()
            })
        );
    }

    #[test]
    fn test_coordinator_and_retry_policy() {
        let mut config = LedgerConfig::default();
        config.lease.timeout_ms = Some(0);
        config.lease.retry_backoff_ms = 7;

        let coordinator = config.coordinator();
        coordinator.request_lease().unwrap();
        // A zero timeout expires the lease immediately
        assert!(!coordinator.is_transaction_active());

        assert_eq!(config.retry_policy().backoff, Duration::from_millis(7));
        assert!(config.retry_policy().is_unbounded());
    }

    #[test]
    fn test_open_engine_persists_between_opens() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig {
            data_dir: dir.path().join("ledger"),
            credit_limit: Some(10_000),
            ..LedgerConfig::default()
        };

        let engine = config.open_engine().unwrap();
        assert_eq!(engine.bank().limit(), 10_000);
        engine
            .execute(&LedgerCommand {
                caller: "host".to_string(),
                operation: Operation::Deposit,
                account: Account::NonCash,
                amount: 700,
                kind: TransactionKind::VoucherIn,
            })
            .unwrap();
        drop(engine);

        let reopened = config.open_engine().unwrap();
        assert_eq!(reopened.bank().query_account_balance(Account::NonCash), 700);
    }
}
