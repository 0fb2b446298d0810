use crate::strategy::WorkerConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execute credit ledger command scripts against a persistent ledger
#[derive(Parser, Debug)]
#[command(name = "credit-ledger")]
#[command(about = "Execute credit ledger command scripts against a persistent ledger", long_about = None)]
pub struct CliArgs {
    /// Command script path
    #[arg(value_name = "INPUT", help = "Path to the command script CSV file")]
    pub input_file: PathBuf,

    /// Execution strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Execution strategy: 'sync' for file order or 'concurrent' for one task per caller"
    )]
    pub strategy: StrategyType,

    /// Ledger data directory (overrides the configuration)
    #[arg(long = "data-dir", value_name = "DIR", help = "Directory holding the ledger blocks")]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE", help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrent callers (concurrent mode only)
    #[arg(
        long = "max-workers",
        value_name = "COUNT",
        help = "Maximum number of callers executing at once (default: CPU cores)"
    )]
    pub max_workers: Option<usize>,

    /// Where to write the audit trail
    #[arg(long = "history", value_name = "FILE", help = "Write the audit trail CSV to this file")]
    pub history: Option<PathBuf>,

    /// Credit limit in cents (overrides the configuration)
    #[arg(long = "credit-limit", value_name = "CENTS", help = "Credit limit in cents")]
    pub credit_limit: Option<i64>,
}

/// Available execution strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Concurrent,
}

impl CliArgs {
    /// Create a WorkerConfig from CLI arguments
    ///
    /// # Returns
    ///
    /// A `WorkerConfig` with the requested worker count, or the default.
    pub fn to_worker_config(&self) -> WorkerConfig {
        match self.max_workers {
            Some(max_workers) => WorkerConfig::new(max_workers),
            None => WorkerConfig::default(),
        }
    }
}
