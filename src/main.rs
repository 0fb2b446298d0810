//! Credit Ledger CLI
//!
//! Command-line interface for executing credit ledger command scripts against
//! a persistent ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- --strategy concurrent --max-workers 4 commands.csv > balances.csv
//! cargo run -- --data-dir /var/lib/ledger --history audit.csv commands.csv
//! cargo run -- --config ledger.toml --credit-limit 100000 commands.csv
//! ```
//!
//! Balances from earlier runs against the same data directory are carried
//! forward; the final balances are written to stdout and logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, unreadable script, fatal ledger error, etc.)

use credit_ledger::cli::{self, CliArgs};
use credit_ledger::config::LedgerConfig;
use credit_ledger::core::write_history_csv;
use credit_ledger::strategy;
use credit_ledger::telemetry;
use std::fs::File;
use std::process;

fn main() {
    let args = cli::parse_args();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    telemetry::init(&config.logging);

    if let Err(e) = run(&args, &config) {
        tracing::error!(error = %e, "credit ledger run failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Configuration file (or defaults), then environment, then CLI flags
fn load_config(args: &CliArgs) -> Result<LedgerConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(limit) = args.credit_limit {
        config.credit_limit = Some(limit);
    }
    Ok(config)
}

fn run(args: &CliArgs, config: &LedgerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = config.open_engine()?;

    let strategy = {
        let workers = matches!(args.strategy, cli::StrategyType::Concurrent)
            .then(|| args.to_worker_config());
        strategy::create_strategy(args.strategy, workers)
    };

    let mut output = std::io::stdout();
    strategy.process(&engine, &args.input_file, &mut output)?;

    if let Some(path) = &args.history {
        let mut file = File::create(path)?;
        write_history_csv(&engine.history().records(), &mut file)?;
    }

    Ok(())
}
