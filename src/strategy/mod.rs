//! Processing strategy module for command scripts
//!
//! This module defines the Strategy pattern for complete script execution
//! pipelines, encompassing both CSV parsing and command execution through the
//! credit engine. Different execution models (single-threaded in file order,
//! concurrent per caller) can be selected at runtime.

use crate::cli::StrategyType;
use crate::core::CreditEngine;
use crate::io::write_balances_csv;
use crate::types::EngineError;
use std::io::Write;
use std::path::Path;

pub mod concurrent;
pub mod sync;

pub use concurrent::{ConcurrentProcessingStrategy, WorkerConfig};
pub use sync::SyncProcessingStrategy;

/// Outcome counters of one script run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    /// Commands that committed a movement (zero amounts excluded)
    pub committed: usize,

    /// Commands skipped: parse errors, declined withdrawals, contention
    pub rejected: usize,
}

impl ProcessingReport {
    fn record(&mut self, outcome: &Result<Option<u64>, EngineError>) {
        match outcome {
            Ok(Some(_)) => self.committed += 1,
            Ok(None) => {}
            Err(_) => self.rejected += 1,
        }
    }

    fn merge(&mut self, other: ProcessingReport) {
        self.committed += other.committed;
        self.rejected += other.rejected;
    }
}

/// Processing strategy trait for complete script execution pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Execute the commands in `input_path` against `engine`
    ///
    /// # Arguments
    ///
    /// * `engine` - The credit engine commands are executed through
    /// * `input_path` - Path to the command script
    ///
    /// # Returns
    ///
    /// * `Ok(ProcessingReport)` if the script ran to completion; individual
    ///   rejected commands are logged and counted, not returned
    /// * `Err(EngineError)` if the script could not be read or a fatal ledger
    ///   error stopped execution
    fn execute(&self, engine: &CreditEngine, input_path: &Path)
        -> Result<ProcessingReport, EngineError>;

    /// Execute the script, then write the final balances to `output`
    ///
    /// # Errors
    ///
    /// Anything [`execute`](Self::execute) returns, plus `EngineError::Io` if the
    /// balances cannot be written.
    fn process(
        &self,
        engine: &CreditEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingReport, EngineError> {
        let report = self.execute(engine, input_path)?;

        write_balances_csv(&engine.bank().snapshot(), output)
            .map_err(|message| EngineError::Io { message })?;

        tracing::info!(
            committed = report.committed,
            rejected = report.rejected,
            balance = engine.bank().query_balance(),
            "script finished"
        );
        Ok(report)
    }
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create
/// * `config` - Worker configuration for the concurrent strategy (ignored for sync)
///
/// # Returns
///
/// A boxed trait object implementing the ProcessingStrategy trait
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<WorkerConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Concurrent => {
            Box::new(ConcurrentProcessingStrategy::new(config.unwrap_or_default()))
        }
    }
}

