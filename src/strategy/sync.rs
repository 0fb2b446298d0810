//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. Commands run strictly in file order, so every
//! lease request succeeds on the first attempt.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command execution to `CreditEngine` (lease, ledger, audit trail)
//! - CSV output to `csv_format::write_balances_csv` (format handling)
//!
//! Script rows are streamed one at a time; memory does not grow with the file.

use crate::core::CreditEngine;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingReport, ProcessingStrategy};
use crate::types::EngineError;
use std::path::Path;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use credit_ledger::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// # fn run(engine: &credit_ledger::core::CreditEngine) {
/// let mut output = std::io::stdout();
///
/// SyncProcessingStrategy
///     .process(engine, std::path::Path::new("commands.csv"), &mut output)
///     .expect("Processing failed");
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Execute the script in file order
    ///
    /// Parse errors and rejected commands are logged and skipped. A fatal
    /// ledger error stops execution immediately.
    fn execute(
        &self,
        engine: &CreditEngine,
        input_path: &Path,
    ) -> Result<ProcessingReport, EngineError> {
        let reader = SyncReader::new(input_path)?;
        let mut report = ProcessingReport::default();

        for result in reader {
            let outcome = match result {
                Ok(command) => engine.execute(&command),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable command");
                    Err(error)
                }
            };

            report.record(&outcome);
            if let Err(error) = outcome {
                if error.is_fatal() {
                    return Err(error);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Bank, BankContext, InMemoryEventBus, InMemoryProperties, InMemoryTransactionHistory,
        TransactionCoordinator,
    };
    use crate::storage::InMemoryStore;
    use crate::types::Account;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary command script for testing
    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "caller,op,account,amount,kind\n{}", rows).expect("Failed to write");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn engine() -> CreditEngine {
        let coordinator = Arc::new(TransactionCoordinator::new());
        let bank = Bank::open(BankContext {
            store: Arc::new(InMemoryStore::new()),
            coordinator: coordinator.clone(),
            events: Arc::new(InMemoryEventBus::new()),
            properties: Arc::new(InMemoryProperties::new()),
        })
        .unwrap();
        CreditEngine::new(
            Arc::new(bank),
            coordinator,
            Arc::new(InMemoryTransactionHistory::new()),
        )
    }

    #[test]
    fn test_sync_strategy_writes_balances() {
        let file = create_temp_csv(
            "sas,deposit,cashable,1000,bill_in\n\
             game,deposit,promo,250,win\n\
             sas,withdraw,cashable,400,voucher_out\n",
        );
        let engine = engine();
        let mut output = Vec::new();

        let report = SyncProcessingStrategy
            .process(&engine, file.path(), &mut output)
            .unwrap();

        assert_eq!(report, ProcessingReport { committed: 3, rejected: 0 });
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,balance,credits\n\
             Cashable,600,6.00\n\
             NonCash,0,0.00\n\
             Promo,250,2.50\n\
             Total,850,8.50\n"
        );
        assert_eq!(engine.history().records().len(), 3);
    }

    #[test]
    fn test_sync_strategy_continues_after_rejections() {
        let file = create_temp_csv(
            "sas,deposit,cashable,100,coin_in\n\
             sas,deposit,cashable,abc,coin_in\n\
             sas,withdraw,cashable,500,voucher_out\n\
             sas,deposit,noncash,50,voucher_in\n",
        );
        let engine = engine();

        let report = SyncProcessingStrategy.execute(&engine, file.path()).unwrap();

        assert_eq!(report, ProcessingReport { committed: 2, rejected: 2 });
        assert_eq!(engine.bank().query_account_balance(Account::Cashable), 100);
        assert_eq!(engine.bank().query_account_balance(Account::NonCash), 50);
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let result = SyncProcessingStrategy.execute(&engine(), Path::new("nonexistent.csv"));
        assert!(matches!(result, Err(EngineError::Io { .. })));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
