//! Credit engine
//!
//! This module provides the `CreditEngine`, the caller side of the ledger. It
//! plays the part of a protocol layer or device driver: for every command it
//! acquires the transaction lease, moves the credits, writes the audit record
//! and releases the lease.
//!
//! The engine enforces the caller-side business rules:
//! - The audit kind must match the direction of the operation
//! - Withdrawals are probed with `check_withdraw` before they are attempted
//! - Credit-in sources respect the configured credit limit; wins never do
//! - The lease is released on every path, success or failure

use crate::core::bank::Bank;
use crate::core::traits::{TransactionCoordination, TransactionHistory};
use crate::types::{
    EngineError, LeaseId, LedgerCommand, Operation, SequenceNumber, TransactionKind,
    TransactionRecord,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How hard a caller tries to obtain the lease before giving up
///
/// Leases held by the engine are always released, so by default a caller
/// keeps asking until it gets one. A bounded budget that runs out aborts the
/// run with `LeaseUnavailable` rather than dropping the movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseRetryPolicy {
    /// Total number of `request_lease` calls; zero retries until granted
    pub max_attempts: u32,

    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for LeaseRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff: Duration::from_millis(2),
        }
    }
}

impl LeaseRetryPolicy {
    /// Whether the caller waits for the lease without an attempt budget
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }
}

/// Caller-side command executor
///
/// Cheap to share: every field is reference counted, so one engine can be
/// cloned into each worker.
#[derive(Clone)]
pub struct CreditEngine {
    bank: Arc<Bank>,
    coordinator: Arc<dyn TransactionCoordination>,
    history: Arc<dyn TransactionHistory>,
    retry: LeaseRetryPolicy,
}

impl CreditEngine {
    /// Create a new CreditEngine
    ///
    /// # Arguments
    ///
    /// * `bank` - The ledger service commands are executed against
    /// * `coordinator` - The coordinator the bank validates leases with
    /// * `history` - The audit trail committed movements are recorded in
    pub fn new(
        bank: Arc<Bank>,
        coordinator: Arc<dyn TransactionCoordination>,
        history: Arc<dyn TransactionHistory>,
    ) -> Self {
        Self {
            bank,
            coordinator,
            history,
            retry: LeaseRetryPolicy::default(),
        }
    }

    /// Replace the lease retry policy
    pub fn with_retry(mut self, retry: LeaseRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn bank(&self) -> &Arc<Bank> {
        &self.bank
    }

    pub fn history(&self) -> &Arc<dyn TransactionHistory> {
        &self.history
    }

    /// Execute a single ledger command
    ///
    /// Acquires the lease, performs the movement, records it and releases the
    /// lease again.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to execute
    ///
    /// # Returns
    ///
    /// * `Ok(Some(sequence))` - the movement was committed and recorded
    /// * `Ok(None)` - the amount was zero; nothing happened
    /// * `Err(EngineError)` - the command was rejected or failed
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The kind does not match the operation
    /// - The lease could not be acquired within the retry policy
    /// - A credit-in would exceed the credit limit
    /// - The withdrawal probe declined
    /// - The ledger rejected the movement or failed to persist it
    pub fn execute(&self, command: &LedgerCommand) -> Result<Option<SequenceNumber>, EngineError> {
        check_kind(command.kind, command.operation)?;

        let lease = self.acquire_lease(&command.caller)?;
        let result = self.execute_under_lease(command, lease);
        self.coordinator.release_lease(lease);

        match &result {
            Ok(Some(sequence)) => tracing::debug!(
                caller = %command.caller,
                kind = command.kind.as_str(),
                sequence,
                "command committed"
            ),
            Ok(None) => {}
            Err(error) if error.is_fatal() => tracing::error!(
                caller = %command.caller,
                %error,
                "command failed fatally"
            ),
            Err(error) => tracing::warn!(caller = %command.caller, %error, "command rejected"),
        }
        result
    }

    fn execute_under_lease(
        &self,
        command: &LedgerCommand,
        lease: LeaseId,
    ) -> Result<Option<SequenceNumber>, EngineError> {
        if command.amount == 0 {
            return Ok(None);
        }

        match command.operation {
            Operation::Deposit => {
                self.check_credit_limit(command)?;
                self.bank.deposit(command.account, command.amount, lease)?;
            }
            Operation::Withdraw => {
                if !self
                    .bank
                    .check_withdraw(command.account, command.amount, lease)
                {
                    return Err(EngineError::WithdrawalDeclined {
                        caller: command.caller.clone(),
                        account: command.account,
                        amount: command.amount,
                    });
                }
                self.bank.withdraw(command.account, command.amount, lease)?;
            }
        }

        let record = TransactionRecord::new(command.kind, command.account, command.amount, lease);
        Ok(Some(self.history.append(record)))
    }

    /// Refuse credit-in that would push the meter past the limit
    ///
    /// Wins are owed to the player and always accepted.
    fn check_credit_limit(&self, command: &LedgerCommand) -> Result<(), EngineError> {
        if command.kind == TransactionKind::Win {
            return Ok(());
        }

        let limit = self.bank.limit();
        let within_limit = self
            .bank
            .query_balance()
            .checked_add(command.amount)
            .is_some_and(|total| total <= limit);

        if within_limit {
            Ok(())
        } else {
            Err(EngineError::CreditLimitExceeded {
                caller: command.caller.clone(),
                amount: command.amount,
                limit,
            })
        }
    }

    /// Request the lease, backing off between attempts
    fn acquire_lease(&self, caller: &str) -> Result<LeaseId, EngineError> {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            match self.coordinator.request_lease() {
                Ok(lease) => {
                    if attempt > 1 {
                        tracing::debug!(caller, attempt, "lease acquired after contention");
                    }
                    return Ok(lease);
                }
                Err(_) if self.retry.is_unbounded() || attempt < self.retry.max_attempts => {
                    thread::sleep(self.retry.backoff)
                }
                Err(_) => {
                    return Err(EngineError::LeaseUnavailable {
                        caller: caller.to_string(),
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

fn check_kind(kind: TransactionKind, operation: Operation) -> Result<(), EngineError> {
    let expected = match operation {
        Operation::Deposit => true,
        Operation::Withdraw => false,
    };

    if kind.is_credit() == expected {
        Ok(())
    } else {
        Err(EngineError::KindMismatch { kind, operation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bank::BankContext;
    use crate::core::coordinator::TransactionCoordinator;
    use crate::core::events::InMemoryEventBus;
    use crate::core::properties::{InMemoryProperties, CREDIT_LIMIT_KEY};
    use crate::core::traits::PropertiesManager;
    use crate::core::transaction_history::InMemoryTransactionHistory;
    use crate::storage::InMemoryStore;
    use crate::types::{Account, BankError};
    use rstest::rstest;

    struct Harness {
        engine: CreditEngine,
        coordinator: Arc<TransactionCoordinator>,
        history: Arc<InMemoryTransactionHistory>,
        properties: Arc<InMemoryProperties>,
    }

    fn harness() -> Harness {
        let coordinator = Arc::new(TransactionCoordinator::new());
        let properties = Arc::new(InMemoryProperties::new());
        let history = Arc::new(InMemoryTransactionHistory::new());
        let bank = Bank::open(BankContext {
            store: Arc::new(InMemoryStore::new()),
            coordinator: coordinator.clone(),
            events: Arc::new(InMemoryEventBus::new()),
            properties: properties.clone(),
        })
        .unwrap();

        let engine = CreditEngine::new(Arc::new(bank), coordinator.clone(), history.clone())
            .with_retry(LeaseRetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            });

        Harness {
            engine,
            coordinator,
            history,
            properties,
        }
    }

    fn command(operation: Operation, kind: TransactionKind, amount: i64) -> LedgerCommand {
        LedgerCommand {
            caller: "test".to_string(),
            operation,
            account: Account::Cashable,
            amount,
            kind,
        }
    }

    #[test]
    fn test_deposit_commits_records_and_releases() {
        let h = harness();

        let sequence = h
            .engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 100))
            .unwrap();

        assert_eq!(sequence, Some(1));
        assert_eq!(h.engine.bank().query_balance(), 100);
        assert!(!h.coordinator.is_transaction_active());

        let entry = h.history.get(1).unwrap();
        assert_eq!(entry.record.kind, TransactionKind::CoinIn);
        assert_eq!(entry.record.amount, 100);
        assert!(!entry.record.lease.is_nil());
    }

    #[test]
    fn test_withdraw_after_deposit() {
        let h = harness();
        h.engine
            .execute(&command(Operation::Deposit, TransactionKind::BillIn, 2000))
            .unwrap();

        h.engine
            .execute(&command(Operation::Withdraw, TransactionKind::VoucherOut, 1500))
            .unwrap();

        assert_eq!(h.engine.bank().query_balance(), 500);
        assert_eq!(h.history.len(), 2);
    }

    #[test]
    fn test_declined_withdrawal_changes_nothing() {
        let h = harness();
        h.engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 1000))
            .unwrap();

        let result = h
            .engine
            .execute(&command(Operation::Withdraw, TransactionKind::VoucherOut, 1500));

        assert!(matches!(result, Err(EngineError::WithdrawalDeclined { amount: 1500, .. })));
        assert_eq!(h.engine.bank().query_balance(), 1000);
        assert_eq!(h.history.len(), 1);
        assert!(!h.coordinator.is_transaction_active());
    }

    #[rstest]
    #[case::voucher_out_deposit(Operation::Deposit, TransactionKind::VoucherOut)]
    #[case::wager_deposit(Operation::Deposit, TransactionKind::Wager)]
    #[case::coin_in_withdraw(Operation::Withdraw, TransactionKind::CoinIn)]
    #[case::win_withdraw(Operation::Withdraw, TransactionKind::Win)]
    fn test_kind_mismatch_rejected(#[case] operation: Operation, #[case] kind: TransactionKind) {
        let h = harness();

        let result = h.engine.execute(&command(operation, kind, 10));

        assert_eq!(result, Err(EngineError::KindMismatch { kind, operation }));
        assert!(!h.coordinator.is_transaction_active());
    }

    #[test]
    fn test_zero_amount_is_not_recorded() {
        let h = harness();

        let result = h
            .engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 0));

        assert_eq!(result, Ok(None));
        assert!(h.history.is_empty());
    }

    #[test]
    fn test_negative_amount_rejected_by_ledger() {
        let h = harness();

        let result = h
            .engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, -5));

        assert_eq!(
            result,
            Err(EngineError::Bank(BankError::InvalidAmount { amount: -5 }))
        );
        assert!(!h.coordinator.is_transaction_active());
    }

    #[test]
    fn test_credit_limit_blocks_credit_in_but_not_wins() {
        let h = harness();
        h.properties.set_property(CREDIT_LIMIT_KEY, 1000.into());
        h.engine
            .execute(&command(Operation::Deposit, TransactionKind::BillIn, 800))
            .unwrap();

        let over = h
            .engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 300));
        assert!(matches!(
            over,
            Err(EngineError::CreditLimitExceeded { limit: 1000, amount: 300, .. })
        ));

        h.engine
            .execute(&command(Operation::Deposit, TransactionKind::Win, 5000))
            .unwrap();
        assert_eq!(h.engine.bank().query_balance(), 5800);
    }

    #[test]
    fn test_lease_unavailable_after_retries() {
        let h = harness();
        let held = h.coordinator.request_lease().unwrap();

        let result = h
            .engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 10));

        assert_eq!(
            result,
            Err(EngineError::LeaseUnavailable {
                caller: "test".to_string(),
                attempts: 3
            })
        );
        assert!(result.unwrap_err().is_fatal());
        // Someone else's lease is left alone
        assert!(h.coordinator.verify_current_transaction(held));
    }

    #[test]
    fn test_default_policy_waits_for_the_lease() {
        assert!(LeaseRetryPolicy::default().is_unbounded());

        let h = harness();
        let engine = h.engine.clone().with_retry(LeaseRetryPolicy {
            max_attempts: 0,
            backoff: Duration::from_millis(1),
        });
        let held = h.coordinator.request_lease().unwrap();

        let coordinator = h.coordinator.clone();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            coordinator.release_lease(held);
        });

        let sequence = engine
            .execute(&command(Operation::Deposit, TransactionKind::CoinIn, 10))
            .unwrap();
        releaser.join().unwrap();

        assert_eq!(sequence, Some(1));
        assert_eq!(engine.bank().query_balance(), 10);
        assert!(!h.coordinator.is_transaction_active());
    }

    #[test]
    fn test_concurrent_callers_serialize_through_lease() {
        let h = harness();
        let engine = h.engine.clone().with_retry(LeaseRetryPolicy {
            max_attempts: 10_000,
            backoff: Duration::from_micros(50),
        });

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let mut cmd = command(Operation::Deposit, TransactionKind::CoinIn, 5);
                        cmd.caller = format!("caller-{}", i);
                        engine.execute(&cmd).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.bank().query_balance(), 4 * 25 * 5);
        assert_eq!(h.history.len(), 100);
        assert!(!h.coordinator.is_transaction_active());
    }
}
