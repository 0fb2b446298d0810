//! Ledger service
//!
//! `Bank` is the authoritative balance engine of the cabinet. Every credit that
//! enters or leaves goes through [`Bank::deposit`] or [`Bank::withdraw`] under the
//! currently active transaction lease.
//!
//! # Write path
//!
//! 1. Validate the lease against the coordinator
//! 2. Take the exclusive lock and compute the next balances
//! 3. Persist the complete balance set as one block transaction
//! 4. Only after the commit succeeds, make the next balances visible
//! 5. Release the lock, then publish the balance-changed notification
//!
//! A failed commit aborts the operation with the in-memory balances untouched,
//! so memory never runs ahead of the ledger block. Subscribers never observe a
//! balance that is not yet durable.
//!
//! # Credit limit
//!
//! [`Bank::limit`] exposes the configured credit limit, but the bank never
//! enforces it. Whether a credit source may push the meter past the limit is a
//! decision for the caller; wins must always be paid.

use crate::core::account_balances::AccountBalances;
use crate::core::properties::{PropertyValue, CREDIT_LIMIT_KEY, CURRENT_BALANCE_KEY};
use crate::core::traits::{
    Block, EventPublisher, PersistenceLevel, PersistentStore, PropertiesManager,
    TransactionCoordination,
};
use crate::types::{Account, BalanceChangedEvent, BankError, LeaseId, StoreError};
use parking_lot::RwLock;
use std::sync::Arc;

/// Name of the block holding the account balances
pub const LEDGER_BLOCK_NAME: &str = "Bank.Ledger";

/// Collaborators the ledger service is built from
///
/// Passed once at construction; the bank holds no other references to the
/// outside world.
#[derive(Clone)]
pub struct BankContext {
    pub store: Arc<dyn PersistentStore>,
    pub coordinator: Arc<dyn TransactionCoordination>,
    pub events: Arc<dyn EventPublisher>,
    pub properties: Arc<dyn PropertiesManager>,
}

/// Persisted, lease-gated balance engine
pub struct Bank {
    balances: RwLock<AccountBalances>,
    block: Arc<dyn Block>,
    coordinator: Arc<dyn TransactionCoordination>,
    events: Arc<dyn EventPublisher>,
    properties: Arc<dyn PropertiesManager>,
}

impl Bank {
    /// Load the ledger block, or create and persist a zeroed one
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the block cannot be read, created or
    /// initialized, or holds a negative balance.
    pub fn open(context: BankContext) -> Result<Self, BankError> {
        let BankContext {
            store,
            coordinator,
            events,
            properties,
        } = context;

        let (block, balances) = if store.block_exists(LEDGER_BLOCK_NAME) {
            let block = store.get_block(LEDGER_BLOCK_NAME)?;
            let balances = hydrate(block.as_ref())?;
            tracing::info!(
                cashable = balances.get(Account::Cashable),
                non_cash = balances.get(Account::NonCash),
                promo = balances.get(Account::Promo),
                "ledger hydrated"
            );
            (block, balances)
        } else {
            let block =
                store.create_block(PersistenceLevel::Critical, LEDGER_BLOCK_NAME, Account::COUNT)?;
            let balances = AccountBalances::new();
            persist(block.as_ref(), &balances)?;
            tracing::info!("ledger block created with zero balances");
            (block, balances)
        };

        properties.set_property(CURRENT_BALANCE_KEY, balances.total().into());

        Ok(Self {
            balances: RwLock::new(balances),
            block,
            coordinator,
            events,
            properties,
        })
    }

    /// Validate a deposit without performing it
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is negative
    /// - `InvalidTransaction` if `lease` is not the active transaction
    pub fn check_deposit(
        &self,
        account: Account,
        amount: i64,
        lease: LeaseId,
    ) -> Result<(), BankError> {
        if amount < 0 {
            return Err(BankError::InvalidAmount { amount });
        }

        if !self.coordinator.verify_current_transaction(lease) {
            tracing::warn!(%account, amount, %lease, "deposit rejected: transaction is not active");
            return Err(BankError::invalid_transaction(lease));
        }

        Ok(())
    }

    /// Credit `amount` cents to `account`
    ///
    /// A zero amount is a no-op regardless of the lease. The lease is checked
    /// again under the exclusive lock, so a lease released mid-call never
    /// commits.
    ///
    /// # Errors
    ///
    /// Anything [`check_deposit`](Self::check_deposit) returns, plus
    /// `ArithmeticOverflow` and `Storage`. On error nothing changed.
    pub fn deposit(&self, account: Account, amount: i64, lease: LeaseId) -> Result<(), BankError> {
        if amount == 0 {
            return Ok(());
        }
        self.check_deposit(account, amount, lease)?;

        let (old_balance, new_balance) = {
            let mut balances = self.balances.write();
            if !self.coordinator.verify_current_transaction(lease) {
                tracing::warn!(%account, amount, %lease, "deposit rejected: lease released before commit");
                return Err(BankError::invalid_transaction(lease));
            }
            let next = balances.with_deposit(account, amount)?;
            let old_balance = balances.total();
            self.commit(&mut balances, next)?;
            (old_balance, next.total())
        };

        tracing::info!(%account, amount, %lease, old_balance, new_balance, "deposit committed");
        self.events
            .publish(BalanceChangedEvent::new(old_balance, new_balance, lease));
        Ok(())
    }

    /// Probe whether a withdrawal would be accepted right now
    ///
    /// Returns false for the nil lease, when no transaction is active, when
    /// `lease` is not the active transaction, or when `account` holds less than
    /// `amount`. Callers poll this before committing to a withdrawal.
    pub fn check_withdraw(&self, account: Account, amount: i64, lease: LeaseId) -> bool {
        self.lease_permits_withdrawal(lease) && self.balances.read().can_withdraw(account, amount)
    }

    /// Debit `amount` cents from `account`
    ///
    /// A zero amount is a no-op regardless of the lease. The lease and balance
    /// are re-validated under the exclusive lock, so a check that raced with
    /// another writer cannot drive the balance negative.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is negative
    /// - `InsufficientFundsOrInvalidTransaction` (fatal) if the withdrawal would
    ///   not pass [`check_withdraw`](Self::check_withdraw)
    /// - `Storage` if the commit failed; nothing changed
    pub fn withdraw(&self, account: Account, amount: i64, lease: LeaseId) -> Result<(), BankError> {
        if amount == 0 {
            return Ok(());
        }
        if amount < 0 {
            return Err(BankError::InvalidAmount { amount });
        }

        let (old_balance, new_balance) = {
            let mut balances = self.balances.write();

            let next = if self.lease_permits_withdrawal(lease) {
                balances.with_withdrawal(account, amount)
            } else {
                None
            };
            let Some(next) = next else {
                tracing::error!(
                    fatal = true,
                    %account,
                    amount,
                    %lease,
                    balance = balances.get(account),
                    "withdrawal reached without a successful check"
                );
                return Err(BankError::unchecked_withdrawal(account, amount, lease));
            };

            let old_balance = balances.total();
            self.commit(&mut balances, next)?;
            (old_balance, next.total())
        };

        tracing::info!(%account, amount, %lease, old_balance, new_balance, "withdrawal committed");
        self.events
            .publish(BalanceChangedEvent::new(old_balance, new_balance, lease));
        Ok(())
    }

    /// Aggregate balance over all accounts
    pub fn query_balance(&self) -> i64 {
        self.balances.read().total()
    }

    /// Balance of one account
    pub fn query_account_balance(&self, account: Account) -> i64 {
        self.balances.read().get(account)
    }

    /// Point-in-time copy of every balance, taken under one read lock
    pub fn snapshot(&self) -> AccountBalances {
        *self.balances.read()
    }

    /// Configured credit limit in cents; `i64::MAX` when unset
    ///
    /// Advisory only; see the module documentation.
    pub fn limit(&self) -> i64 {
        self.properties
            .get_property(CREDIT_LIMIT_KEY, PropertyValue::Int(i64::MAX))
            .as_i64()
            .unwrap_or(i64::MAX)
    }

    fn lease_permits_withdrawal(&self, lease: LeaseId) -> bool {
        !lease.is_nil()
            && self.coordinator.is_transaction_active()
            && self.coordinator.verify_current_transaction(lease)
    }

    /// Persist `next`, then make it visible
    ///
    /// Must be called with the write lock held.
    fn commit(&self, balances: &mut AccountBalances, next: AccountBalances) -> Result<(), BankError> {
        if let Err(error) = persist(self.block.as_ref(), &next) {
            tracing::error!(%error, block = self.block.name(), "ledger commit failed; operation aborted");
            return Err(error.into());
        }

        *balances = next;
        self.properties
            .set_property(CURRENT_BALANCE_KEY, next.total().into());
        Ok(())
    }
}

/// Rebuild the balances from the ledger block
///
/// A block with no fields at all was created but never initialized and reads
/// as zero. A block holding some balances but not others is damaged.
fn hydrate(block: &dyn Block) -> Result<AccountBalances, StoreError> {
    let stored = Account::ALL.map(|account| block.read(account.key()));

    if stored.iter().any(Option::is_some) {
        if let Some(missing) = Account::ALL.iter().find(|a| stored[a.index()].is_none()) {
            tracing::error!(block = block.name(), account = %missing, "ledger block is missing a balance");
            return Err(StoreError::corrupt_block(
                block.name(),
                format!("no balance stored for {}", missing),
            ));
        }
    } else {
        tracing::warn!(block = block.name(), "ledger block holds no balances; starting from zero");
    }

    let raw = stored.map(|balance| balance.unwrap_or(0));

    AccountBalances::from_balances(raw)
        .map_err(|error| StoreError::corrupt_block(block.name(), error.to_string()))
}

fn persist(block: &dyn Block, balances: &AccountBalances) -> Result<(), StoreError> {
    let mut txn = block.start_transaction();
    for (account, balance) in balances.iter() {
        txn.write(account.key(), balance);
    }
    txn.commit()
}
