//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Trait abstractions for interchangeable implementations
//! - `coordinator` - The single global transaction lease
//! - `account_balances` - Checked balance arithmetic over the credit buckets
//! - `bank` - The persisted, lease-gated ledger service
//! - `events` - Balance-changed notification bus
//! - `properties` - Property store for the credit limit and cached balance
//! - `transaction_history` - Audit trail with host acknowledgement
//! - `engine` - Caller-side command execution

pub mod account_balances;
pub mod bank;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod properties;
pub mod traits;
pub mod transaction_history;

pub use account_balances::AccountBalances;
pub use bank::{Bank, BankContext, LEDGER_BLOCK_NAME};
pub use coordinator::TransactionCoordinator;
pub use engine::{CreditEngine, LeaseRetryPolicy};
pub use events::{InMemoryEventBus, Subscription};
pub use properties::{InMemoryProperties, PropertyValue, CREDIT_LIMIT_KEY, CURRENT_BALANCE_KEY};
pub use traits::{
    Block, BlockTransaction, EventPublisher, PersistenceLevel, PersistentStore,
    PropertiesManager, TransactionCoordination, TransactionHistory,
};
pub use transaction_history::{write_history_csv, InMemoryTransactionHistory};
