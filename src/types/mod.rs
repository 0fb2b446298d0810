//! Types module
//!
//! Contains core data structures used throughout the crate:
//! - `account`: the fixed credit buckets
//! - `lease`: transaction lease identifiers and balance notifications
//! - `transaction`: audit trail records and ledger commands
//! - `error`: error types

pub mod account;
pub mod error;
pub mod lease;
pub mod transaction;

pub use account::Account;
pub use error::{BankError, CoordinationError, EngineError, HistoryError, StoreError};
pub use lease::{BalanceChangedEvent, LeaseId};
pub use transaction::{
    HistoryEntry, LedgerCommand, Operation, SequenceNumber, TransactionKind, TransactionRecord,
};
