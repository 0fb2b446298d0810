//! Error types for the credit ledger
//!
//! # Error Categories
//!
//! - **Bank errors**: unknown accounts, lease mismatches, bad amounts, and the
//!   fatal unchecked-withdrawal path
//! - **Coordination errors**: lease requested while another is outstanding
//! - **Store errors**: block lookup, capacity, corruption and commit failures
//! - **History errors**: audit trail lookups and acknowledgement state
//! - **Engine errors**: everything the caller layer can hit while executing a
//!   command script, wrapping the categories above

use super::account::Account;
use super::lease::LeaseId;
use super::transaction::{Operation, SequenceNumber, TransactionKind};
use thiserror::Error;

/// Errors raised by the ledger service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankError {
    /// Account identifier outside the fixed bucket set
    ///
    /// Always an integration error; never retried.
    #[error("Unknown account '{account}'")]
    UnknownAccount {
        /// The identifier the caller supplied
        account: String,
    },

    /// Lease is not the currently active transaction
    ///
    /// Recoverable: the caller re-acquires a lease and retries.
    #[error("Transaction {lease} is not the active transaction")]
    InvalidTransaction {
        /// The lease the caller presented
        lease: LeaseId,
    },

    /// Negative amount
    #[error("Invalid amount {amount}: amounts must not be negative")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} on {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Bucket being updated
        account: Account,
    },

    /// Withdrawal reached without a successful check
    ///
    /// Unrecoverable: indicates a caller bug or a balance race.
    #[error("Unchecked withdrawal of {amount} from {account} under transaction {lease}: insufficient funds or invalid transaction")]
    InsufficientFundsOrInvalidTransaction {
        /// Bucket the withdrawal targeted
        account: Account,
        /// Requested amount
        amount: i64,
        /// Lease presented
        lease: LeaseId,
    },

    /// Persisting the balances failed; nothing was applied
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl BankError {
    /// Create an UnknownAccount error
    pub fn unknown_account(account: impl Into<String>) -> Self {
        BankError::UnknownAccount {
            account: account.into(),
        }
    }

    /// Create an InvalidTransaction error
    pub fn invalid_transaction(lease: LeaseId) -> Self {
        BankError::InvalidTransaction { lease }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: Account) -> Self {
        BankError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create an InsufficientFundsOrInvalidTransaction error
    pub fn unchecked_withdrawal(account: Account, amount: i64, lease: LeaseId) -> Self {
        BankError::InsufficientFundsOrInvalidTransaction {
            account,
            amount,
            lease,
        }
    }

    /// Whether this error must be escalated rather than retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, BankError::InsufficientFundsOrInvalidTransaction { .. })
    }
}

/// Errors raised by the transaction coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinationError {
    /// A lease is already outstanding; back off and retry
    #[error("A transaction is already active")]
    AlreadyActive,
}

/// Errors raised by persistent stores
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Block '{name}' not found")]
    BlockNotFound { name: String },

    #[error("Block '{name}' already exists")]
    BlockExists { name: String },

    /// Name cannot be used as a block identifier (empty or path-like)
    #[error("Invalid block name '{name}'")]
    InvalidBlockName { name: String },

    /// Commit would store more distinct fields than the block was created for
    #[error("Block '{name}' holds at most {capacity} fields, commit needs {requested}")]
    CapacityExceeded {
        name: String,
        capacity: usize,
        requested: usize,
    },

    #[error("Block '{name}' is corrupt: {message}")]
    CorruptBlock { name: String, message: String },

    #[error("Commit to block '{name}' failed: {message}")]
    CommitFailed { name: String, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn block_not_found(name: &str) -> Self {
        StoreError::BlockNotFound {
            name: name.to_string(),
        }
    }

    pub fn corrupt_block(name: &str, message: impl Into<String>) -> Self {
        StoreError::CorruptBlock {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn commit_failed(name: &str, message: impl Into<String>) -> Self {
        StoreError::CommitFailed {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Io {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: error.to_string(),
        }
    }
}

/// Errors raised by the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Transaction record {sequence} not found")]
    RecordNotFound { sequence: SequenceNumber },

    #[error("Transaction record {sequence} is already acknowledged")]
    AlreadyAcknowledged { sequence: SequenceNumber },
}

/// Errors raised while executing ledger commands
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    History(#[from] HistoryError),

    /// The caller gave up waiting for the lease
    ///
    /// Fatal: the movement was not performed and must not be silently dropped.
    #[error("Caller '{caller}' could not acquire a transaction after {attempts} attempts")]
    LeaseUnavailable { caller: String, attempts: u32 },

    /// Withdrawal declined by the balance probe
    ///
    /// Recoverable: nothing was changed.
    #[error("Withdrawal of {amount} from {account} declined for caller '{caller}'")]
    WithdrawalDeclined {
        caller: String,
        account: Account,
        amount: i64,
    },

    /// Credit-in would push the meter past the configured credit limit
    ///
    /// Caller policy; the ledger itself never enforces the limit.
    #[error("Caller '{caller}' deposit of {amount} would exceed the credit limit of {limit}")]
    CreditLimitExceeded {
        caller: String,
        amount: i64,
        limit: i64,
    },

    /// Audit kind contradicts the operation (e.g. a voucher out on a deposit)
    #[error("Transaction kind '{}' cannot be recorded for a {operation:?}", kind.as_str())]
    KindMismatch {
        kind: TransactionKind,
        operation: Operation,
    },

    #[error("Command parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl EngineError {
    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        EngineError::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Whether execution must stop rather than move on to the next command
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Bank(error) => error.is_fatal(),
            EngineError::Io { .. } => true,
            EngineError::LeaseUnavailable { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        EngineError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        EngineError::Bank(BankError::Storage(error))
    }
}
