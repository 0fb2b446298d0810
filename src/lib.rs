//! Credit Ledger Library
//! # Overview
//!
//! This library provides the transactional credit ledger of a gaming machine:
//! a single global transaction lease, a persisted balance engine gated by that
//! lease, balance-changed notifications and an audit trail.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LeaseId, records, errors)
//! - [`core`] - Business logic components:
//!   - [`core::coordinator`] - The single global transaction lease
//!   - [`core::bank`] - The lease-gated, persisted ledger service
//!   - [`core::account_balances`] - Checked arithmetic over the credit buckets
//!   - [`core::events`] - Balance-changed notification bus
//!   - [`core::properties`] - Credit limit and cached balance properties
//!   - [`core::transaction_history`] - Audit trail with host acknowledgement
//!   - [`core::engine`] - Caller-side command execution
//! - [`storage`] - Persistent block stores (in-memory and file-backed)
//! - [`config`] - TOML and environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`io`] - Command script parsing and balance output
//! - [`strategy`] - Sync and concurrent script execution
//! - [`cli`] - CLI arguments parsing
//!
//! # Accounts
//!
//! Credits live in three fixed buckets:
//!
//! - **Cashable**: Credits the player can cash out
//! - **NonCash**: Restricted credits that can be wagered but not cashed out
//! - **Promo**: Promotional credits
//!
//! # Transaction Protocol
//!
//! 1. Request a lease from the coordinator (fails fast if one is outstanding)
//! 2. Deposit, or probe with `check_withdraw` and then withdraw, under the lease
//! 3. Record the movement in the audit trail
//! 4. Release the lease
//!
//! All amounts are integer cents.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod storage;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use config::LedgerConfig;
pub use core::{Bank, BankContext, CreditEngine, TransactionCoordinator};
pub use io::write_balances_csv;
pub use types::{
    Account, BalanceChangedEvent, BankError, CoordinationError, EngineError, LeaseId,
    LedgerCommand, TransactionKind, TransactionRecord,
};
