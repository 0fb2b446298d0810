//! Transaction-related types for the credit ledger
//!
//! This module defines the audit trail records written by caller layers after a
//! committed money movement, and the command records the credit engine executes.

use super::account::Account;
use super::lease::LeaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit trail sequence number
///
/// Assigned by the history on append, strictly increasing from 1.
pub type SequenceNumber = u64;

/// Kind of money movement recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Coins inserted through the coin acceptor
    CoinIn,

    /// Bills inserted through the note acceptor
    BillIn,

    /// Voucher redeemed into credits
    VoucherIn,

    /// Voucher printed at cashout
    VoucherOut,

    /// Attendant-paid cashout
    Handpay,

    /// Credits wagered on a game round
    Wager,

    /// Credits won on a game round
    Win,
}

impl TransactionKind {
    /// Whether this kind moves credits onto the cabinet
    pub const fn is_credit(self) -> bool {
        matches!(
            self,
            TransactionKind::CoinIn
                | TransactionKind::BillIn
                | TransactionKind::VoucherIn
                | TransactionKind::Win
        )
    }

    /// Stable lowercase name, as used in command scripts and audit exports
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionKind::CoinIn => "coin_in",
            TransactionKind::BillIn => "bill_in",
            TransactionKind::VoucherIn => "voucher_in",
            TransactionKind::VoucherOut => "voucher_out",
            TransactionKind::Handpay => "handpay",
            TransactionKind::Wager => "wager",
            TransactionKind::Win => "win",
        }
    }
}

/// Immutable record of one committed money movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// What kind of movement this was
    pub kind: TransactionKind,

    /// Bucket the movement applied to
    pub account: Account,

    /// Amount in cents (always positive)
    pub amount: i64,

    /// Lease the movement was committed under
    pub lease: LeaseId,

    /// When the caller recorded the movement
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(kind: TransactionKind, account: Account, amount: i64, lease: LeaseId) -> Self {
        Self {
            kind,
            account,
            amount,
            lease,
            timestamp: Utc::now(),
        }
    }
}

/// Audit trail entry
///
/// Wraps the immutable record with the host acknowledgement state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Position in the audit trail
    pub sequence: SequenceNumber,

    /// The recorded movement
    pub record: TransactionRecord,

    /// Whether the host has acknowledged this movement
    ///
    /// Set once and never cleared.
    pub acknowledged: bool,
}

/// Ledger operation requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Credit a bucket
    Deposit,

    /// Debit a bucket (checked first)
    Withdraw,
}

/// One money movement a caller wants performed
///
/// Commands from the same caller are executed in order; commands from
/// different callers may run concurrently and contend for the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCommand {
    /// Name of the caller (protocol layer, device, game)
    pub caller: String,

    /// Deposit or withdraw
    pub operation: Operation,

    /// Target bucket
    pub account: Account,

    /// Amount in cents
    pub amount: i64,

    /// Audit trail kind
    pub kind: TransactionKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::coin_in(TransactionKind::CoinIn, true)]
    #[case::bill_in(TransactionKind::BillIn, true)]
    #[case::voucher_in(TransactionKind::VoucherIn, true)]
    #[case::win(TransactionKind::Win, true)]
    #[case::voucher_out(TransactionKind::VoucherOut, false)]
    #[case::handpay(TransactionKind::Handpay, false)]
    #[case::wager(TransactionKind::Wager, false)]
    fn test_kind_direction(#[case] kind: TransactionKind, #[case] credit: bool) {
        assert_eq!(kind.is_credit(), credit);
    }
}
