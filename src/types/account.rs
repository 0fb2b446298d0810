//! Account-related types for the credit ledger
//!
//! This module defines the fixed set of credit buckets a cabinet tracks and the
//! conversions from the raw identifiers that protocol layers and scripts use.

use super::error::BankError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Credit bucket
///
/// The set is closed: every bucket has a stable small-integer index that is used
/// to address the balance array, and a stable name that is used as the persisted
/// field key inside the ledger block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Account {
    /// Cashable credits, redeemable at cashout
    Cashable,

    /// Non-cashable (restricted promotional) credits
    ///
    /// Playable but never paid out as cash.
    NonCash,

    /// Cashable promotional credits
    Promo,
}

impl Account {
    /// Number of buckets in the fixed set
    pub const COUNT: usize = 3;

    /// All buckets in index order
    pub const ALL: [Account; Account::COUNT] = [Account::Cashable, Account::NonCash, Account::Promo];

    /// Index of this bucket in the balance array
    pub const fn index(self) -> usize {
        match self {
            Account::Cashable => 0,
            Account::NonCash => 1,
            Account::Promo => 2,
        }
    }

    /// Field key used for this bucket in the persisted ledger block
    pub const fn key(self) -> &'static str {
        match self {
            Account::Cashable => "Cashable",
            Account::NonCash => "NonCash",
            Account::Promo => "Promo",
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl TryFrom<u8> for Account {
    type Error = BankError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Account::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| BankError::unknown_account(value.to_string()))
    }
}

impl FromStr for Account {
    type Err = BankError;

    /// Parse a bucket name, case-insensitively
    ///
    /// Accepts the persisted key (`Cashable`, `NonCash`, `Promo`) as well as the
    /// `noncash` / `non_cash` spellings that protocol configuration files use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cashable" => Ok(Account::Cashable),
            "noncash" | "non_cash" | "non-cash" => Ok(Account::NonCash),
            "promo" => Ok(Account::Promo),
            _ => Err(BankError::unknown_account(s)),
        }
    }
}
