//! Transaction lease identifiers and balance notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transaction lease identifier
///
/// An opaque 128-bit token granting exclusive permission to perform one logical
/// money movement. The nil value never identifies a live lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(Uuid);

impl LeaseId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        LeaseId(Uuid::new_v4())
    }

    /// The empty identifier
    pub const fn nil() -> Self {
        LeaseId(Uuid::nil())
    }

    /// Whether this is the empty identifier
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::nil()
    }
}

impl From<Uuid> for LeaseId {
    fn from(uuid: Uuid) -> Self {
        LeaseId(uuid)
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Notification emitted once per committed balance mutation
///
/// Balances are aggregate balances (sum over all buckets) before and after the
/// mutation. Published only after the new balances are durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    /// Aggregate balance before the mutation
    pub old_balance: i64,

    /// Aggregate balance after the mutation
    pub new_balance: i64,

    /// Lease the mutation was performed under
    pub transaction_id: LeaseId,

    /// Commit time
    pub timestamp: DateTime<Utc>,
}

impl BalanceChangedEvent {
    pub fn new(old_balance: i64, new_balance: i64, transaction_id: LeaseId) -> Self {
        Self {
            old_balance,
            new_balance,
            transaction_id,
            timestamp: Utc::now(),
        }
    }
}
