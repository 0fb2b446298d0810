//! Collaborator traits for the ledger service
//!
//! The bank never reaches for a global service locator. Everything it talks to
//! is one of the traits below, injected at construction, so tests and hosts can
//! swap implementations freely.

use crate::core::properties::PropertyValue;
use crate::types::{
    BalanceChangedEvent, CoordinationError, HistoryEntry, HistoryError, LeaseId, SequenceNumber,
    StoreError, TransactionRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Durability class of a storage block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceLevel {
    /// Written once at provisioning, rarely changed
    Static,

    /// Money-bearing data; every commit must reach disk
    Critical,

    /// Survives only for the process lifetime
    Transient,
}

/// Named storage unit holding integer fields
pub trait Block: Send + Sync {
    /// Block name, unique within its store
    fn name(&self) -> &str;

    /// Durability class the block was created with
    fn level(&self) -> PersistenceLevel;

    /// Maximum number of distinct fields the block may hold
    fn capacity(&self) -> usize;

    /// Read the last committed value of a field
    fn read(&self, key: &str) -> Option<i64>;

    /// Apply a set of writes as one atomic, durable step
    ///
    /// Either every write becomes visible or none does. Callers go through
    /// [`BlockTransaction::commit`].
    fn commit_writes(&self, writes: BTreeMap<String, i64>) -> Result<(), StoreError>;
}

impl<'a> dyn Block + 'a {
    /// Begin a multi-field write against this block
    pub fn start_transaction(&self) -> BlockTransaction<'_> {
        BlockTransaction {
            block: self,
            writes: BTreeMap::new(),
        }
    }
}

/// Pending writes against one block
///
/// Nothing is visible until [`commit`](BlockTransaction::commit) succeeds;
/// dropping the transaction discards the writes.
pub struct BlockTransaction<'a> {
    block: &'a dyn Block,
    writes: BTreeMap<String, i64>,
}

impl BlockTransaction<'_> {
    /// Stage a field write; a later write to the same key wins
    pub fn write(&mut self, key: &str, value: i64) {
        self.writes.insert(key.to_string(), value);
    }

    /// Number of staged fields
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Atomically apply all staged writes
    pub fn commit(self) -> Result<(), StoreError> {
        self.block.commit_writes(self.writes)
    }
}

/// Store of named blocks
pub trait PersistentStore: Send + Sync {
    /// Whether a block with this name exists
    fn block_exists(&self, name: &str) -> bool;

    /// Create an empty block
    ///
    /// Fails with `BlockExists` if the name is taken.
    fn create_block(
        &self,
        level: PersistenceLevel,
        name: &str,
        capacity: usize,
    ) -> Result<Arc<dyn Block>, StoreError>;

    /// Look up an existing block
    fn get_block(&self, name: &str) -> Result<Arc<dyn Block>, StoreError>;
}

/// Fire-and-forget sink for balance notifications
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: BalanceChangedEvent);
}

/// Key/value configuration and cached-state properties
pub trait PropertiesManager: Send + Sync {
    /// Read a property, falling back to `default` when unset
    fn get_property(&self, key: &str, default: PropertyValue) -> PropertyValue;

    /// Set a property, replacing any previous value
    fn set_property(&self, key: &str, value: PropertyValue);
}

/// Append-only audit trail of committed money movements
pub trait TransactionHistory: Send + Sync {
    /// Append a record and return its sequence number
    fn append(&self, record: TransactionRecord) -> SequenceNumber;

    /// Get an entry by sequence number
    fn get(&self, sequence: SequenceNumber) -> Option<HistoryEntry>;

    /// Mark an entry as acknowledged by the host
    fn acknowledge(&self, sequence: SequenceNumber) -> Result<(), HistoryError>;

    /// Entries the host has not acknowledged yet, oldest first
    fn unacknowledged(&self) -> Vec<HistoryEntry>;

    /// All entries, oldest first
    fn records(&self) -> Vec<HistoryEntry>;
}

/// System-wide single-lease transaction coordination
pub trait TransactionCoordination: Send + Sync {
    /// Whether a lease is outstanding
    fn is_transaction_active(&self) -> bool;

    /// Install and return a new lease, unless one is outstanding
    fn request_lease(&self) -> Result<LeaseId, CoordinationError>;

    /// Whether `lease` is the outstanding lease
    fn verify_current_transaction(&self, lease: LeaseId) -> bool;

    /// Clear the outstanding lease if it is `lease`; otherwise do nothing
    fn release_lease(&self, lease: LeaseId);
}
