//! Process-local persistent store
//!
//! Blocks live in memory for as long as the store does, so a ledger service
//! rebuilt against the same `InMemoryStore` sees the balances its predecessor
//! committed. That makes it the store of choice for restart simulations in
//! tests. Commits can be forced to fail to exercise abort paths.

use super::{apply_writes, validate_block_name};
use crate::core::traits::{Block, PersistenceLevel, PersistentStore};
use crate::types::StoreError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory block store
#[derive(Default)]
pub struct InMemoryStore {
    blocks: RwLock<HashMap<String, Arc<MemoryBlock>>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail (or succeed again)
    ///
    /// Failed commits leave the committed fields untouched.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Names of all blocks, sorted
    pub fn block_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blocks.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl PersistentStore for InMemoryStore {
    fn block_exists(&self, name: &str) -> bool {
        self.blocks.read().contains_key(name)
    }

    fn create_block(
        &self,
        level: PersistenceLevel,
        name: &str,
        capacity: usize,
    ) -> Result<Arc<dyn Block>, StoreError> {
        validate_block_name(name)?;

        let mut blocks = self.blocks.write();
        if blocks.contains_key(name) {
            return Err(StoreError::BlockExists {
                name: name.to_string(),
            });
        }

        let block = Arc::new(MemoryBlock {
            name: name.to_string(),
            level,
            capacity,
            fields: RwLock::new(BTreeMap::new()),
            fail_commits: Arc::clone(&self.fail_commits),
        });
        blocks.insert(name.to_string(), Arc::clone(&block));

        tracing::debug!(block = name, ?level, capacity, "created in-memory block");
        Ok(block)
    }

    fn get_block(&self, name: &str) -> Result<Arc<dyn Block>, StoreError> {
        self.blocks
            .read()
            .get(name)
            .map(|block| Arc::clone(block) as Arc<dyn Block>)
            .ok_or_else(|| StoreError::block_not_found(name))
    }
}

struct MemoryBlock {
    name: String,
    level: PersistenceLevel,
    capacity: usize,
    fields: RwLock<BTreeMap<String, i64>>,
    fail_commits: Arc<AtomicBool>,
}

impl Block for MemoryBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> PersistenceLevel {
        self.level
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self, key: &str) -> Option<i64> {
        self.fields.read().get(key).copied()
    }

    fn commit_writes(&self, writes: BTreeMap<String, i64>) -> Result<(), StoreError> {
        let mut fields = self.fields.write();
        let next = apply_writes(&self.name, self.capacity, &fields, writes)?;

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::commit_failed(&self.name, "injected commit failure"));
        }

        *fields = next;
        Ok(())
    }
}
