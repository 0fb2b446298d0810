//! Persistent store implementations
//!
//! - `memory` - process-local store for tests and simulators, with commit
//!   failure injection
//! - `file` - one JSON file per block, replaced atomically on every commit
//!
//! Both enforce block capacity the same way, through [`apply_writes`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use crate::types::StoreError;
use std::collections::BTreeMap;

/// Merge staged writes into a copy of the committed fields
///
/// Fails with `CapacityExceeded` when the merged block would hold more distinct
/// fields than it was created for. The committed fields are never touched.
pub(crate) fn apply_writes(
    name: &str,
    capacity: usize,
    current: &BTreeMap<String, i64>,
    writes: BTreeMap<String, i64>,
) -> Result<BTreeMap<String, i64>, StoreError> {
    let mut next = current.clone();
    next.extend(writes);

    if next.len() > capacity {
        return Err(StoreError::CapacityExceeded {
            name: name.to_string(),
            capacity,
            requested: next.len(),
        });
    }

    Ok(next)
}

/// Reject names that cannot safely double as file names
pub(crate) fn validate_block_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control());

    if invalid {
        return Err(StoreError::InvalidBlockName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_apply_writes_overwrites_and_adds() {
        let current = BTreeMap::from([("a".to_string(), 1)]);
        let writes = BTreeMap::from([("a".to_string(), 5), ("b".to_string(), 2)]);

        let next = apply_writes("blk", 2, &current, writes).unwrap();

        assert_eq!(next.get("a"), Some(&5));
        assert_eq!(next.get("b"), Some(&2));
        assert_eq!(current.get("a"), Some(&1));
    }

    #[test]
    fn test_apply_writes_enforces_capacity() {
        let current = BTreeMap::from([("a".to_string(), 1)]);
        let writes = BTreeMap::from([("b".to_string(), 2)]);

        let result = apply_writes("blk", 1, &current, writes);

        assert_eq!(
            result,
            Err(StoreError::CapacityExceeded {
                name: "blk".to_string(),
                capacity: 1,
                requested: 2,
            })
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::hidden(".bank")]
    #[case::slash("bank/ledger")]
    #[case::backslash("bank\\ledger")]
    fn test_invalid_block_names(#[case] name: &str) {
        assert!(validate_block_name(name).is_err());
    }

    #[test]
    fn test_valid_block_name() {
        assert!(validate_block_name("Bank.Ledger").is_ok());
    }
}
