//! File-backed persistent store
//!
//! Each non-transient block is one JSON document, `<name>.block.json`, in the
//! store directory. A commit serializes the merged fields into a temporary file
//! in the same directory, syncs it, and renames it over the previous document,
//! so a crash leaves either the old or the new image on disk and never a torn
//! one. Transient blocks are kept in memory only.

use super::{apply_writes, validate_block_name};
use crate::core::traits::{Block, PersistenceLevel, PersistentStore};
use crate::types::StoreError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const BLOCK_SUFFIX: &str = ".block.json";

/// On-disk image of one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BlockImage {
    name: String,
    level: PersistenceLevel,
    capacity: usize,
    fields: BTreeMap<String, i64>,
}

/// Directory of block files
pub struct FileStore {
    dir: PathBuf,
    blocks: RwLock<HashMap<String, Arc<FileBlock>>>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`
    ///
    /// Every `*.block.json` file in the directory is loaded. A file that does not
    /// parse, or whose recorded name disagrees with its file name, fails the open
    /// with `CorruptBlock` rather than being silently skipped.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut blocks = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(BLOCK_SUFFIX) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            let image: BlockImage = serde_json::from_str(&content)
                .map_err(|e| StoreError::corrupt_block(name, e.to_string()))?;
            if image.name != name {
                return Err(StoreError::corrupt_block(
                    name,
                    format!("file records block name '{}'", image.name),
                ));
            }

            blocks.insert(
                name.to_string(),
                Arc::new(FileBlock {
                    name: image.name,
                    level: image.level,
                    capacity: image.capacity,
                    dir: dir.clone(),
                    fields: RwLock::new(image.fields),
                }),
            );
        }

        tracing::info!(dir = %dir.display(), blocks = blocks.len(), "opened file store");

        Ok(Self {
            dir,
            blocks: RwLock::new(blocks),
        })
    }

    /// Directory the store lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PersistentStore for FileStore {
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

        let block = Arc::new(FileBlock {
            name: name.to_string(),
            level,
            capacity,
            dir: self.dir.clone(),
            fields: RwLock::new(BTreeMap::new()),
        });
        // The empty image goes to disk straight away so the block survives a
        // restart even if nothing is ever committed to it.
        block.write_image(&BTreeMap::new())?;
        blocks.insert(name.to_string(), Arc::clone(&block));

        tracing::debug!(block = name, ?level, capacity, "created file block");
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

struct FileBlock {
    name: String,
    level: PersistenceLevel,
    capacity: usize,
    dir: PathBuf,
    fields: RwLock<BTreeMap<String, i64>>,
}

impl FileBlock {
    fn path(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.name, BLOCK_SUFFIX))
    }

    /// Atomically replace the on-disk image
    fn write_image(&self, fields: &BTreeMap<String, i64>) -> Result<(), StoreError> {
        if self.level == PersistenceLevel::Transient {
            return Ok(());
        }

        let image = BlockImage {
            name: self.name.clone(),
            level: self.level,
            capacity: self.capacity,
            fields: fields.clone(),
        };

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut temp, &image)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(self.path())
            .map_err(|e| StoreError::commit_failed(&self.name, e.error.to_string()))?;
        Ok(())
    }
}

impl Block for FileBlock {
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
        self.write_image(&next)?;
        *fields = next;
        Ok(())
    }
}
