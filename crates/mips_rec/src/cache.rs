use crate::backend::CodeBackend;
use crate::block::Block;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq)]
pub enum CacheError {
  /// A block with this guest PC is already registered.
  Duplicate(u32),
}

/// Guest PC to compiled block, unique on PC.
///
/// The cache owns every registered block; dropping it frees them all,
/// code objects included. Staleness is the embedder's call: probe with
/// [`Block::is_outdated`], then unregister, drop and re-execute. The
/// cache never rescans on its own.
pub struct BlockCache<B: CodeBackend> {
  blocks: HashMap<u32, Block<B>>,
}

impl<B: CodeBackend> BlockCache<B> {
  pub fn new() -> BlockCache<B> {
    BlockCache {
      blocks: HashMap::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn find(&self, pc: u32) -> Option<&Block<B>> {
    self.blocks.get(&pc)
  }

  /// Insert a freshly compiled block, sealing its staleness hash in the
  /// process.
  pub fn register(&mut self, mut block: Block<B>) -> Result<(), CacheError> {
    match self.blocks.entry(block.pc()) {
      Entry::Occupied(_) => {
        log::warn!("block at {:#010x} is already registered", block.pc());
        Err(CacheError::Duplicate(block.pc()))
      }
      Entry::Vacant(entry) => {
        block.seal_hash();
        entry.insert(block);
        Ok(())
      }
    }
  }

  /// Remove a block without freeing it; the caller decides its fate.
  pub fn unregister(&mut self, pc: u32) -> Option<Block<B>> {
    self.blocks.remove(&pc)
  }

  /// Drop every block whose covered code intersects the unsegmented
  /// range `[kstart, kend)`. Returns how many went.
  pub(crate) fn drop_covering(&mut self, kstart: u64, kend: u64) -> usize {
    let before = self.blocks.len();
    self.blocks.retain(|_, block| !block.covers(kstart, kend));
    before - self.blocks.len()
  }
}

impl<B: CodeBackend> Default for BlockCache<B> {
  fn default() -> Self {
    BlockCache::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{block_from_words, TestBackend};

  fn sample_block() -> Block<TestBackend> {
    let (block, _ram) = block_from_words(&[0x2401_0005]);
    block
  }

  #[test]
  fn register_then_find() {
    let mut cache: BlockCache<TestBackend> = BlockCache::new();
    let block = sample_block();
    let pc = block.pc();

    cache.register(block).unwrap();
    assert!(cache.find(pc).is_some());
    assert!(cache.find(pc.wrapping_add(4)).is_none());
  }

  #[test]
  fn duplicate_registration_is_an_error() {
    let mut cache: BlockCache<TestBackend> = BlockCache::new();
    let block = sample_block();
    let pc = block.pc();
    cache.register(block).unwrap();

    let err = cache.register(sample_block()).unwrap_err();
    k9::assert_equal!(err, CacheError::Duplicate(pc));
  }

  #[test]
  fn unregister_removes_without_freeing() {
    let mut cache: BlockCache<TestBackend> = BlockCache::new();
    let block = sample_block();
    let pc = block.pc();
    cache.register(block).unwrap();

    let block = cache.unregister(pc).unwrap();
    assert!(cache.find(pc).is_none());

    // the block is intact and can go back in
    cache.register(block).unwrap();
    assert!(cache.find(pc).is_some());
  }
}
