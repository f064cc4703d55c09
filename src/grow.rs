use crate::{
  align::checked_align,
  arena::Arena,
  block::{Block, Header, MIN_BLOCK_SIZE, WSIZE},
  error::AllocError,
  heap::Heap,
};

impl<A: Arena> Heap<A> {
  /// Grows the arena by at least `bytes` and returns the free block covering
  /// the new region, merged with a free block that ended the heap before.
  ///
  /// ```text
  ///   before:  ... │ last block │ epilogue │
  ///   after:   ... │ last block │ new free block ........ │ epilogue │
  ///                               ^ old epilogue position
  /// ```
  ///
  /// On failure the heap is unchanged.
  pub(crate) fn extend(
    &mut self,
    bytes: usize,
  ) -> Result<Block, AllocError> {
    let size = checked_align(bytes.max(MIN_BLOCK_SIZE))
      .ok_or(AllocError::RequestTooLarge { requested: bytes })?;
    let base = self.arena.grow(size)?;

    let block = Block::at(base - self.arena.low_bound() - WSIZE);
    let epilogue = self.header(block);
    debug_assert!(epilogue.allocated() && epilogue.size() == 0);
    log::debug!("extending heap by {size} bytes at offset {:#x}", block.offset());

    self.write_block(
      block,
      Header::pack(size, false, epilogue.prev_allocated(), epilogue.prev_minimum()),
    );
    self.insert_free(block);

    let next = self.next_block(block);
    self.write_block(next, Header::epilogue(false, false));

    Ok(self.coalesce(block))
  }
}

#[cfg(test)]
mod tests {
  use crate::{AllocError, Allocator, ArenaError, Config, VecArena, arena::Arena, block::Block};

  #[test]
  fn test_extend_merges_with_trailing_free_block() {
    let mut allocator = Allocator::new(VecArena::with_capacity(1 << 16)).unwrap();
    let a = allocator.allocate(24).unwrap();
    let trailing = allocator.heap().next_block(Block::from_payload(a.offset()));

    let merged = allocator.heap_mut().extend(4096).unwrap();

    assert_eq!(merged, trailing);
    assert_eq!(allocator.heap().header(merged).size(), 4096 - 32 + 4096);
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_extend_after_allocated_block() {
    let mut allocator = Allocator::new(VecArena::with_capacity(1 << 16)).unwrap();
    let whole = allocator.allocate(4096 - 8).unwrap();
    let end = allocator.arena().size();

    let block = allocator.heap_mut().extend(100).unwrap();

    assert_eq!(block.offset(), end - 8);
    let header = allocator.heap().header(block);
    assert_eq!(header.size(), 112);
    assert!(header.prev_allocated());
    assert_eq!(allocator.payload_size(whole), Ok(4096 - 8));
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_extend_by_zero_still_adds_a_block() {
    let mut allocator = Allocator::new(VecArena::with_capacity(1 << 16)).unwrap();
    let _whole = allocator.allocate(4096 - 8).unwrap();
    let before = allocator.arena().size();

    let block = allocator.heap_mut().extend(0).unwrap();

    assert_eq!(allocator.heap().header(block).size(), 16);
    assert_eq!(allocator.arena().size(), before + 16);
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_failed_extend_leaves_heap_untouched() {
    let config = Config::default().with_chunk_size(1024);
    let mut allocator = Allocator::with_config(VecArena::with_capacity(2048), config).unwrap();
    let before = allocator.arena().size();

    let result = allocator.heap_mut().extend(4096);

    assert!(matches!(
      result,
      Err(AllocError::OutOfMemory(ArenaError::Exhausted { requested: 4096, .. }))
    ));
    assert_eq!(allocator.arena().size(), before);
    allocator.check_heap().unwrap();
  }
}
