//! Heap-adjacent neighbor lookup from boundary tags.

use crate::{
  arena::Arena,
  block::{Block, Header, MIN_BLOCK_SIZE, WSIZE},
  heap::Heap,
};

impl<A: Arena> Heap<A> {
  /// The block physically following `block`.
  ///
  /// `block` must not be the epilogue.
  pub(crate) fn next_block(
    &self,
    block: Block,
  ) -> Block {
    let size = self.header(block).size();
    debug_assert_ne!(size, 0, "next_block called on the epilogue");
    Block::at(block.offset() + size)
  }

  /// The block physically preceding `block`, or `None` for the first block.
  ///
  /// A minimum predecessor is found at a fixed distance without reading
  /// anything. Otherwise the predecessor must be free (or be the prologue),
  /// and its footer (the word right before `block`) gives its size.
  pub(crate) fn prev_block(
    &self,
    block: Block,
  ) -> Option<Block> {
    let header = self.header(block);
    if header.prev_minimum() {
      return Some(Block::at(block.offset() - MIN_BLOCK_SIZE));
    }

    let footer = Header::from_bits(self.word(block.offset() - WSIZE));
    if footer.size() == 0 {
      return None;
    }

    block.offset().checked_sub(footer.size()).map(Block::at)
  }
}
