//! Merging and dividing blocks.
//!
//! Any structural change to a block is followed by [`Heap::patch_successor`],
//! which is the only place the "predecessor" bits of a header get rewritten.

use crate::{
  arena::Arena,
  block::{Block, Header, MIN_BLOCK_SIZE, is_minimum},
  heap::Heap,
};

impl<A: Arena> Heap<A> {
  /// Rewrites the predecessor bits of the block following `block` (possibly
  /// the epilogue) so they describe `block` as it is now.
  pub(crate) fn patch_successor(
    &mut self,
    block: Block,
  ) {
    let header = self.header(block);
    let next = self.next_block(block);
    let patched = self
      .header(next)
      .with_prev_allocated(header.allocated())
      .with_prev_minimum(is_minimum(header.size()));
    self.write_block(next, patched);
  }

  /// Merges the free block `block` with any free neighbors and returns the
  /// block that now covers it. `block` must already be on its free list.
  ///
  /// ```text
  ///   prev    block   next          result
  ///   used  │ free  │ used    →    block
  ///   free  │ free  │ used    →    prev + block
  ///   used  │ free  │ free    →    block + next
  ///   free  │ free  │ free    →    prev + block + next
  /// ```
  pub(crate) fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    let header = self.header(block);
    debug_assert!(!header.allocated());

    let prev = if header.prev_allocated() {
      None
    } else {
      self.prev_block(block)
    };
    let next = self.next_block(block);
    let next_free = !self.header(next).allocated();

    let merged = match (prev, next_free) {
      (None, false) => block,
      (Some(prev), false) => {
        let size = self.header(prev).size() + header.size();
        self.remove_free(prev);
        self.remove_free(block);
        self.relink_merged(prev, size);
        prev
      }
      (None, true) => {
        let size = header.size() + self.header(next).size();
        self.remove_free(block);
        self.remove_free(next);
        self.relink_merged(block, size);
        block
      }
      (Some(prev), true) => {
        let size = self.header(prev).size() + header.size() + self.header(next).size();
        self.remove_free(prev);
        self.remove_free(block);
        self.remove_free(next);
        self.relink_merged(prev, size);
        prev
      }
    };

    self.patch_successor(merged);
    merged
  }

  fn relink_merged(
    &mut self,
    head: Block,
    size: usize,
  ) {
    let header = self.header(head).with_size(size).with_allocated(false);
    self.write_block(head, header);
    self.insert_free(head);
  }

  /// Shrinks the allocated `block` to `size` bytes and turns the rest into a
  /// free block, unless the rest would be smaller than a minimum block.
  pub(crate) fn split(
    &mut self,
    block: Block,
    size: usize,
  ) {
    let header = self.header(block);
    debug_assert!(header.allocated());

    let remainder_size = header.size() - size;
    if remainder_size < MIN_BLOCK_SIZE {
      return;
    }

    self.write_block(block, header.with_size(size));

    let remainder = self.next_block(block);
    self.write_block(
      remainder,
      Header::pack(remainder_size, false, true, is_minimum(size)),
    );
    self.insert_free(remainder);
    self.patch_successor(remainder);
  }

  /// Hands out the free `block` for a request of `size` bytes (already
  /// adjusted for the header and alignment).
  pub(crate) fn place(
    &mut self,
    block: Block,
    size: usize,
  ) {
    self.remove_free(block);
    let header = self.header(block).with_allocated(true);
    self.write_block(block, header);
    self.split(block, size);
    self.patch_successor(block);
  }

  /// Returns the allocated `block` to the free lists, merging it with its
  /// neighbors. Returns the resulting free block.
  pub(crate) fn release_block(
    &mut self,
    block: Block,
  ) -> Block {
    let header = self.header(block).with_allocated(false);
    self.write_block(block, header);
    self.insert_free(block);
    self.coalesce(block)
  }
}
