//! Segregated free lists.
//!
//! ```text
//!   class  0 │ 16            singly linked, minimum blocks only
//!   class  1 │ 32 ..= 64     doubly linked
//!   class  2 │ 65 ..= 128
//!      ...   │ ...
//!   class 13 │ 2^17+1 ..= 2^18
//!   class 14 │ > 2^18
//! ```
//!
//! Every list is LIFO: blocks are pushed at the head and fit search returns
//! the first large-enough block, not the best one.

use crate::{
  arena::Arena,
  block::{Block, MIN_BLOCK_SIZE, is_minimum},
  heap::Heap,
};

/// Number of size classes.
pub const CLASS_COUNT: usize = 15;

/// Maps a block size to its size class.
///
/// # Examples
///
/// ```rust
/// use segalloc::classify;
///
/// assert_eq!(classify(16), 0);
/// assert_eq!(classify(32), 1);
/// assert_eq!(classify(64), 1);
/// assert_eq!(classify(80), 2);
/// assert_eq!(classify(1 << 20), 14);
/// ```
pub const fn classify(size: usize) -> usize {
  if size < 2 * MIN_BLOCK_SIZE {
    return 0;
  }
  if size <= 4 * MIN_BLOCK_SIZE {
    return 1;
  }

  let ceil_log2 = (usize::BITS - (size - 1).leading_zeros()) as usize;
  let class = ceil_log2 - 5;
  if class < CLASS_COUNT - 1 {
    class
  } else {
    CLASS_COUNT - 1
  }
}

/// Heads of the size-class lists.
pub(crate) struct FreeLists {
  heads: [Option<Block>; CLASS_COUNT],
}

impl FreeLists {
  pub(crate) const fn new() -> Self {
    Self {
      heads: [None; CLASS_COUNT],
    }
  }

  pub(crate) const fn head(
    &self,
    class: usize,
  ) -> Option<Block> {
    self.heads[class]
  }
}

/// Walks one free list through its forward links.
pub(crate) struct FreeListIter<'a, A: Arena> {
  heap: &'a Heap<A>,
  cursor: Option<Block>,
}

impl<A: Arena> Iterator for FreeListIter<'_, A> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.cursor?;
    self.cursor = self.heap.forward_link(block);
    Some(block)
  }
}

impl<A: Arena> Heap<A> {
  pub(crate) fn free_list(
    &self,
    class: usize,
  ) -> FreeListIter<'_, A> {
    FreeListIter {
      heap: self,
      cursor: self.lists.head(class),
    }
  }

  /// Pushes a free block onto the head of its class list.
  pub(crate) fn insert_free(
    &mut self,
    block: Block,
  ) {
    let header = self.header(block);
    debug_assert!(!header.allocated());

    let class = classify(header.size());
    let head = self.lists.heads[class];

    self.set_forward_link(block, head);
    if !is_minimum(header.size()) {
      self.set_back_link(block, None);
      if let Some(head) = head {
        self.set_back_link(head, Some(block));
      }
    }
    self.lists.heads[class] = Some(block);
  }

  /// Unlinks a free block from its class list. Must run before the block's
  /// size changes.
  pub(crate) fn remove_free(
    &mut self,
    block: Block,
  ) {
    let header = self.header(block);
    debug_assert!(!header.allocated());

    let class = classify(header.size());
    if class == 0 {
      self.remove_minimum(block);
      return;
    }

    let is_head = self.lists.heads[class] == Some(block);
    let next = self.forward_link(block);
    let prev = self.back_link(block);

    match (is_head, next) {
      (true, None) => self.lists.heads[class] = None,
      (true, Some(next)) => {
        self.lists.heads[class] = Some(next);
        self.set_back_link(next, None);
      }
      (false, None) => {
        if let Some(prev) = prev {
          self.set_forward_link(prev, None);
        }
      }
      (false, Some(next)) => {
        if let Some(prev) = prev {
          self.set_forward_link(prev, Some(next));
        }
        self.set_back_link(next, prev);
      }
    }
  }

  /// The class-0 list has no back links, so finding the predecessor takes a
  /// scan from the head.
  fn remove_minimum(
    &mut self,
    block: Block,
  ) {
    if self.lists.heads[0] == Some(block) {
      self.lists.heads[0] = self.forward_link(block);
      return;
    }

    let predecessor = self
      .free_list(0)
      .find(|&candidate| self.forward_link(candidate) == Some(block));

    match predecessor {
      Some(predecessor) => {
        let next = self.forward_link(block);
        self.set_forward_link(predecessor, next);
      }
      None => {
        log::error!("minimum block at {:#x} is not on its free list", block.offset());
        debug_assert!(false, "minimum block missing from its free list");
      }
    }
  }

  /// First-fit search starting at the class of `size`. Minimum requests take
  /// the head of class 0 when there is one, since all minimum blocks are
  /// interchangeable.
  pub(crate) fn find_fit(
    &self,
    size: usize,
  ) -> Option<Block> {
    let mut class = classify(size);
    if class == 0 {
      if let Some(block) = self.lists.head(0) {
        return Some(block);
      }
      class = 1;
    }

    (class..CLASS_COUNT).find_map(|class| {
      self
        .free_list(class)
        .find(|&block| self.header(block).size() >= size)
    })
  }
}
