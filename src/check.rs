//! Heap consistency checker.
//!
//! A full walk over every block and every free list. It only reads, and it
//! stops at the first broken invariant. This is a debugging oracle: the
//! allocator runs it after each operation only when [`Config::verify`] is set.
//!
//! [`Config::verify`]: crate::Config::verify

use crate::{
  align::ALIGNMENT,
  arena::Arena,
  block::{Block, Header, MIN_BLOCK_SIZE, WSIZE, is_minimum},
  free_list::{CLASS_COUNT, classify},
  heap::Heap,
};

/// The first broken heap invariant found by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeapViolation {
  #[error("prologue footer {word:#x} is not a zero-size allocated sentinel")]
  Prologue { word: u64 },
  #[error("block at {offset:#x} runs past the end of the arena")]
  OutOfBounds { offset: usize },
  #[error("block at {offset:#x} has size {size}, below the minimum block size")]
  BadSize { offset: usize, size: usize },
  #[error("payload at {address:#x} is not 16-byte aligned")]
  Misaligned { address: usize },
  #[error("block at {offset:#x} records predecessor allocated = {recorded}, but it is {actual}")]
  PredecessorAllocated {
    offset: usize,
    recorded: bool,
    actual: bool,
  },
  #[error("block at {offset:#x} records predecessor minimum = {recorded}, but it is {actual}")]
  PredecessorMinimum {
    offset: usize,
    recorded: bool,
    actual: bool,
  },
  #[error("epilogue at {offset:#x} is not an allocated sentinel at the end of the arena")]
  Epilogue { offset: usize },
  #[error("free blocks at {first:#x} and {second:#x} are adjacent")]
  AdjacentFree { first: usize, second: usize },
  #[error("free block at {offset:#x}: footer {footer:#x} differs from header {header:#x}")]
  FooterMismatch {
    offset: usize,
    header: u64,
    footer: u64,
  },
  #[error("free list {class} links to {offset:#x}, which is not a free block")]
  NotAFreeBlock { class: usize, offset: usize },
  #[error("free list {class} reaches block {offset:#x} a second time")]
  ListedTwice { class: usize, offset: usize },
  #[error("free list {class} holds block {offset:#x} of size {size}, which belongs in class {expected}")]
  WrongClass {
    class: usize,
    offset: usize,
    size: usize,
    expected: usize,
  },
  #[error("free list {class}: back link of {offset:#x} does not point to its list predecessor")]
  BrokenBackLink { class: usize, offset: usize },
  #[error("heap walk found {heap} free blocks, free lists hold {listed}")]
  FreeCountMismatch { heap: usize, listed: usize },
}

impl<A: Arena> Heap<A> {
  pub(crate) fn check(&self) -> Result<(), HeapViolation> {
    let free_blocks = self.check_blocks()?;
    self.check_free_lists(&free_blocks)
  }

  /// Walks the implicit block list from the prologue to the epilogue and
  /// returns the free blocks in address order.
  fn check_blocks(&self) -> Result<Vec<Block>, HeapViolation> {
    let end = self.arena.size();
    let low = self.arena.low_bound();

    let prologue = Header::from_bits(self.word(self.prologue()));
    if prologue.size() != 0 || !prologue.allocated() {
      return Err(HeapViolation::Prologue {
        word: prologue.into_bits(),
      });
    }

    let mut free_blocks = Vec::new();
    let mut prev_allocated = true;
    let mut prev_minimum = false;
    let mut prev_offset = self.prologue();
    let mut block = self.first_block();

    loop {
      let offset = block.offset();
      if offset + WSIZE > end {
        return Err(HeapViolation::OutOfBounds { offset });
      }

      let header = self.header(block);
      if header.prev_allocated() != prev_allocated {
        return Err(HeapViolation::PredecessorAllocated {
          offset,
          recorded: header.prev_allocated(),
          actual: prev_allocated,
        });
      }
      if header.prev_minimum() != prev_minimum {
        return Err(HeapViolation::PredecessorMinimum {
          offset,
          recorded: header.prev_minimum(),
          actual: prev_minimum,
        });
      }

      let size = header.size();
      if size == 0 {
        if !header.allocated() || offset + WSIZE != end {
          return Err(HeapViolation::Epilogue { offset });
        }
        return Ok(free_blocks);
      }

      if size < MIN_BLOCK_SIZE {
        return Err(HeapViolation::BadSize { offset, size });
      }
      if offset + size + WSIZE > end {
        return Err(HeapViolation::OutOfBounds { offset });
      }

      let address = low + block.payload();
      if address % ALIGNMENT != 0 {
        return Err(HeapViolation::Misaligned { address });
      }

      if !header.allocated() {
        if !prev_allocated {
          return Err(HeapViolation::AdjacentFree {
            first: prev_offset,
            second: offset,
          });
        }

        if !is_minimum(size) {
          let footer = self.footer(block);
          if footer != header {
            return Err(HeapViolation::FooterMismatch {
              offset,
              header: header.into_bits(),
              footer: footer.into_bits(),
            });
          }
        }

        free_blocks.push(block);
      }

      prev_allocated = header.allocated();
      prev_minimum = is_minimum(size);
      prev_offset = offset;
      block = self.next_block(block);
    }
  }

  fn check_free_lists(
    &self,
    free_blocks: &[Block],
  ) -> Result<(), HeapViolation> {
    let mut seen = vec![false; free_blocks.len()];
    let mut listed = 0;

    for class in 0..CLASS_COUNT {
      let mut previous = None;
      let mut cursor = self.lists.head(class);

      while let Some(block) = cursor {
        let offset = block.offset();
        let Ok(index) = free_blocks.binary_search(&block) else {
          return Err(HeapViolation::NotAFreeBlock { class, offset });
        };
        if seen[index] {
          return Err(HeapViolation::ListedTwice { class, offset });
        }
        seen[index] = true;
        listed += 1;

        let size = self.header(block).size();
        let expected = classify(size);
        if expected != class {
          return Err(HeapViolation::WrongClass {
            class,
            offset,
            size,
            expected,
          });
        }

        if class != 0 && self.back_link(block) != previous {
          return Err(HeapViolation::BrokenBackLink { class, offset });
        }

        previous = Some(block);
        cursor = self.forward_link(block);
      }
    }

    if listed != free_blocks.len() {
      return Err(HeapViolation::FreeCountMismatch {
        heap: free_blocks.len(),
        listed,
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Allocator, VecArena};

  fn allocator() -> Allocator {
    Allocator::new(VecArena::with_capacity(1 << 16)).unwrap()
  }

  fn block(payload: crate::Payload) -> Block {
    Block::from_payload(payload.offset())
  }

  #[test]
  fn test_fresh_heap_is_consistent() {
    assert_eq!(allocator().check_heap(), Ok(()));
  }

  #[test]
  fn test_detects_footer_mismatch() {
    let mut allocator = allocator();
    let a = allocator.allocate(40).unwrap();
    let _guard = allocator.allocate(40).unwrap();
    allocator.release(a);

    let footer_at = block(a).offset() + 48 - WSIZE;
    allocator.heap_mut().set_word(footer_at, 0x30 | 0b011);

    assert!(matches!(
      allocator.check_heap(),
      Err(HeapViolation::FooterMismatch { offset, .. }) if offset == block(a).offset()
    ));
  }

  #[test]
  fn test_detects_stale_predecessor_bit() {
    let mut allocator = allocator();
    let _a = allocator.allocate(40).unwrap();
    let b = allocator.allocate(40).unwrap();

    let heap = allocator.heap_mut();
    let header = heap.header(block(b)).with_prev_allocated(false);
    heap.write_block(block(b), header);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::PredecessorAllocated {
        offset: block(b).offset(),
        recorded: false,
        actual: true,
      })
    );
  }

  #[test]
  fn test_detects_adjacent_free_blocks() {
    let mut allocator = allocator();
    let a = allocator.allocate(40).unwrap();
    let b = allocator.allocate(40).unwrap();
    let _guard = allocator.allocate(40).unwrap();
    allocator.release(a);

    // Free `b` behind the allocator's back without coalescing.
    let heap = allocator.heap_mut();
    let header = heap.header(block(b)).with_allocated(false);
    heap.write_block(block(b), header);
    heap.insert_free(block(b));
    heap.patch_successor(block(b));

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::AdjacentFree {
        first: block(a).offset(),
        second: block(b).offset(),
      })
    );
  }

  #[test]
  fn test_detects_block_missing_from_free_lists() {
    let mut allocator = allocator();
    let a = allocator.allocate(40).unwrap();
    let _guard = allocator.allocate(40).unwrap();
    allocator.release(a);

    allocator.heap_mut().remove_free(block(a));

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::FreeCountMismatch { heap: 2, listed: 1 })
    );
  }

  #[test]
  fn test_detects_allocated_block_on_free_list() {
    let mut allocator = allocator();
    let a = allocator.allocate(40).unwrap();

    // Push the allocated block onto class 1 by hand.
    let heap = allocator.heap_mut();
    let header = heap.header(block(a));
    heap.write_block(block(a), header.with_allocated(false));
    heap.insert_free(block(a));
    heap.write_block(block(a), header);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::NotAFreeBlock {
        class: 1,
        offset: block(a).offset(),
      })
    );
  }

  #[test]
  fn test_detects_broken_back_link() {
    let mut allocator = allocator();
    let a = allocator.allocate(40).unwrap();
    let _x = allocator.allocate(8).unwrap();
    let b = allocator.allocate(40).unwrap();
    let _y = allocator.allocate(8).unwrap();
    allocator.release(a);
    allocator.release(b);

    allocator.heap_mut().set_back_link(block(a), None);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::BrokenBackLink {
        class: 1,
        offset: block(a).offset(),
      })
    );
  }

  #[test]
  fn test_detects_cycle_in_minimum_list() {
    let mut allocator = allocator();
    let a = allocator.allocate(8).unwrap();
    let _guard = allocator.allocate(8).unwrap();
    allocator.release(a);

    allocator.heap_mut().set_forward_link(block(a), Some(block(a)));

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::ListedTwice {
        class: 0,
        offset: block(a).offset(),
      })
    );
  }

  #[test]
  fn test_detects_block_on_wrong_class_list() {
    let mut allocator = allocator();
    let a = allocator.allocate(80).unwrap();
    let _guard = allocator.allocate(8).unwrap();
    allocator.release(a);

    // Cut the listed 96-byte block down to 64 bytes and fill the gap with an
    // allocated block, so only its list membership is wrong.
    let heap = allocator.heap_mut();
    let header = heap.header(block(a));
    assert_eq!(header.size(), 96);
    heap.write_block(block(a), header.with_size(64));
    let tail = heap.next_block(block(a));
    heap.write_block(tail, Header::pack(32, true, false, false));
    heap.patch_successor(tail);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::WrongClass {
        class: 2,
        offset: block(a).offset(),
        size: 64,
        expected: 1,
      })
    );
  }

  #[test]
  fn test_detects_clobbered_prologue() {
    let mut allocator = allocator();

    let heap = allocator.heap_mut();
    let prologue = heap.prologue();
    heap.set_word(prologue, 0);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::Prologue { word: 0 })
    );
  }

  #[test]
  fn test_detects_free_epilogue() {
    let mut allocator = allocator();
    let epilogue = Block::at(allocator.arena().size() - WSIZE);

    let heap = allocator.heap_mut();
    let header = heap.header(epilogue).with_allocated(false);
    heap.set_word(epilogue.offset(), header.into_bits());

    assert_eq!(
      allocator.check_heap(),
      Err(HeapViolation::Epilogue {
        offset: epilogue.offset(),
      })
    );
  }

  #[test]
  fn test_violation_describes_itself() {
    let violation = HeapViolation::FreeCountMismatch { heap: 3, listed: 2 };

    assert_eq!(
      violation.to_string(),
      "heap walk found 3 free blocks, free lists hold 2"
    );
  }
}
