//! Read-only views of the heap for tests, tooling and debugging.

use crate::{
  allocator::{Allocator, Payload},
  arena::Arena,
  block::{Block, is_minimum},
  free_list::CLASS_COUNT,
  heap::Heap,
};

/// Decoded header of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Offset of the header inside the arena.
  pub offset: usize,
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
  pub prev_minimum: bool,
}

impl BlockInfo {
  /// The payload handle this block hands out (or handed out, if free).
  pub const fn payload(&self) -> Payload {
    Payload::at(Block::at(self.offset).payload())
  }

  pub const fn is_minimum(&self) -> bool {
    is_minimum(self.size)
  }
}

/// Iterator over all blocks in address order, sentinels excluded.
pub struct Blocks<'a, A: Arena> {
  heap: &'a Heap<A>,
  cursor: Block,
}

impl<A: Arena> Iterator for Blocks<'_, A> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let header = self.heap.header(self.cursor);
    if header.size() == 0 {
      return None;
    }

    let info = BlockInfo {
      offset: self.cursor.offset(),
      size: header.size(),
      allocated: header.allocated(),
      prev_allocated: header.prev_allocated(),
      prev_minimum: header.prev_minimum(),
    };
    self.cursor = self.heap.next_block(self.cursor);
    Some(info)
  }
}

/// Occupancy summary of a heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub arena_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl<A: Arena> Allocator<A> {
  pub fn blocks(&self) -> Blocks<'_, A> {
    Blocks {
      heap: self.heap(),
      cursor: self.heap().first_block(),
    }
  }

  pub fn stats(&self) -> HeapStats {
    self.blocks().fold(
      HeapStats {
        arena_bytes: self.arena().size(),
        ..HeapStats::default()
      },
      |mut stats, block| {
        if block.allocated {
          stats.allocated_blocks += 1;
          stats.allocated_bytes += block.size;
        } else {
          stats.free_blocks += 1;
          stats.free_bytes += block.size;
          stats.largest_free = stats.largest_free.max(block.size);
        }
        stats
      },
    )
  }

  /// Number of blocks on each size-class list.
  pub fn free_list_lengths(&self) -> [usize; CLASS_COUNT] {
    let heap = self.heap();
    std::array::from_fn(|class| heap.free_list(class).count())
  }

  /// Logs every block and the minimum-block list at debug level.
  pub fn dump(&self) {
    log::debug!("heap of {} bytes", self.arena().size());
    for block in self.blocks() {
      log::debug!(
        "block {:#x}: size {}, alloc {}, prev alloc {}, prev mini {}",
        block.offset,
        block.size,
        block.allocated,
        block.prev_allocated,
        block.prev_minimum
      );
    }

    let minimum: Vec<_> = self
      .heap()
      .free_list(0)
      .map(|block| format!("{:#x}", block.offset()))
      .collect();
    log::debug!("minimum list: [{}]", minimum.join(", "));
  }
}
