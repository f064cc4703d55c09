use crate::{
  align::ALIGNMENT,
  arena::Arena,
  block::{Block, Header, WSIZE},
  config::normalize_chunk_size,
  error::{AllocError, ArenaError},
  free_list::FreeLists,
};

/// Allocator engine state: the arena, the segregated list heads and the
/// position of the first real block.
///
/// ```text
///   ┌──────────┬─────────────────────────────────────┬──────────┐
///   │ prologue │          blocks ...                 │ epilogue │
///   │  footer  │                                     │  header  │
///   └──────────┴─────────────────────────────────────┴──────────┘
///   size 0, allocated                                 size 0, allocated
/// ```
pub(crate) struct Heap<A: Arena> {
  pub(crate) arena: A,
  pub(crate) lists: FreeLists,
  first: Block,
  pub(crate) chunk_size: usize,
}

impl<A: Arena> Heap<A> {
  /// Writes the two sentinels into `arena` and grows it by one chunk.
  /// `chunk_size` is normalized like
  /// [`Config::with_chunk_size`](crate::Config::with_chunk_size) does.
  pub(crate) fn new(
    mut arena: A,
    chunk_size: usize,
  ) -> Result<Self, AllocError> {
    let chunk_size = normalize_chunk_size(chunk_size);
    let base = arena.grow(2 * WSIZE)?;
    if base % ALIGNMENT != 0 {
      return Err(ArenaError::Misaligned { address: base }.into());
    }

    let prologue = base - arena.low_bound();
    let mut heap = Self {
      arena,
      lists: FreeLists::new(),
      first: Block::at(prologue + WSIZE),
      chunk_size,
    };

    heap.set_word(prologue, Header::pack(0, true, true, false).into_bits());
    heap.write_block(heap.first, Header::epilogue(true, false));

    heap.extend(chunk_size)?;
    Ok(heap)
  }

  /// The lowest block in the heap (the epilogue if the heap is empty).
  pub(crate) const fn first_block(&self) -> Block {
    self.first
  }

  /// Offset of the prologue footer.
  pub(crate) const fn prologue(&self) -> usize {
    self.first.offset() - WSIZE
  }
}
