use std::alloc::Layout;

use crate::{
  align::{ALIGNMENT, checked_align},
  arena::{Arena, VecArena},
  block::{Block, WSIZE},
  check::HeapViolation,
  config::Config,
  error::AllocError,
  heap::Heap,
};

/// Handle to the payload of a live allocation: its offset inside the arena.
///
/// Payload offsets are 16-byte aligned, and so are their addresses
/// ([`Allocator::address`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(usize);

impl Payload {
  pub(crate) const fn at(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }
}

/// Segregated-fit allocator over a single growable [`Arena`].
///
/// Not thread-safe: every call runs to completion on `&mut self`. Share one
/// between threads only behind an external lock.
pub struct Allocator<A: Arena = VecArena> {
  heap: Heap<A>,
  config: Config,
}

impl<A: Arena> Allocator<A> {
  pub fn new(arena: A) -> Result<Self, AllocError> {
    Self::with_config(arena, Config::default())
  }

  /// Lays out the prologue and epilogue sentinels in `arena` and grows it by
  /// one chunk.
  pub fn with_config(
    arena: A,
    config: Config,
  ) -> Result<Self, AllocError> {
    let allocator = Self {
      heap: Heap::new(arena, config.chunk_size)?,
      config,
    };
    allocator.verify("initialization");
    Ok(allocator)
  }

  /// Allocates at least `size` bytes of 16-byte aligned payload.
  ///
  /// Free blocks are reused first; the arena only grows when no free block is
  /// large enough.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Payload, AllocError> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let block_size = size
      .checked_add(WSIZE)
      .and_then(checked_align)
      .ok_or(AllocError::RequestTooLarge { requested: size })?;

    let block = match self.heap.find_fit(block_size) {
      Some(block) => block,
      None => self.heap.extend(block_size.max(self.heap.chunk_size))?,
    };

    self.heap.place(block, block_size);
    self.verify("allocate");
    Ok(Payload(block.payload()))
  }

  /// Like [`allocate`](Self::allocate), for a [`Layout`] whose alignment is at
  /// most 16.
  pub fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Result<Payload, AllocError> {
    if layout.align() > ALIGNMENT {
      return Err(AllocError::UnsupportedAlignment {
        align: layout.align(),
      });
    }
    self.allocate(layout.size())
  }

  /// Frees a payload and merges its block with free neighbors.
  ///
  /// Releasing `None` does nothing. A payload that does not name a live
  /// allocation (already released, or never handed out) is ignored with a
  /// warning.
  pub fn release(
    &mut self,
    payload: impl Into<Option<Payload>>,
  ) {
    let Some(payload) = payload.into() else {
      return;
    };

    let block = match self.live_block(payload) {
      Ok(block) => block,
      Err(error) => {
        log::warn!("ignoring release: {error}");
        return;
      }
    };

    self.heap.release_block(block);
    self.verify("release");
  }

  /// Moves an allocation into a block of `size` bytes, keeping the first
  /// `min(old, size)` bytes.
  ///
  /// - `size == 0` releases `payload` and returns `Ok(None)`.
  /// - `None` behaves like [`allocate`](Self::allocate).
  /// - If the new allocation fails, `payload` stays valid and untouched.
  pub fn resize(
    &mut self,
    payload: impl Into<Option<Payload>>,
    size: usize,
  ) -> Result<Option<Payload>, AllocError> {
    let payload = payload.into();

    if size == 0 {
      self.release(payload);
      return Ok(None);
    }

    let Some(payload) = payload else {
      return self.allocate(size).map(Some);
    };

    let old_size = self.payload_size(payload)?;
    let moved = self.allocate(size)?;

    let copied = old_size.min(size);
    self
      .heap
      .arena
      .bytes_mut()
      .copy_within(payload.0..payload.0 + copied, moved.0);

    self.release(payload);
    Ok(Some(moved))
  }

  /// Allocates `count * size` zeroed bytes.
  pub fn zeroed_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<Payload, AllocError> {
    if count == 0 {
      return Err(AllocError::ZeroSize);
    }
    let total = count
      .checked_mul(size)
      .ok_or(AllocError::SizeOverflow { count, size })?;

    let payload = self.allocate(total)?;
    self.heap.arena.bytes_mut()[payload.0..payload.0 + total].fill(0);
    Ok(payload)
  }

  /// Usable bytes behind `payload` (the block size minus its header; may
  /// exceed the size that was requested).
  pub fn payload_size(
    &self,
    payload: Payload,
  ) -> Result<usize, AllocError> {
    let block = self.live_block(payload)?;
    Ok(self.heap.header(block).size() - WSIZE)
  }

  pub fn payload(
    &self,
    payload: Payload,
  ) -> Result<&[u8], AllocError> {
    let size = self.payload_size(payload)?;
    Ok(&self.heap.arena.bytes()[payload.0..payload.0 + size])
  }

  pub fn payload_mut(
    &mut self,
    payload: Payload,
  ) -> Result<&mut [u8], AllocError> {
    let size = self.payload_size(payload)?;
    Ok(&mut self.heap.arena.bytes_mut()[payload.0..payload.0 + size])
  }

  /// Absolute address of `payload` in memory.
  pub fn address(
    &self,
    payload: Payload,
  ) -> usize {
    self.heap.arena.low_bound() + payload.0
  }

  /// Runs the full consistency checker.
  pub fn check_heap(&self) -> Result<(), HeapViolation> {
    self.heap.check()
  }

  pub const fn config(&self) -> &Config {
    &self.config
  }

  pub const fn arena(&self) -> &A {
    &self.heap.arena
  }

  pub fn into_arena(self) -> A {
    self.heap.arena
  }

  pub(crate) const fn heap(&self) -> &Heap<A> {
    &self.heap
  }

  #[cfg(test)]
  pub(crate) fn heap_mut(&mut self) -> &mut Heap<A> {
    &mut self.heap
  }

  /// Resolves `payload` to its block if it names a live allocation. Only the
  /// header word in front of it is inspected, so a pointer into the middle of
  /// a payload whose bytes happen to look like a header goes undetected.
  fn live_block(
    &self,
    payload: Payload,
  ) -> Result<Block, AllocError> {
    let invalid = AllocError::InvalidPayload { offset: payload.0 };
    let end = self.heap.arena.size();

    if payload.0 % ALIGNMENT != 0 || payload.0 < self.heap.first_block().payload() || payload.0 >= end {
      return Err(invalid);
    }

    let block = Block::from_payload(payload.0);
    let header = self.heap.header(block);
    let successor_end = block
      .offset()
      .checked_add(header.size())
      .and_then(|next| next.checked_add(WSIZE));
    if !header.allocated() || header.size() == 0 || successor_end.is_none_or(|successor_end| successor_end > end) {
      return Err(invalid);
    }

    Ok(block)
  }

  fn verify(
    &self,
    operation: &str,
  ) {
    if !self.config.verify {
      return;
    }
    if let Err(violation) = self.heap.check() {
      log::error!("heap corrupted after {operation}: {violation}");
      panic!("heap corrupted after {operation}: {violation}");
    }
  }
}

impl Allocator<VecArena> {
  /// An allocator over a fresh [`VecArena`] of `capacity` bytes.
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    Self::new(VecArena::with_capacity(capacity))
  }
}
