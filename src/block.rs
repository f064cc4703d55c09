//! On-heap block layout.
//!
//! ```text
//!   Allocated block:
//!   ┌──────────┬──────────────────────────────────────────┐
//!   │  header  │               user payload               │
//!   └──────────┴──────────────────────────────────────────┘
//!
//!   Free block (size > 16):
//!   ┌──────────┬──────────┬──────────┬─────────┬──────────┐
//!   │  header  │ forward  │   back   │   ...   │  footer  │
//!   └──────────┴──────────┴──────────┴─────────┴──────────┘
//!
//!   Free minimum block (size == 16):
//!   ┌──────────┬──────────┐
//!   │  header  │ forward  │
//!   └──────────┴──────────┘
//!
//!   Header word:
//!   63                                   4   3   2   1   0
//!   ┌─────────────────────────────────────┬───┬───┬───┬───┐
//!   │           size / 16                 │ - │ m │ p │ a │
//!   └─────────────────────────────────────┴───┴───┴───┴───┘
//!     a = allocated, p = predecessor allocated, m = predecessor minimum
//! ```
//!
//! Blocks are addressed by the offset of their header inside the arena. Links
//! store those offsets; offset `0` always holds the prologue footer, so it
//! doubles as the empty link.

use bitfield_struct::bitfield;

use crate::{arena::Arena, heap::Heap};

/// Word and header size (bytes).
pub(crate) const WSIZE: usize = 8;

/// Double word size (bytes).
pub(crate) const DSIZE: usize = 2 * WSIZE;

/// Smallest representable block: one header word plus one link word.
pub const MIN_BLOCK_SIZE: usize = DSIZE;

/// Default number of bytes requested from the arena when no free block fits.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Packed header (and footer) word.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub(crate) struct Header {
  /// This block is allocated.
  pub allocated: bool,
  /// The physically preceding block is allocated.
  pub prev_allocated: bool,
  /// The physically preceding block is a minimum block.
  pub prev_minimum: bool,
  #[bits(1)]
  __: u8,
  /// Block size in units of 16 bytes.
  #[bits(60)]
  units: u64,
}

impl Header {
  /// Packs a block size and its three flags into one word. The low four bits
  /// of `size` are discarded, so flags never bleed into the size.
  pub(crate) const fn pack(
    size: usize,
    allocated: bool,
    prev_allocated: bool,
    prev_minimum: bool,
  ) -> Self {
    Self::new()
      .with_units((size / DSIZE) as u64)
      .with_allocated(allocated)
      .with_prev_allocated(prev_allocated)
      .with_prev_minimum(prev_minimum)
  }

  /// The zero-size, permanently allocated header closing the heap.
  pub(crate) const fn epilogue(
    prev_allocated: bool,
    prev_minimum: bool,
  ) -> Self {
    Self::pack(0, true, prev_allocated, prev_minimum)
  }

  pub(crate) const fn size(self) -> usize {
    self.units() as usize * DSIZE
  }

  pub(crate) const fn with_size(
    self,
    size: usize,
  ) -> Self {
    self.with_units((size / DSIZE) as u64)
  }
}

/// Whether a block of `size` bytes is a minimum block (singly linked when
/// free, never carries a footer).
pub(crate) const fn is_minimum(size: usize) -> bool {
  size == MIN_BLOCK_SIZE
}

/// Offset of a block header inside the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Block(usize);

impl Block {
  pub(crate) const fn at(offset: usize) -> Self {
    Self(offset)
  }

  pub(crate) const fn from_payload(payload: usize) -> Self {
    Self(payload - WSIZE)
  }

  pub(crate) const fn offset(self) -> usize {
    self.0
  }

  pub(crate) const fn payload(self) -> usize {
    self.0 + WSIZE
  }
}

const fn decode_link(word: u64) -> Option<Block> {
  match word {
    0 => None,
    offset => Some(Block(offset as usize)),
  }
}

const fn encode_link(link: Option<Block>) -> u64 {
  match link {
    Some(block) => block.0 as u64,
    None => 0,
  }
}

/// Raw word view over the arena. Nothing outside this impl interprets the
/// payload union directly.
impl<A: Arena> Heap<A> {
  pub(crate) fn word(
    &self,
    at: usize,
  ) -> u64 {
    let mut raw = [0; WSIZE];
    raw.copy_from_slice(&self.arena.bytes()[at..at + WSIZE]);
    u64::from_ne_bytes(raw)
  }

  pub(crate) fn set_word(
    &mut self,
    at: usize,
    word: u64,
  ) {
    self.arena.bytes_mut()[at..at + WSIZE].copy_from_slice(&word.to_ne_bytes());
  }

  pub(crate) fn header(
    &self,
    block: Block,
  ) -> Header {
    Header::from_bits(self.word(block.offset()))
  }

  /// Reads the word where the block's footer lives. Only meaningful for free,
  /// non-minimum blocks.
  pub(crate) fn footer(
    &self,
    block: Block,
  ) -> Header {
    let size = self.header(block).size();
    Header::from_bits(self.word(block.offset() + size - WSIZE))
  }

  /// Writes `header` at `block`, plus a matching footer when the block is free
  /// and larger than the minimum. Free-list links are left untouched.
  pub(crate) fn write_block(
    &mut self,
    block: Block,
    header: Header,
  ) {
    self.set_word(block.offset(), header.into_bits());
    if !header.allocated() && header.size() > MIN_BLOCK_SIZE {
      self.set_word(
        block.offset() + header.size() - WSIZE,
        header.into_bits(),
      );
    }
  }

  pub(crate) fn forward_link(
    &self,
    block: Block,
  ) -> Option<Block> {
    decode_link(self.word(block.payload()))
  }

  pub(crate) fn set_forward_link(
    &mut self,
    block: Block,
    link: Option<Block>,
  ) {
    self.set_word(block.payload(), encode_link(link));
  }

  pub(crate) fn back_link(
    &self,
    block: Block,
  ) -> Option<Block> {
    debug_assert!(!is_minimum(self.header(block).size()));
    decode_link(self.word(block.payload() + WSIZE))
  }

  pub(crate) fn set_back_link(
    &mut self,
    block: Block,
    link: Option<Block>,
  ) {
    debug_assert!(!is_minimum(self.header(block).size()));
    self.set_word(block.payload() + WSIZE, encode_link(link));
  }
}
