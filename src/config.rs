use crate::{
  align::{ALIGNMENT, checked_align},
  block::{CHUNK_SIZE, MIN_BLOCK_SIZE},
};

/// Rounds `bytes` up to a usable growth size: a multiple of 16, at least one
/// minimum block, saturating at the largest aligned `usize`.
pub(crate) const fn normalize_chunk_size(bytes: usize) -> usize {
  let bytes = if bytes < MIN_BLOCK_SIZE {
    MIN_BLOCK_SIZE
  } else {
    bytes
  };
  match checked_align(bytes) {
    Some(aligned) => aligned,
    None => usize::MAX & !(ALIGNMENT - 1),
  }
}

/// Tunables of an [`Allocator`](crate::Allocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Minimum number of bytes requested from the arena per growth. Rounded up
  /// to a multiple of 16 and at least one minimum block when the heap is
  /// built.
  pub chunk_size: usize,
  /// Run the consistency checker after every mutating call and panic on the
  /// first violation. Defaults to on with the `heap-check` feature.
  pub verify: bool,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      chunk_size: CHUNK_SIZE,
      verify: cfg!(feature = "heap-check"),
    }
  }

  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = normalize_chunk_size(chunk_size);
    self
  }

  pub const fn with_verification(
    mut self,
    verify: bool,
  ) -> Self {
    self.verify = verify;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
