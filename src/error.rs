/// Failures of the arena-growth primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
  #[error("arena exhausted: requested {requested} bytes, {available} available")]
  Exhausted { requested: usize, available: usize },
  #[error("request of {requested} bytes does not fit the growth primitive")]
  TooLarge { requested: usize },
  #[error("sbrk failed (errno {errno})")]
  Os { errno: i32 },
  #[error("program break moved: expected {expected:#x}, found {found:#x}")]
  Discontiguous { expected: usize, found: usize },
  #[error("arena region at {address:#x} is not 16-byte aligned")]
  Misaligned { address: usize },
}

/// Errors surfaced by the public allocator API.
///
/// None of these leave the heap in an inconsistent state: a failed request
/// changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  #[error("zero-sized allocation request")]
  ZeroSize,
  #[error("allocation size overflows: {count} x {size}")]
  SizeOverflow { count: usize, size: usize },
  #[error("request of {requested} bytes is too large")]
  RequestTooLarge { requested: usize },
  #[error("alignment {align} exceeds the 16-byte block alignment")]
  UnsupportedAlignment { align: usize },
  #[error("no live allocation at offset {offset:#x}")]
  InvalidPayload { offset: usize },
  #[error("out of memory: {0}")]
  OutOfMemory(#[from] ArenaError),
}
