//! The memory region the allocator carves blocks from.
//!
//! The allocator only ever asks an [`Arena`] for more bytes at its high end
//! and never gives any back. Everything it reads or writes lies inside
//! [`Arena::bytes`].

use std::{fmt, slice};

use crate::{align::ALIGNMENT, error::ArenaError};

/// A contiguous, growable memory region.
///
/// Implementations must keep the low bound 16-byte aligned and must never
/// move bytes that were already handed out: `bytes()` after a successful
/// `grow` starts with the exact contents it had before.
pub trait Arena {
  /// Extends the region by `bytes` at its high end and returns the address
  /// of the first new byte. On failure the region is left untouched.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<usize, ArenaError>;

  /// Address of the first byte of the region.
  fn low_bound(&self) -> usize;

  /// Address one past the last byte of the region.
  fn high_bound(&self) -> usize {
    self.low_bound() + self.size()
  }

  /// Current size of the region in bytes.
  fn size(&self) -> usize;

  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];
}

#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Unit([u8; ALIGNMENT]);

/// An owned arena of fixed capacity with a movable break.
///
/// The backing buffer is reserved up front, so the region never moves and
/// growth beyond the capacity fails with [`ArenaError::Exhausted`].
pub struct VecArena {
  units: Vec<Unit>,
  brk: usize,
}

impl VecArena {
  pub const DEFAULT_CAPACITY: usize = 16 << 20;

  pub fn new() -> Self {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }

  /// Creates an empty arena able to grow to `capacity` bytes (rounded up to
  /// the block alignment).
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      units: vec![Unit([0; ALIGNMENT]); capacity.div_ceil(ALIGNMENT)],
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.units.len() * ALIGNMENT
  }
}

impl Default for VecArena {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for VecArena {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("VecArena")
      .field("low_bound", &format_args!("{:#x}", self.low_bound()))
      .field("size", &self.brk)
      .field("capacity", &self.capacity())
      .finish()
  }
}

impl Arena for VecArena {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<usize, ArenaError> {
    let available = self.capacity() - self.brk;
    if bytes > available {
      return Err(ArenaError::Exhausted {
        requested: bytes,
        available,
      });
    }

    let base = self.high_bound();
    self.brk += bytes;
    log::trace!("arena grew by {bytes} bytes to {}", self.brk);
    Ok(base)
  }

  fn low_bound(&self) -> usize {
    self.units.as_ptr() as usize
  }

  fn size(&self) -> usize {
    self.brk
  }

  fn bytes(&self) -> &[u8] {
    // SAFETY: `brk` never exceeds the capacity of `units`, and `Unit` is plain bytes.
    unsafe { slice::from_raw_parts(self.units.as_ptr().cast::<u8>(), self.brk) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as in `bytes`, and `&mut self` makes the borrow exclusive.
    unsafe { slice::from_raw_parts_mut(self.units.as_mut_ptr().cast::<u8>(), self.brk) }
  }
}

/// An arena over the process's program break, grown with `sbrk(2)`.
///
/// The first growth pads the break up to the block alignment. If anything
/// else moves the break between two growths, the region would no longer be
/// contiguous and growth fails with [`ArenaError::Discontiguous`].
#[cfg(unix)]
#[derive(Debug)]
pub struct SbrkArena {
  low: usize,
  size: usize,
}

#[cfg(unix)]
impl SbrkArena {
  /// Creates an arena that takes ownership of the program break from its
  /// first growth onward.
  ///
  /// # Safety
  ///
  /// Nothing else may lower the program break below memory handed to this
  /// arena while it is alive, and at most one `SbrkArena` may exist at a time.
  pub const unsafe fn new() -> Self {
    Self { low: 0, size: 0 }
  }

  fn sbrk(increment: usize) -> Result<usize, ArenaError> {
    let delta =
      libc::intptr_t::try_from(increment).map_err(|_| ArenaError::TooLarge { requested: increment })?;

    // SAFETY: `sbrk` has no memory-safety preconditions; the caller owns the
    // break as required by `new`.
    let previous = unsafe { libc::sbrk(delta) };

    if previous == usize::MAX as *mut libc::c_void {
      return Err(ArenaError::Os {
        errno: std::io::Error::last_os_error().raw_os_error().unwrap_or_default(),
      });
    }

    Ok(previous as usize)
  }
}

#[cfg(unix)]
impl Arena for SbrkArena {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<usize, ArenaError> {
    if self.low == 0 {
      let current = Self::sbrk(0)?;
      let padding = current.next_multiple_of(ALIGNMENT) - current;
      if padding > 0 {
        Self::sbrk(padding)?;
      }
      self.low = current + padding;
    }

    let base = Self::sbrk(bytes)?;
    let expected = self.high_bound();
    if base != expected {
      log::warn!("program break moved from {expected:#x} to {base:#x} outside the arena");
      return Err(ArenaError::Discontiguous {
        expected,
        found: base,
      });
    }

    self.size += bytes;
    log::trace!("program break raised by {bytes} bytes to {:#x}", self.high_bound());
    Ok(base)
  }

  fn low_bound(&self) -> usize {
    self.low
  }

  fn size(&self) -> usize {
    self.size
  }

  fn bytes(&self) -> &[u8] {
    if self.size == 0 {
      return &[];
    }
    // SAFETY: `[low, low + size)` was obtained from `sbrk` and, per the
    // contract of `new`, is still mapped and owned by this arena.
    unsafe { slice::from_raw_parts(self.low as *const u8, self.size) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    if self.size == 0 {
      return &mut [];
    }
    // SAFETY: as in `bytes`, and `&mut self` makes the borrow exclusive.
    unsafe { slice::from_raw_parts_mut(self.low as *mut u8, self.size) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_vec_arena_grows_contiguously() {
    let mut arena = VecArena::with_capacity(64);

    let low = arena.low_bound();
    assert_eq!(low % ALIGNMENT, 0);

    assert_eq!(arena.grow(16), Ok(low));
    assert_eq!(arena.grow(32), Ok(low + 16));
    assert_eq!(arena.size(), 48);
    assert_eq!(arena.high_bound(), low + 48);
    assert_eq!(arena.bytes().len(), 48);
  }

  #[test]
  fn test_vec_arena_exhaustion_leaves_arena_untouched() {
    let mut arena = VecArena::with_capacity(64);
    arena.grow(48).unwrap();

    assert_eq!(
      arena.grow(32),
      Err(ArenaError::Exhausted {
        requested: 32,
        available: 16
      })
    );
    assert_eq!(arena.size(), 48);
  }

  #[test]
  fn test_vec_arena_keeps_contents_across_growth() {
    let mut arena = VecArena::with_capacity(64);
    arena.grow(16).unwrap();
    arena.bytes_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);

    arena.grow(16).unwrap();

    assert_eq!(&arena.bytes()[..4], &[1, 2, 3, 4]);
  }

  #[cfg(unix)]
  #[test]
  fn test_sbrk_rejects_oversized_request() {
    let mut arena = unsafe { SbrkArena::new() };

    assert!(arena.grow(usize::MAX).is_err());
    assert_eq!(arena.size(), 0);
  }
}
