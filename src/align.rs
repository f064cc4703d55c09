/// Block alignment in bytes. Every block size and every payload address is a
/// multiple of this.
pub const ALIGNMENT: usize = 16;

/// Rounds the given size up to the block alignment.
///
/// # Examples
///
/// ```rust
/// use segalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(17), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Like [`align!`], but returns `None` instead of wrapping when `value` is
/// within one alignment unit of `usize::MAX`.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(padded) => Some(padded & !(ALIGNMENT - 1)),
    None => None,
  }
}
