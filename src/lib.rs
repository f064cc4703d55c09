//! # segalloc - A Segregated-Fit Memory Allocator Library
//!
//! This crate provides a general-purpose **segregated free list allocator**
//! with boundary-tag coalescing, working over a single contiguous, growable
//! memory arena (a buffer it owns, or the real program break via `sbrk`).
//!
//! ## Overview
//!
//! Blocks are laid out back to back in the arena. Every block starts with a
//! one-word header; free blocks additionally thread themselves onto one of
//! fifteen size-class lists:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              ARENA                                   │
//!   │                                                                      │
//!   │   ┌───┬──────┬────────────┬────┬──────────────┬──────────────────┬───┐
//!   │   │ P │  A1  │   free     │ A2 │      A3      │      free        │ E │
//!   │   └───┴──────┴────────────┴────┴──────────────┴──────────────────┴───┘
//!   │     ▲             │                                   │            ▲ │
//!   │     │             ▼                                   ▼            │ │
//!   │  prologue    class 3 list                        class 8 list  epilogue
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Free blocks never touch each other: releasing a block merges it with
//!   any free neighbor immediately.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment macro (align!) and checked rounding
//!   ├── arena      - Arena trait, VecArena and SbrkArena
//!   ├── block      - Header encoding and the raw block view (internal)
//!   ├── navigate   - Boundary-tag neighbor lookup (internal)
//!   ├── free_list  - Size classes and the segregated lists
//!   ├── coalesce   - Merging, splitting and placement (internal)
//!   ├── grow       - Arena growth (internal)
//!   ├── check      - Heap consistency checker
//!   ├── inspect    - Block iteration, statistics, debug dump
//!   ├── config     - Allocator configuration
//!   ├── error      - Error types
//!   └── allocator  - Allocator: allocate / release / resize / zeroed_allocate
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{Allocator, VecArena};
//!
//! let mut allocator = Allocator::new(VecArena::with_capacity(1 << 20)).unwrap();
//!
//! // Allocate 24 bytes and use them
//! let payload = allocator.allocate(24).unwrap();
//! allocator.payload_mut(payload).unwrap()[..5].copy_from_slice(b"hello");
//!
//! // Grow the allocation; the contents move along
//! let payload = allocator.resize(payload, 200).unwrap().unwrap();
//! assert_eq!(&allocator.payload(payload).unwrap()[..5], b"hello");
//!
//! // Free the memory
//! allocator.release(payload);
//! assert!(allocator.check_heap().is_ok());
//! ```
//!
//! ## How It Works
//!
//! Each block carries its size and three flags in a single header word. The
//! flags describe the block itself *and its physical predecessor*, so most
//! neighbor lookups never need a footer:
//!
//! ```text
//!   Allocated block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │     Header (8 B)      │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ allocated: 1    │  │  │                          │  │
//!   │  │ prev alloc: ?   │  │  │    N - 8 bytes usable    │  │
//!   │  │ prev mini: ?    │  │  │                          │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Payload returned to the caller (16-byte aligned)
//! ```
//!
//! Free blocks hold their list links in the payload and, when larger than 16
//! bytes, a footer copy of the header so the next block can step back to
//! them. 16-byte blocks have room for a single forward link only: they live
//! on their own singly linked list, and their successor finds them at a fixed
//! offset instead of through a footer.
//!
//! When no listed block fits a request, the arena is grown by at least one
//! 4 KiB chunk and the new space is merged with a free block that may end the
//! heap.
//!
//! ## Features
//!
//! - **Segregated fit**: 15 power-of-two size classes, first fit within a class
//! - **Immediate coalescing**: no two free blocks are ever adjacent
//! - **Low overhead**: one header word per allocated block, no footer
//! - **Consistency checker**: [`Allocator::check_heap`] audits every block and list
//! - **Pluggable arena**: owned buffer ([`VecArena`]) or program break ([`SbrkArena`])
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization, wrap it in a lock to share
//! - **No shrinking**: the arena only grows, memory is never returned
//! - **Fixed alignment**: payloads are 16-byte aligned, larger alignments are rejected
//!
//! ## Safety
//!
//! The allocator itself hands out offsets ([`Payload`]) and accesses memory
//! only through bounds-checked slices. The one `unsafe` entry point is
//! [`SbrkArena::new`], which takes over the process's program break.

pub mod align;
mod allocator;
mod arena;
mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod free_list;
mod grow;
mod heap;
mod inspect;
mod navigate;

pub use allocator::{Allocator, Payload};
#[cfg(unix)]
pub use arena::SbrkArena;
pub use arena::{Arena, VecArena};
pub use block::{CHUNK_SIZE, MIN_BLOCK_SIZE};
pub use check::HeapViolation;
pub use config::Config;
pub use error::{AllocError, ArenaError};
pub use free_list::{CLASS_COUNT, classify};
pub use inspect::{BlockInfo, Blocks, HeapStats};
