//! Property-based tests for the allocator.
//!
//! Uses proptest to drive random operation sequences and checks the heap
//! after every step.

use proptest::prelude::*;
use segalloc::{Allocator, Arena, CLASS_COUNT, Config, Payload, VecArena, classify};

#[derive(Debug, Clone)]
enum Op {
  Allocate(usize),
  Release(usize),
  Resize(usize, usize),
  Zeroed(usize, usize),
}

/// Strategy for request sizes, biased towards the small classes.
fn request_size() -> impl Strategy<Value = usize> {
  prop_oneof![
    4 => 1usize..=24,
    4 => 25usize..=512,
    2 => 513usize..=8192,
    1 => 8193usize..=70_000,
  ]
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    4 => request_size().prop_map(Op::Allocate),
    3 => any::<usize>().prop_map(Op::Release),
    2 => (any::<usize>(), request_size()).prop_map(|(index, size)| Op::Resize(index, size)),
    1 => (1usize..=16, 1usize..=64).prop_map(|(count, size)| Op::Zeroed(count, size)),
  ]
}

/// A live allocation and the byte pattern written into it.
struct Live {
  payload: Payload,
  len: usize,
  fill: u8,
}

fn write_pattern(
  allocator: &mut Allocator,
  live: &Live,
) {
  allocator.payload_mut(live.payload).unwrap()[..live.len].fill(live.fill);
}

fn assert_pattern(
  allocator: &Allocator,
  live: &Live,
) {
  let bytes = &allocator.payload(live.payload).unwrap()[..live.len];
  assert!(bytes.iter().all(|&byte| byte == live.fill));
}

fn allocator() -> Allocator {
  Allocator::with_config(
    VecArena::new(),
    Config::new().with_verification(true),
  )
  .unwrap()
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  /// Every operation leaves a consistent heap, and live payloads keep
  /// their contents.
  #[test]
  fn random_sequences_keep_heap_consistent(ops in prop::collection::vec(op(), 1..120)) {
    let mut allocator = allocator();
    let mut live: Vec<Live> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
      let fill = step as u8;
      match op {
        Op::Allocate(size) => {
          let payload = allocator.allocate(size).unwrap();
          prop_assert_eq!(allocator.address(payload) % 16, 0);
          prop_assert!(allocator.payload_size(payload).unwrap() >= size);
          let entry = Live { payload, len: size, fill };
          write_pattern(&mut allocator, &entry);
          live.push(entry);
        }
        Op::Release(index) if !live.is_empty() => {
          let entry = live.swap_remove(index % live.len());
          allocator.release(entry.payload);
        }
        Op::Resize(index, size) if !live.is_empty() => {
          let index = index % live.len();
          let kept = live[index].len.min(size);
          let payload = allocator.resize(live[index].payload, size).unwrap().unwrap();
          let bytes = &allocator.payload(payload).unwrap()[..kept];
          prop_assert!(bytes.iter().all(|&byte| byte == live[index].fill));

          live[index] = Live { payload, len: size, fill };
          write_pattern(&mut allocator, &live[index]);
        }
        Op::Zeroed(count, size) => {
          let payload = allocator.zeroed_allocate(count, size).unwrap();
          let bytes = &allocator.payload(payload).unwrap()[..count * size];
          prop_assert!(bytes.iter().all(|&byte| byte == 0));
          let entry = Live { payload, len: count * size, fill };
          write_pattern(&mut allocator, &entry);
          live.push(entry);
        }
        Op::Release(_) | Op::Resize(..) => {}
      }

      prop_assert_eq!(allocator.check_heap(), Ok(()));
    }

    for entry in &live {
      assert_pattern(&allocator, entry);
    }

    for entry in live.drain(..) {
      allocator.release(entry.payload);
    }
    let stats = allocator.stats();
    prop_assert_eq!(stats.allocated_blocks, 0);
    prop_assert_eq!(stats.free_blocks, 1);
  }

  /// Releasing and re-requesting the same size never grows the arena.
  #[test]
  fn release_then_allocate_reuses(sizes in prop::collection::vec(request_size(), 1..40)) {
    let mut allocator = allocator();
    let payloads: Vec<_> = sizes.iter().map(|&size| allocator.allocate(size).unwrap()).collect();
    let grown = allocator.arena().size();

    for (&payload, &size) in payloads.iter().zip(&sizes) {
      allocator.release(payload);
      let again = allocator.allocate(size).unwrap();
      prop_assert_eq!(again, payload);
    }
    prop_assert_eq!(allocator.arena().size(), grown);
  }

  /// Size classes are monotonic and cover every block size.
  #[test]
  fn classify_is_monotonic(a in 1usize..(1 << 24), b in 1usize..(1 << 24)) {
    let (small, large) = (a.min(b) * 16, a.max(b) * 16);
    prop_assert!(classify(small) <= classify(large));
    prop_assert!(classify(large) < CLASS_COUNT);
  }
}
