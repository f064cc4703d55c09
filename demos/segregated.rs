use std::{alloc::Layout, io::Read};

use libc::sbrk;
use segalloc::{Allocator, Payload, SbrkArena};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  allocator: &Allocator<SbrkArena>,
  layout: Layout,
  payload: Payload,
) {
  println!(
    "Allocated {} bytes, address = {:#x}, usable = {} bytes, arena = {} bytes",
    layout.size(),
    allocator.address(payload),
    allocator.payload_size(payload).unwrap_or_default(),
    allocator.stats().arena_bytes,
  );
}

fn main() {
  // The allocator takes over the program break from here on. The standard
  // library's own allocator may move the break too, in which case growth
  // fails cleanly with `ArenaError::Discontiguous`.
  let mut allocator = match Allocator::new(unsafe { SbrkArena::new() }) {
    Ok(allocator) => allocator,
    Err(error) => {
      eprintln!("failed to set up the heap: {error}");
      return;
    }
  };

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32. Even tiny requests get a 16-byte block.
  // --------------------------------------------------------------------
  let layout_u32 = Layout::new::<u32>();
  let first = allocator.allocate_layout(layout_u32).unwrap();
  println!("\n[1] Allocate u32");
  print_alloc(&allocator, layout_u32, first);

  allocator.payload_mut(first).unwrap()[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  println!("[1] Value written to first block = {:02X?}", &allocator.payload(first).unwrap()[..4]);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes and an array of u16 right behind it.
  // --------------------------------------------------------------------
  let layout_12_bytes = Layout::array::<u8>(12).unwrap();
  let second = allocator.allocate_layout(layout_12_bytes).unwrap();
  println!("\n[2] Allocate [u8; 12]");
  print_alloc(&allocator, layout_12_bytes, second);
  allocator.payload_mut(second).unwrap()[..12].fill(0xAB);

  let layout_u16_array = Layout::array::<u16>(16).unwrap();
  let third = allocator.allocate_layout(layout_u16_array).unwrap();
  println!("\n[2] Allocate [u16; 16]");
  print_alloc(&allocator, layout_u16_array, third);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the first block and allocate something small again.
  //    The freed 16-byte block sits on the minimum list and is reused.
  // --------------------------------------------------------------------
  allocator.release(first);
  println!("\n[3] Released first block at {:#x}", allocator.address(first));

  let layout_2_bytes = Layout::array::<u8>(2).unwrap();
  let fourth = allocator.allocate_layout(layout_2_bytes).unwrap();
  print_alloc(&allocator, layout_2_bytes, fourth);
  println!(
    "[3] fourth == first? {}",
    if fourth == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Allocate a large block to observe heap growth.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");

  let layout_big = Layout::array::<u8>(64 * 1024).unwrap();
  match allocator.allocate_layout(layout_big) {
    Ok(big) => {
      println!("\n[4] Allocate large 64 KiB block");
      print_alloc(&allocator, layout_big, big);
    }
    Err(error) => println!("\n[4] Large allocation failed: {error}"),
  }

  print_program_break("after large alloc");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) End of demo. The heap must still be consistent.
  // --------------------------------------------------------------------
  match allocator.check_heap() {
    Ok(()) => println!("\n[5] Heap is consistent: {:?}", allocator.stats()),
    Err(violation) => println!("\n[5] Heap is corrupted: {violation}"),
  }
}
