//! Segregated free-list allocator for embedded systems
//!
//! This crate provides a single type called [`Allocator`]. This type implements
//! the [`core::alloc::GlobalAlloc`]-trait, which is required to use the
//! [`alloc`-crate][alloc] on `#![no_std]`-targets. Internally it is a
//! boundary-tag allocator with 14 segregated size-class buckets plus a
//! dedicated list for minimum-sized blocks, in the spirit of the classic
//! CS:APP-style implicit/explicit free-list allocators, tuned for a single
//! statically-sized backing buffer rather than a real OS heap.
//!
//! # Usage
//! The usage is simple: just copy and paste the following code snipped into
//! your binary crate and potentially adjust the number of bytes of the heap
//! (here 64K):
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: segalloc::Allocator<65536> = segalloc::Allocator::new();
//!
//! extern crate alloc;
//! ```
//! Afterwards you don't need to interact with the crate or the variable
//! `ALLOCATOR` anymore. Now you can just `use alloc::vec::Vec` or even
//! `use alloc::collections::HashMap`, i.e. every fancy collection which is
//! normally provided by the `std`.
//!
//! The minimal buffer size is `16` (one prologue word, one epilogue word and
//! room for a single 16-byte heap extension would still fail; in practice
//! give the allocator several multiples of 4096 bytes, since the heap grows
//! in 4096-byte chunks). Adjust the size as necessary, e.g. by doing a worst
//! case calculation and potentially adding some backup space of 10% (for
//! example).
//!
//! Note to users with things like `MPU`s, `MMU`s, etc.: your device might
//! support things like memory remapping or memory protection with setting
//! read/write/execution rights. This crate _doesn't use_ those features at all!
//! If that is desired, you should take the address of the buffer and use that
//! along with the known size `N` to protect the heap memory. To users with a
//! fully-working MMU: it is recommended, that you use an allocator, that
//! actually supports paging, etc. This crate might still be helpful, e.g.
//! before setting up the MMU.
//!
//! # Implementation
//! Every block in the heap is prefixed by an 8-byte boundary word encoding
//! its size and three flags (itself allocated, left neighbor allocated, left
//! neighbor minimum-sized); free, non-minimum-sized blocks additionally carry
//! an identical word as a footer, which is what lets [`prev`](engine::block::prev)
//! walk backwards without a separate backwards-pointer per block:
//! ```text
//! [header][ ... payload or prev/next links ... ][footer, if free and > 16B]
//! ```
//! Free blocks of exactly 16 bytes have no room for a footer or a doubly-linked
//! pair, so they live on their own singly-linked mini-list instead of a
//! segregated bucket; every other free size class is tracked by 14 buckets
//! covering `[16,32) [32,64) ... [32768,∞)`, each a LIFO doubly-linked list.
//!
//! 1. A fresh allocator has an empty heap: nothing committed yet.
//! 2. The first allocation triggers [`Engine::initialize`](engine::Engine::initialize):
//!    a prologue and epilogue sentinel are written, and the heap is grown by
//!    one 4096-byte chunk, which becomes the first free block.
//! 3. [`find_fit`](engine::placement::find_fit) looks for a block at least big
//!    enough; if none exists, the heap grows by another chunk (or exactly the
//!    requested size, if larger than a chunk).
//! 4. The found block is marked allocated and, if there's at least 16 bytes
//!    left over, split: the remainder becomes a new free block, immediately
//!    coalesced with its own right neighbor if that is free too.
//! 5. Freeing a block marks it free and immediately coalesces it with any
//!    free neighbor on either side, so "two adjacent free blocks" never
//!    persists across an API call.
//!
//! Debug builds additionally run [`Engine::check_heap`](engine::Engine::check_heap)
//! after every mutating call, walking the whole heap and every free list to
//! confirm the invariants above still hold; release builds skip this.
//!
//! [alloc]: https://doc.rust-lang.org/alloc/index.html
#![no_std]

mod engine;
mod provider;

pub use provider::{MemoryProvider, StaticArena};

use core::alloc::{GlobalAlloc, Layout};
use engine::Engine;
use spin::Mutex;

/// The memory allocator for embedded systems.
///
/// This is the core type of this crate: it is an allocator with a predefined
/// heap size. Therefore the heap memory usage is statically limited to an upper
/// value, which also helps to prevent issues with heap/stack-smashes, as the
/// heap is counted to the static memory (e.g. `.data`/`.bss`-sections). Such a
/// smash might still happen though, if the stack pointer grows into the heap,
/// but the heap cannot grow into the stack pointer.
///
/// Its usage is simple: just copy and paste the following in the binary crate
/// you're developing. The memory size of the heap is `65536` or 64K in this
/// example. Adjust that value to your needs.
/// ```no_run
/// #[global_allocator]
/// static ALLOCATOR: segalloc::Allocator<65536> = segalloc::Allocator::new();
/// ```
/// Also please refer to the [crate-level](crate)-documentation for
/// recommendations on the buffer size and general usage.
///
/// Concurrent access from multiple threads (or interrupt contexts, on a
/// single core) is safe: the engine is held behind a `spin`-based spinlock,
/// appropriate for a `#![no_std]` target where a blocking OS mutex isn't
/// available.
pub struct Allocator<const N: usize>(Mutex<Engine<StaticArena<N>>>);
impl<const N: usize> Allocator<N> {
    /// Create a new [`Allocator`].
    ///
    /// This function is a `const fn`, therefore you can call it directly when
    /// creating the allocator.
    ///
    /// Please see the [crate-level](crate)-documentation for recommendations on
    /// the buffer size and general usage.
    ///
    /// # Panics
    /// This function will panic, if the supplied buffer size, i.e. `N` is less
    /// than `16` or not divisible by `16`.
    #[must_use = "assign the allocator to a static variable and apply the `#[global_allocator]`-attribute to make it the global allocator"]
    pub const fn new() -> Self {
        assert!(N >= 16, "too small heap memory: minimum size is 16");
        assert!(N % 16 == 0, "memory size has to be divisible by 16");
        Self(Mutex::new(Engine::new(StaticArena::new())))
    }
}
unsafe impl<const N: usize> GlobalAlloc for Allocator<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > 16 {
            // the block model only guarantees 16-byte payload alignment
            return core::ptr::null_mut();
        }
        let mut engine = self.0.lock();
        match engine.allocate(layout.size()) {
            Some(addr) => engine.provider_mut().as_mut_ptr(addr),
            None => core::ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut engine = self.0.lock();
        engine.free(ptr as usize);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > 16 {
            return core::ptr::null_mut();
        }
        let mut engine = self.0.lock();
        match engine.reallocate(ptr as usize, new_size) {
            Some(addr) => engine.provider_mut().as_mut_ptr(addr),
            None => core::ptr::null_mut(),
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > 16 {
            return core::ptr::null_mut();
        }
        let mut engine = self.0.lock();
        match engine.zeroed_allocate(1, layout.size()) {
            Some(addr) => engine.provider_mut().as_mut_ptr(addr),
            None => core::ptr::null_mut(),
        }
    }
}
