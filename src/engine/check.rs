//! The invariant checker: a whole-heap and per-list consistency predicate.
//!
//! This is deliberately expensive (it walks every block and every free
//! list) and is meant for tests and `debug_assertions` builds, not for the
//! hot allocate/free path in release builds.

use super::block::{self, MIN_BLOCK, WORD};
use super::free_list::FreeLists;
use super::size_class::{class, NUM_CLASSES};
use super::word::unpack;
use crate::provider::MemoryProvider;

/// Walk the whole heap and every free list, verifying every invariant
/// listed in the data model. Returns `false` at the first violation found.
pub fn check_heap<P: MemoryProvider>(lists: &FreeLists, provider: &P) -> bool {
    implicit_sweep(provider) && free_list_sweep(lists, provider)
}

/// Walk the heap block-by-block from the first real block to the epilogue.
fn implicit_sweep<P: MemoryProvider>(provider: &P) -> bool {
    let lo = provider.heap_lo();
    let hi = provider.heap_hi();
    if hi < lo + 2 * WORD {
        // not even room for a prologue and an epilogue
        return false;
    }

    // SAFETY: the prologue always occupies the first word of the heap.
    let prologue = unsafe { provider.read_word(lo) };
    let (prologue_size, prologue_alloc, _, _) = unpack(prologue);
    if prologue_size != 0 || !prologue_alloc {
        return false;
    }

    let mut addr = lo + WORD;
    let mut prev_was_free = false;
    // Flags the final real block (if any) leaves behind for the epilogue to
    // mirror; defaults to "no real block yet" (treated as allocated).
    let mut last_alloc = true;
    let mut last_mini = false;
    while addr < hi - WORD {
        if addr % block::ALIGN as usize != 8 || block::payload_of(addr) % block::ALIGN != 0 {
            return false;
        }

        // SAFETY: `addr` is within `[lo, hi)` per the loop condition.
        let word = unsafe { provider.read_word(addr) };
        let (size, alloc, _, _) = unpack(word);
        if size < MIN_BLOCK || size % block::ALIGN != 0 {
            return false;
        }
        if addr + size > hi {
            return false;
        }

        if !alloc {
            if prev_was_free {
                return false; // two adjacent free blocks
            }
            if size != MIN_BLOCK {
                // SAFETY: the footer lies within this block.
                let footer = unsafe { provider.read_word(addr + size - WORD) };
                if footer != word {
                    return false;
                }
            }
        }

        // Check the right-neighbor flag propagation invariant, as long as
        // there is a real right neighbor to check it against (not the
        // epilogue, whose own flags are checked separately below).
        let next_addr = addr + size;
        if next_addr < hi - WORD {
            // SAFETY: `next_addr` is within the heap per the check above.
            let next_word = unsafe { provider.read_word(next_addr) };
            let (_, _, next_prev_alloc, next_prev_mini) = unpack(next_word);
            if next_prev_alloc != alloc || next_prev_mini != (size == MIN_BLOCK) {
                return false;
            }
        }

        prev_was_free = !alloc;
        last_alloc = alloc;
        last_mini = size == MIN_BLOCK;
        addr = next_addr;
    }
    if addr != hi - WORD {
        return false; // blocks didn't tile the heap exactly up to the epilogue
    }

    // SAFETY: `addr` is the epilogue's address, within the heap.
    let epilogue = unsafe { provider.read_word(addr) };
    let (epilogue_size, epilogue_alloc, epilogue_prev_alloc, epilogue_prev_mini) = unpack(epilogue);
    if epilogue_size != 0 || !epilogue_alloc {
        return false;
    }
    epilogue_prev_alloc == last_alloc && epilogue_prev_mini == last_mini
}

/// Walk every segregated bucket and the mini-list, verifying membership
/// and doubly-linked consistency.
fn free_list_sweep<P: MemoryProvider>(lists: &FreeLists, provider: &P) -> bool {
    let lo = provider.heap_lo();
    let hi = provider.heap_hi();

    for idx in 0..NUM_CLASSES {
        let mut node = lists.bucket_head(idx);
        let mut prev: Option<usize> = None;
        while let Some(addr) = node {
            if addr < lo || addr >= hi {
                return false;
            }
            let size = block::size_of_block(provider, addr);
            if class(size) != idx {
                return false;
            }
            if lists.prev_of(provider, addr) != prev {
                return false;
            }
            prev = Some(addr);
            node = lists.next_of(provider, addr, size);
        }
    }

    let mut node = lists.mini_head();
    while let Some(addr) = node {
        if addr < lo || addr >= hi {
            return false;
        }
        let size = block::size_of_block(provider, addr);
        if size != MIN_BLOCK {
            return false;
        }
        node = lists.next_of(provider, addr, size);
    }

    true
}
