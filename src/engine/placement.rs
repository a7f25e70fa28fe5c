//! The placement engine: turning a request size into a concrete block,
//! by finding a fit, splitting it down to size, or growing the heap when
//! nothing fits.

use super::block::{self, round_up_align, MIN_BLOCK, WORD};
use super::coalesce::coalesce;
use super::free_list::FreeLists;
use super::size_class::{class, NUM_CLASSES};
use super::word::unpack;
use crate::provider::MemoryProvider;

/// The default heap growth increment.
pub const CHUNK: usize = 4096;

/// Normalize a user-requested payload size into an aligned block size:
/// room for the header plus the payload, rounded up to 16, with a 16-byte
/// floor (the mini-block size).
pub fn adjust(request: usize) -> usize {
    round_up_align(request + WORD).max(MIN_BLOCK)
}

/// Find a free block of at least `asize` bytes, without removing it from
/// its list. Mini requests are served from the mini-list first, since that
/// avoids carving up a larger block; if the mini-list is empty, a mini
/// request falls back to the same segregated-bucket scan larger requests
/// use (any bucket block is at least 32 bytes, so splitting 16 bytes off it
/// always leaves a remainder of at least 16 bytes, never an under-sized
/// one). Larger requests scan the segregated buckets from `class(asize)`
/// upward, using the bounded best-fit heuristic within the first bucket
/// that contains a fit.
pub fn find_fit<P: MemoryProvider>(lists: &FreeLists, provider: &P, asize: usize) -> Option<usize> {
    if asize == MIN_BLOCK {
        if let Some(head) = lists.mini_head() {
            return Some(head);
        }
    }

    for idx in class(asize)..NUM_CLASSES {
        if let Some(addr) = scan_bucket_best_fit(lists, provider, idx, asize) {
            return Some(addr);
        }
    }
    None
}

/// Scan one bucket's LIFO list, tracking the smallest fitting block seen so
/// far, and stop as soon as a larger fitting block follows the current
/// best. This is the "bounded best-fit" heuristic: close to first-fit in
/// practice, but with a cheap local improvement.
fn scan_bucket_best_fit<P: MemoryProvider>(
    lists: &FreeLists,
    provider: &P,
    bucket: usize,
    asize: usize,
) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None; // (addr, size)
    let mut node = lists.bucket_head(bucket);
    while let Some(addr) = node {
        let size = block::size_of_block(provider, addr);
        if size >= asize {
            match best {
                None => best = Some((addr, size)),
                Some((_, best_size)) if size < best_size => best = Some((addr, size)),
                Some((_, best_size)) if size > best_size => break,
                Some(_) => {}
            }
        }
        node = lists.next_of(provider, addr, size);
    }
    best.map(|(addr, _)| addr)
}

/// Grow the heap by (at least) `n` bytes via `sbrk`, turning the newly
/// committed memory into a free block appended where the old epilogue
/// used to be, writing a fresh epilogue at the new high end, and
/// immediately coalescing the new block with its left neighbor if that is
/// free. Returns the (possibly merged) free block's address, or `None` if
/// the provider has no more capacity.
pub fn extend_heap<P: MemoryProvider>(lists: &mut FreeLists, provider: &mut P, n: usize) -> Option<usize> {
    let n = round_up_align(n.max(MIN_BLOCK));

    let old_epilogue_addr = provider.heap_hi() - WORD;
    // SAFETY: the epilogue always occupies the last word of the committed
    // heap once `initialize` has run.
    let old_epilogue = unsafe { provider.read_word(old_epilogue_addr) };
    let (_, _, prev_alloc, prev_mini) = unpack(old_epilogue);

    provider.sbrk(n)?;

    let new_block_addr = old_epilogue_addr;
    let new_block_size = n;
    block::write_free(provider, new_block_addr, new_block_size, prev_alloc, prev_mini);

    let new_epilogue_addr = new_block_addr + new_block_size;
    block::write_alloc(provider, new_epilogue_addr, 0, false, new_block_size == MIN_BLOCK);

    Some(coalesce(lists, provider, new_block_addr))
}

/// Carve `asize` bytes off the front of the currently-allocated block at
/// `addr` (which must have size `>= asize`), if the remainder would be at
/// least one minimum block. Returns the address of the new free remainder
/// block, already linked to its right neighbor but **not yet** inserted
/// into any free list (the caller is expected to coalesce it, which also
/// performs the insertion).
pub fn split_block<P: MemoryProvider>(provider: &mut P, addr: usize, asize: usize) -> Option<usize> {
    let (size, alloc, prev_alloc, prev_mini) = unpack(unsafe { provider.read_word(addr) });
    debug_assert!(alloc, "split_block requires an allocated block");
    debug_assert!(size >= asize);

    let remainder_size = size - asize;
    if remainder_size < MIN_BLOCK {
        return None;
    }

    block::write_alloc(provider, addr, asize, prev_alloc, prev_mini);

    let remainder_addr = addr + asize;
    block::write_free(provider, remainder_addr, remainder_size, true, asize == MIN_BLOCK);

    let old_next = remainder_addr + remainder_size; // == addr + size, unchanged by the resize
    block::set_prev_flags(provider, old_next, false, remainder_size == MIN_BLOCK);

    Some(remainder_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::word::pack;
    use crate::provider::StaticArena;

    fn fresh_heap<const N: usize>(arena: &mut StaticArena<N>) {
        arena.sbrk(16);
        let lo = arena.heap_lo();
        unsafe {
            arena.write_word(lo, pack(0, true, true, false)); // prologue
            arena.write_word(lo + WORD, pack(0, true, true, false)); // epilogue
        }
    }

    #[test]
    fn adjust_examples() {
        assert_eq!(adjust(1), 16);
        assert_eq!(adjust(8), 16);
        assert_eq!(adjust(9), 32);
        assert_eq!(adjust(24), 32);
        assert_eq!(adjust(4096), 4112);
    }

    #[test]
    fn extend_heap_creates_first_free_block() {
        let mut arena = StaticArena::<4224>::new();
        fresh_heap(&mut arena);
        let mut lists = FreeLists::new();
        let block = extend_heap(&mut lists, &mut arena, CHUNK).unwrap();
        let lo = arena.heap_lo();
        assert_eq!(block, lo + WORD);
        let (size, alloc, prev_alloc, _) = unpack(unsafe { arena.read_word(block) });
        assert_eq!(size, CHUNK);
        assert!(!alloc);
        assert!(prev_alloc); // left neighbor is the prologue: conceptually allocated
        assert_eq!(lists.bucket_head(class(CHUNK)), Some(block));
    }

    #[test]
    fn extend_heap_fails_past_capacity() {
        let mut arena = StaticArena::<16>::new();
        fresh_heap(&mut arena);
        let mut lists = FreeLists::new();
        assert_eq!(extend_heap(&mut lists, &mut arena, CHUNK), None);
    }

    #[test]
    fn split_leaves_remainder_and_propagates_flags() {
        let mut arena = StaticArena::<128>::new();
        arena.sbrk(128);
        let lo = arena.heap_lo();
        // a single 64-byte allocated block, then the epilogue
        unsafe {
            arena.write_word(lo, pack(64, true, true, false));
            arena.write_word(lo + 64, pack(0, true, true, false));
        }
        let remainder = split_block(&mut arena, lo, 32).unwrap();
        assert_eq!(remainder, lo + 32);
        let (rsize, ralloc, rprev_alloc, rprev_mini) = unpack(unsafe { arena.read_word(remainder) });
        assert_eq!(rsize, 32);
        assert!(!ralloc);
        assert!(rprev_alloc);
        assert!(!rprev_mini);

        let (_, _, epi_prev_alloc, _) = unpack(unsafe { arena.read_word(lo + 64) });
        assert!(!epi_prev_alloc);
    }

    #[test]
    fn split_refuses_when_remainder_too_small() {
        let mut arena = StaticArena::<128>::new();
        arena.sbrk(128);
        let lo = arena.heap_lo();
        unsafe {
            arena.write_word(lo, pack(32, true, true, false));
            arena.write_word(lo + 32, pack(0, true, true, false)); // epilogue
        }
        assert_eq!(split_block(&mut arena, lo, 32), None);
        // 32 - 16 = 16 would fit another mini block, so that one *does* split
        assert_eq!(split_block(&mut arena, lo, 16), Some(lo + 16));
    }
}
