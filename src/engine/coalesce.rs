//! The coalescer: immediate boundary-tag coalescing of a just-freed (or
//! just-extended) block with any free neighbors.
//!
//! This is the part of the engine that keeps "no two adjacent blocks are
//! both free" an invariant rather than a best-effort cleanup pass: every
//! free or extend goes through here before returning.

use super::block::{self, WORD};
use super::free_list::FreeLists;
use super::word::unpack;
use crate::provider::MemoryProvider;

/// Coalesce the block at `addr` (already written as free, with its own
/// correct `prev_alloc`/`prev_mini` bits) with any free neighbors, update
/// the free lists accordingly, and return the address of the resulting
/// (possibly merged) free block.
///
/// `addr` must **not** already be registered in `lists`: the caller is
/// expected to have just freed or extended it, not yet inserted it.
pub fn coalesce<P: MemoryProvider>(lists: &mut FreeLists, provider: &mut P, addr: usize) -> usize {
    let (size, _alloc, prev_alloc, _prev_mini) = unpack(unsafe { provider.read_word(addr) });
    let next_addr = addr + size;
    let (next_size, next_alloc, _, _) = unpack(unsafe { provider.read_word(next_addr) });

    match (prev_alloc, next_alloc) {
        (true, true) => {
            // Case 1: both neighbors allocated. The block stands alone;
            // only the right neighbor's prev-flags need fixing up.
            block::set_prev_flags(provider, next_addr, false, size == block::MIN_BLOCK);
            lists.insert_free(provider, addr, size);
            addr
        }
        (false, true) => {
            // Case 2: merge with the free left neighbor.
            let prev_addr = block::prev(provider, addr).expect("prev_alloc=false implies a left neighbor");
            let (prev_size, _, prev_prev_alloc, prev_prev_mini) = unpack(unsafe { provider.read_word(prev_addr) });
            lists.remove_free(provider, prev_addr, prev_size);
            let merged_size = prev_size + size;
            block::write_free(provider, prev_addr, merged_size, prev_prev_alloc, prev_prev_mini);
            block::set_prev_flags(provider, next_addr, false, false);
            lists.insert_free(provider, prev_addr, merged_size);
            prev_addr
        }
        (true, false) => {
            // Case 3: merge with the free right neighbor.
            lists.remove_free(provider, next_addr, next_size);
            let merged_size = size + next_size;
            block::write_free(provider, addr, merged_size, prev_alloc, false);
            let next_next = next_addr + next_size;
            block::set_prev_flags(provider, next_next, false, false);
            lists.insert_free(provider, addr, merged_size);
            addr
        }
        (false, false) => {
            // Case 4: merge with both neighbors.
            let prev_addr = block::prev(provider, addr).expect("prev_alloc=false implies a left neighbor");
            let (prev_size, _, prev_prev_alloc, prev_prev_mini) = unpack(unsafe { provider.read_word(prev_addr) });
            lists.remove_free(provider, prev_addr, prev_size);
            lists.remove_free(provider, next_addr, next_size);
            let merged_size = prev_size + size + next_size;
            block::write_free(provider, prev_addr, merged_size, prev_prev_alloc, prev_prev_mini);
            let next_next = next_addr + next_size;
            block::set_prev_flags(provider, next_next, false, false);
            lists.insert_free(provider, prev_addr, merged_size);
            prev_addr
        }
    }
}
