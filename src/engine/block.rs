//! The block navigator: conversions between payload pointers, block heads
//! and their left/right neighbors.

use super::word::{pack, unpack, with_prev_flags};
use crate::provider::MemoryProvider;

/// The size of a boundary word (header, footer, prologue or epilogue).
pub const WORD: usize = 8;
/// Required payload/block alignment.
pub const ALIGN: usize = 16;
/// The smallest possible block: a header plus 8 bytes of payload/link.
pub const MIN_BLOCK: usize = 16;

/// Round `n` up to the next multiple of `ALIGN`.
pub const fn round_up_align(n: usize) -> usize {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

/// Read the size of the block whose header is at `addr`.
pub fn size_of_block<P: MemoryProvider>(provider: &P, addr: usize) -> usize {
    // SAFETY: caller guarantees `addr` is a valid header address.
    let word = unsafe { provider.read_word(addr) };
    unpack(word).0
}

/// The address of the block immediately to the right of the block at `addr`.
///
/// Undefined (but not unsafe to call) on the epilogue, since the epilogue
/// has size 0 and has no right neighbor of its own.
pub fn next<P: MemoryProvider>(provider: &P, addr: usize) -> usize {
    addr + size_of_block(provider, addr)
}

/// The address of the block immediately to the left of the block at `addr`,
/// or `None` if `addr` is the first real block (its left neighbor is the
/// prologue).
pub fn prev<P: MemoryProvider>(provider: &P, addr: usize) -> Option<usize> {
    // SAFETY: `addr` is a valid header address (caller obligation).
    let (_, _, _, prev_mini) = unpack(unsafe { provider.read_word(addr) });
    if prev_mini {
        Some(addr - MIN_BLOCK)
    } else {
        // SAFETY: a non-mini left neighbor, if any, always has a footer at
        // `addr - WORD`; if there is no left neighbor, that word is the
        // heap's zero-sized prologue sentinel.
        let footer = unsafe { provider.read_word(addr - WORD) };
        let (size, _, _, _) = unpack(footer);
        if size == 0 {
            None
        } else {
            Some(addr - size)
        }
    }
}

/// The payload address for a block whose header is at `addr`.
pub const fn payload_of(addr: usize) -> usize {
    addr + WORD
}

/// The header address for a block whose payload starts at `addr`.
pub const fn block_of(payload: usize) -> usize {
    payload - WORD
}

/// Write a block's header (and, for non-mini blocks, its footer) marking it
/// **free** with the given `size` and left-neighbor flags.
pub fn write_free<P: MemoryProvider>(
    provider: &mut P,
    addr: usize,
    size: usize,
    prev_alloc: bool,
    prev_mini: bool,
) {
    let word = pack(size, false, prev_alloc, prev_mini);
    // SAFETY: `addr` is a valid header address for a block of `size` bytes,
    // entirely within the committed heap (caller obligation).
    unsafe { provider.write_word(addr, word) };
    if size != MIN_BLOCK {
        // SAFETY: the footer lies at `addr + size - WORD`, within the same
        // block.
        unsafe { provider.write_word(addr + size - WORD, word) };
    }
}

/// Write a block's header marking it **allocated** with the given `size`
/// and left-neighbor flags. Allocated blocks never carry a footer.
pub fn write_alloc<P: MemoryProvider>(
    provider: &mut P,
    addr: usize,
    size: usize,
    prev_alloc: bool,
    prev_mini: bool,
) {
    let word = pack(size, true, prev_alloc, prev_mini);
    // SAFETY: see `write_free`.
    unsafe { provider.write_word(addr, word) };
}

/// Update only the `prev_alloc`/`prev_mini` bits of the block at `addr`,
/// preserving its own `size`/`alloc`. If the block is a free non-mini
/// block, its footer is rewritten too, to keep header and footer identical.
pub fn set_prev_flags<P: MemoryProvider>(provider: &mut P, addr: usize, prev_alloc: bool, prev_mini: bool) {
    // SAFETY: `addr` is a valid header address (caller obligation).
    let old = unsafe { provider.read_word(addr) };
    let new = with_prev_flags(old, prev_alloc, prev_mini);
    unsafe { provider.write_word(addr, new) };

    let (size, alloc, _, _) = unpack(new);
    if !alloc && size != 0 && size != MIN_BLOCK {
        // SAFETY: free non-mini block, footer lies within the same block.
        unsafe { provider.write_word(addr + size - WORD, new) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::word::pack;
    use crate::provider::StaticArena;

    #[test]
    fn round_up_align_examples() {
        assert_eq!(round_up_align(1), 16);
        assert_eq!(round_up_align(16), 16);
        assert_eq!(round_up_align(17), 32);
        assert_eq!(round_up_align(32), 32);
    }

    #[test]
    fn next_adds_size() {
        let mut arena = StaticArena::<64>::new();
        arena.sbrk(64);
        let lo = arena.heap_lo();
        unsafe { arena.write_word(lo, pack(32, true, true, false)) };
        assert_eq!(next(&arena, lo), lo + 32);
    }

    #[test]
    fn prev_via_footer() {
        let mut arena = StaticArena::<64>::new();
        arena.sbrk(64);
        let lo = arena.heap_lo();
        unsafe {
            // a 32-byte free block starting at `lo`
            arena.write_word(lo, pack(32, false, true, false));
            arena.write_word(lo + 32 - 8, pack(32, false, true, false));
            // a block after it, prev_mini=false so prev() reads the footer
            arena.write_word(lo + 32, pack(16, true, false, false));
        }
        assert_eq!(prev(&arena, lo + 32), Some(lo));
    }

    #[test]
    fn prev_via_mini_offset() {
        let mut arena = StaticArena::<64>::new();
        arena.sbrk(64);
        let lo = arena.heap_lo();
        unsafe {
            arena.write_word(lo, pack(16, true, true, false));
            arena.write_word(lo + 16, pack(16, true, false, true));
        }
        assert_eq!(prev(&arena, lo + 16), Some(lo));
    }

    #[test]
    fn prev_none_at_prologue() {
        let mut arena = StaticArena::<64>::new();
        arena.sbrk(64);
        let lo = arena.heap_lo();
        unsafe {
            arena.write_word(lo, pack(0, true, true, false)); // prologue
            arena.write_word(lo + 8, pack(16, true, true, false));
        }
        assert_eq!(prev(&arena, lo + 8), None);
    }

    #[test]
    fn payload_and_block_roundtrip() {
        assert_eq!(block_of(payload_of(128)), 128);
    }
}
