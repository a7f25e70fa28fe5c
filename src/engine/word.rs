//! The metadata codec: packing and unpacking of boundary words.
//!
//! A boundary word is a single 8-byte value that serves as a block's header,
//! its footer (when present), the heap's prologue, or the heap's epilogue.
//! The low 4 bits carry flags, the remaining bits carry the block size (which
//! is always a multiple of 16, so those low bits are free to reuse).

/// Bit 0: the block this word describes is currently allocated.
const ALLOC_BIT: u64 = 1 << 0;
/// Bit 1: the block immediately to the left is currently allocated.
const PREV_ALLOC_BIT: u64 = 1 << 1;
/// Bit 2: the block immediately to the left has the minimum size (16 bytes).
const PREV_MINI_BIT: u64 = 1 << 2;
/// Mask covering all four low flag bits (bit 3 is reserved and always zero).
const FLAG_MASK: u64 = 0xF;

/// Pack a block's metadata into a single boundary word.
///
/// `size` must already be a multiple of 16; this is a caller obligation, not
/// checked here (the codec is a pure, trusted-input transform).
pub const fn pack(size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) -> u64 {
    debug_assert!(size as u64 & FLAG_MASK == 0, "size must be 16-aligned");
    size as u64
        | (alloc as u64) * ALLOC_BIT
        | (prev_alloc as u64) * PREV_ALLOC_BIT
        | (prev_mini as u64) * PREV_MINI_BIT
}

/// Unpack a boundary word into `(size, alloc, prev_alloc, prev_mini)`.
pub const fn unpack(word: u64) -> (usize, bool, bool, bool) {
    let size = (word & !FLAG_MASK) as usize;
    let alloc = word & ALLOC_BIT != 0;
    let prev_alloc = word & PREV_ALLOC_BIT != 0;
    let prev_mini = word & PREV_MINI_BIT != 0;
    (size, alloc, prev_alloc, prev_mini)
}

/// Rewrite only the `prev_alloc`/`prev_mini` bits of an existing word.
///
/// This always reconstructs the whole word from a freshly unpacked `size`
/// and `alloc`, rather than OR-ing the new bits onto the old word: an OR
/// would only be safe if the bits were already known to be clear, which
/// doesn't generally hold (a neighbor can flip from mini to non-mini and
/// back across its lifetime).
pub const fn with_prev_flags(word: u64, prev_alloc: bool, prev_mini: bool) -> u64 {
    let (size, alloc, _, _) = unpack(word);
    pack(size, alloc, prev_alloc, prev_mini)
}
