//! The size-class index: maps a block size to one of the 14 segregated
//! free-list buckets.
//!
//! Mini blocks (size exactly [`MIN_BLOCK`](super::block::MIN_BLOCK)) never
//! go through [`class`]; callers special-case them and use the dedicated
//! mini-list instead, since a 16-byte block can't hold the doubly-linked
//! `prev`/`next` pair a segregated bucket entry needs.

/// Number of segregated-list buckets.
pub const NUM_CLASSES: usize = 14;

/// Exclusive upper bound of buckets `0..=12`; bucket 13 catches everything
/// `>= 32768`.
const UPPER_BOUNDS: [usize; NUM_CLASSES - 1] = [
    32, 64, 128, 256, 512, 1024, 2048, 3072, 4096, 6656, 8192, 16384, 32768,
];

/// Map `size` (which must be `>= 16`) to its bucket index in `0..NUM_CLASSES`.
pub fn class(size: usize) -> usize {
    debug_assert!(size >= 16, "class() is undefined below the minimum block size");
    UPPER_BOUNDS
        .iter()
        .position(|&bound| size < bound)
        .unwrap_or(NUM_CLASSES - 1)
}
