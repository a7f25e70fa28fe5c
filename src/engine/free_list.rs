//! The free-list set: 14 doubly-linked segregated buckets plus a dedicated
//! singly-linked mini-list.
//!
//! Bucket and mini-list *heads* are ordinary out-of-band fields on
//! [`FreeLists`] (never written into the heap). The intra-list `prev`/`next`
//! links of a free block, however, live in-band, inside the block's own
//! body: a non-mini free block stores its `prev` link right after the
//! header (`addr + WORD`) and its `next` link after that (`addr + 2*WORD`);
//! a mini block has room only for a single `next` link (`addr + WORD`). `0`
//! is used as the in-band "no link" sentinel, since the backing store is a
//! real allocation and never starts at address zero.

use super::block::{MIN_BLOCK, WORD};
use super::size_class::{class, NUM_CLASSES};
use crate::provider::MemoryProvider;

/// Offset of a non-mini free block's `prev` link, relative to its header.
const PREV_LINK_OFFSET: usize = WORD;
/// Offset of a non-mini free block's `next` link, relative to its header.
const NEXT_LINK_OFFSET: usize = 2 * WORD;
/// Offset of a mini free block's (only) `next` link, relative to its header.
const MINI_NEXT_OFFSET: usize = WORD;

fn read_link<P: MemoryProvider>(provider: &P, addr: usize) -> Option<usize> {
    // SAFETY: `addr` is a link-word address inside a live free block.
    let raw = unsafe { provider.read_word(addr) };
    if raw == 0 {
        None
    } else {
        Some(raw as usize)
    }
}

fn write_link<P: MemoryProvider>(provider: &mut P, addr: usize, value: Option<usize>) {
    let raw = value.map_or(0, |a| a as u64);
    // SAFETY: `addr` is a link-word address inside a live free block.
    unsafe { provider.write_word(addr, raw) };
}

/// The full set of segregated free lists plus the mini-list.
pub struct FreeLists {
    seg: [Option<usize>; NUM_CLASSES],
    mini: Option<usize>,
}

impl FreeLists {
    /// An empty free-list set (no free blocks registered yet).
    pub const fn new() -> Self {
        Self {
            seg: [None; NUM_CLASSES],
            mini: None,
        }
    }

    /// The head of segregated bucket `idx`.
    pub fn bucket_head(&self, idx: usize) -> Option<usize> {
        self.seg[idx]
    }

    /// The head of the mini-list.
    pub fn mini_head(&self) -> Option<usize> {
        self.mini
    }

    /// The `next` link of the free block at `addr`, given its `size`.
    pub fn next_of<P: MemoryProvider>(&self, provider: &P, addr: usize, size: usize) -> Option<usize> {
        if size == MIN_BLOCK {
            read_link(provider, addr + MINI_NEXT_OFFSET)
        } else {
            read_link(provider, addr + NEXT_LINK_OFFSET)
        }
    }

    /// The `prev` link of a non-mini free block at `addr`.
    pub fn prev_of<P: MemoryProvider>(&self, provider: &P, addr: usize) -> Option<usize> {
        read_link(provider, addr + PREV_LINK_OFFSET)
    }

    /// Insert a just-freed block of the given `size` at `addr` into the
    /// appropriate list (LIFO push at the head).
    pub fn insert_free<P: MemoryProvider>(&mut self, provider: &mut P, addr: usize, size: usize) {
        if size == MIN_BLOCK {
            write_link(provider, addr + MINI_NEXT_OFFSET, self.mini);
            self.mini = Some(addr);
            return;
        }

        let idx = class(size);
        let old_head = self.seg[idx];
        write_link(provider, addr + PREV_LINK_OFFSET, None);
        write_link(provider, addr + NEXT_LINK_OFFSET, old_head);
        if let Some(head) = old_head {
            write_link(provider, head + PREV_LINK_OFFSET, Some(addr));
        }
        self.seg[idx] = Some(addr);
    }

    /// Remove the free block of the given `size` at `addr` from its list.
    pub fn remove_free<P: MemoryProvider>(&mut self, provider: &mut P, addr: usize, size: usize) {
        if size == MIN_BLOCK {
            self.remove_mini(provider, addr);
            return;
        }

        let idx = class(size);
        let prev = read_link(provider, addr + PREV_LINK_OFFSET);
        let next = read_link(provider, addr + NEXT_LINK_OFFSET);
        match prev {
            Some(p) => write_link(provider, p + NEXT_LINK_OFFSET, next),
            None => self.seg[idx] = next,
        }
        if let Some(n) = next {
            write_link(provider, n + PREV_LINK_OFFSET, prev);
        }
    }

    fn remove_mini<P: MemoryProvider>(&mut self, provider: &mut P, addr: usize) {
        if self.mini == Some(addr) {
            self.mini = read_link(provider, addr + MINI_NEXT_OFFSET);
            return;
        }
        let mut node = self.mini;
        while let Some(current) = node {
            let next = read_link(provider, current + MINI_NEXT_OFFSET);
            if next == Some(addr) {
                let addr_next = read_link(provider, addr + MINI_NEXT_OFFSET);
                write_link(provider, current + MINI_NEXT_OFFSET, addr_next);
                return;
            }
            node = next;
        }
        debug_assert!(false, "remove_mini: block not found in mini-list");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::word::pack;
    use crate::provider::StaticArena;

    fn write_header<P: MemoryProvider>(provider: &mut P, addr: usize, size: usize) {
        unsafe { provider.write_word(addr, pack(size, false, true, false)) };
    }

    #[test]
    fn mini_lifo_order() {
        let mut arena = StaticArena::<128>::new();
        arena.sbrk(128);
        let lo = arena.heap_lo();
        let mut lists = FreeLists::new();
        for i in 0..3 {
            let addr = lo + i * 16;
            write_header(&mut arena, addr, 16);
            lists.insert_free(&mut arena, addr, 16);
        }
        // last inserted is first out
        assert_eq!(lists.mini_head(), Some(lo + 32));
        lists.remove_free(&mut arena, lo + 32, 16);
        assert_eq!(lists.mini_head(), Some(lo + 16));
        lists.remove_free(&mut arena, lo + 16, 16);
        assert_eq!(lists.mini_head(), Some(lo));
        lists.remove_free(&mut arena, lo, 16);
        assert_eq!(lists.mini_head(), None);
    }

    #[test]
    fn mini_remove_from_middle() {
        let mut arena = StaticArena::<128>::new();
        arena.sbrk(128);
        let lo = arena.heap_lo();
        let mut lists = FreeLists::new();
        for i in 0..3 {
            let addr = lo + i * 16;
            write_header(&mut arena, addr, 16);
            lists.insert_free(&mut arena, addr, 16);
        }
        // list is (head) lo+32 -> lo+16 -> lo -> None
        lists.remove_free(&mut arena, lo + 16, 16);
        assert_eq!(lists.mini_head(), Some(lo + 32));
        assert_eq!(lists.next_of(&arena, lo + 32, 16), Some(lo));
    }

    #[test]
    fn seg_bucket_doubly_linked() {
        let mut arena = StaticArena::<256>::new();
        arena.sbrk(256);
        let lo = arena.heap_lo();
        let mut lists = FreeLists::new();
        // three 32-byte blocks -> bucket 1
        for i in 0..3 {
            let addr = lo + i * 32;
            write_header(&mut arena, addr, 32);
            lists.insert_free(&mut arena, addr, 32);
        }
        assert_eq!(lists.bucket_head(1), Some(lo + 64));
        assert_eq!(lists.prev_of(&arena, lo + 32), Some(lo + 64));
        assert_eq!(lists.next_of(&arena, lo + 64, 32), Some(lo + 32));

        // remove the middle one
        lists.remove_free(&mut arena, lo + 32, 32);
        assert_eq!(lists.next_of(&arena, lo + 64, 32), Some(lo));
        assert_eq!(lists.prev_of(&arena, lo), Some(lo + 64));
    }

    #[test]
    fn remove_head_updates_bucket_head() {
        let mut arena = StaticArena::<128>::new();
        arena.sbrk(128);
        let lo = arena.heap_lo();
        let mut lists = FreeLists::new();
        write_header(&mut arena, lo, 32);
        lists.insert_free(&mut arena, lo, 32);
        lists.remove_free(&mut arena, lo, 32);
        assert_eq!(lists.bucket_head(1), None);
    }
}
