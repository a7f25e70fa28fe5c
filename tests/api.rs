#[test]
fn is_usable_in_const_contexts() {
    const _ALLOCATOR1: segalloc::Allocator<32> = segalloc::Allocator::new();
    static _ALLOCATOR2: segalloc::Allocator<32> = segalloc::Allocator::new();
}

#[test]
fn supports_global_alloc() {
    fn assert<T: core::alloc::GlobalAlloc>(_: T) {}
    assert(segalloc::Allocator::<64>::new())
}

#[test]
#[should_panic(expected = "too small heap memory")]
fn min_heap_size_of_at_least_16() {
    let _allocator = segalloc::Allocator::<8>::new(); // panic here
}

#[test]
#[should_panic(expected = "divisible by 16")]
fn heap_size_must_be_a_multiple_of_16() {
    let _allocator = segalloc::Allocator::<17>::new(); // panic here
}

#[test]
fn over_aligned_requests_are_rejected_not_undefined() {
    use core::alloc::{GlobalAlloc, Layout};

    let allocator = segalloc::Allocator::<4096>::new();
    let layout = Layout::from_size_align(64, 64).unwrap();
    // SAFETY: we only ever pass the null result to `dealloc` when non-null.
    unsafe {
        let ptr = allocator.alloc(layout);
        assert!(ptr.is_null());
    }
}
