use serde::Serialize;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

/// Total allocation calls and requested bytes seen by a [`CountingAllocator`].
///
/// Only ever grows. Deallocations are not subtracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocationTally {
    pub calls: u64,
    pub bytes: u64,
}

/// Allocator wrapper that counts every allocating call and forwards it unchanged.
///
/// The tally is two relaxed atomics, so the wrapper never locks and never
/// allocates. Install it with `#[global_allocator]` (the `lifetrace-alloc`
/// feature does this for `System`) or wrap any other [`GlobalAlloc`].
pub struct CountingAllocator<A = System> {
    inner: A,
    calls: AtomicU64,
    bytes: AtomicU64,
}

impl CountingAllocator<System> {
    pub const fn system() -> Self {
        Self::new(System)
    }
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn tally(&self) -> AllocationTally {
        AllocationTally {
            calls: self.calls.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    #[inline]
    fn record(&self, size: usize) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.record(layout.size());

        unsafe { self.inner.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.record(layout.size());

        unsafe { self.inner.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.record(new_size);

        unsafe { self.inner.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe {
            self.inner.dealloc(ptr, layout);
        }
    }
}
