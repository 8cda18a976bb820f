//! Zero-filled bulk allocation for blocks and block vectors.
//!
//! Real allocation failure here is unrecoverable -- by the time a registry
//! needs a new block, the caller's own data structures (the objects the
//! pids actually name) already dwarf a few kilobytes of pointer slots, so
//! there is no meaningful degraded mode to fall back to. We let the
//! standard allocator's own abort-on-OOM behavior do the job; there is no
//! `Result` in this module's surface.

use crate::sync::{Arc, AtomicPtr};
use crate::ObjPtr;
use crate::BLOCK_SIZE;
use std::ffi::c_void;
use std::ptr;

/// A fixed-length, zero-initialized array of opaque pointer slots.
///
/// `Arc`-shared rather than uniquely owned: a grow copies block
/// references, not block contents, into the new instance's prefix, so
/// that the old and new instance generations point at the very same block
/// memory. An `Arc` clone is exactly that -- a new reference to the same
/// allocation, with the allocation itself freed only
/// once both the retiring and the surviving instance have dropped their
/// reference (in practice: never, since nothing in this registry ever
/// drops the surviving instance's reference to a live block).
///
/// Boxed before being wrapped in `Arc` (rather than collected straight into
/// `Arc<[T]>`) so the allocation is `Arc::new`'d directly -- `loom`'s `Arc`
/// does not provide the `Vec<T> -> Arc<[T]>` unsizing conversion `std`'s
/// does.
pub type Block = Arc<Box<[AtomicPtr<c_void>]>>;

/// Allocate one zero-filled block of `BLOCK_SIZE` slots.
pub fn zeroed_block() -> Block {
    let slots: Vec<_> = (0..BLOCK_SIZE).map(|_| AtomicPtr::new(ptr::null_mut())).collect();
    Arc::new(slots.into_boxed_slice())
}

/// Allocate `n` freshly zeroed blocks.
pub fn zeroed_blocks(n: usize) -> Vec<Block> {
    (0..n).map(|_| zeroed_block()).collect()
}

#[inline]
pub fn null() -> ObjPtr {
    ptr::null_mut()
}
