//! Swaps in `loom`'s shadow synchronization types under `--cfg loom`:
//!
//! ```ignore
//! #[cfg(loom)]
//! use loom::{sync::{atomic, Arc, Mutex}, thread};
//! #[cfg(not(loom))]
//! use std::{sync::{atomic, Arc, Mutex}, thread};
//! ```
//!
//! Every other module in this crate reaches atomics, `Arc`, `Mutex`, and
//! `thread::yield_now` through this module instead of `std` directly, so a
//! `loom` build exercises the exact same code the real library runs under
//! `std`, rather than a parallel implementation.

#[cfg(loom)]
pub use loom::sync::atomic::{fence, AtomicBool, AtomicI8, AtomicPtr, AtomicU8, Ordering};
#[cfg(loom)]
pub use loom::sync::{Arc, Mutex, MutexGuard};
#[cfg(loom)]
pub use loom::thread;

#[cfg(not(loom))]
pub use std::sync::atomic::{fence, AtomicBool, AtomicI8, AtomicPtr, AtomicU8, Ordering};
#[cfg(not(loom))]
pub use std::sync::{Arc, Mutex, MutexGuard};
#[cfg(not(loom))]
pub use std::thread;

/// A cell allowing interior mutation serialized entirely by our own
/// invariants (never by the type system). Under `loom`, this routes
/// through `loom::cell::UnsafeCell`'s `with`/`with_mut` so the model
/// checker can flag an access this crate's algorithm didn't actually make
/// safe; under `std`, it's a transparent wrapper with no extra bookkeeping.
pub struct Cell<T>(Inner<T>);

#[cfg(loom)]
type Inner<T> = loom::cell::UnsafeCell<T>;
#[cfg(not(loom))]
type Inner<T> = std::cell::UnsafeCell<T>;

impl<T> Cell<T> {
    pub fn new(value: T) -> Cell<T> {
        #[cfg(loom)]
        {
            Cell(loom::cell::UnsafeCell::new(value))
        }
        #[cfg(not(loom))]
        {
            Cell(std::cell::UnsafeCell::new(value))
        }
    }

    /// # Safety
    /// The caller must ensure no concurrent mutable access to the same
    /// cell is possible for the duration of the returned borrow.
    #[cfg(not(loom))]
    #[inline]
    pub unsafe fn get(&self) -> &T {
        &*self.0.get()
    }

    #[cfg(loom)]
    #[inline]
    pub unsafe fn get(&self) -> &T {
        self.0.with(|ptr| &*ptr)
    }

    /// # Safety
    /// The caller must ensure exclusive access to the same cell for the
    /// duration of the returned borrow.
    #[cfg(not(loom))]
    #[inline]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }

    #[cfg(loom)]
    #[inline]
    pub unsafe fn get_mut(&self) -> &mut T {
        self.0.with_mut(|ptr| &mut *ptr)
    }
}
