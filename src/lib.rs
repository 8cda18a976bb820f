//! A process-wide, concurrent mapping from a dense integer id (a *pid*) to
//! an opaque object pointer, built for a read-mostly access pattern: any
//! thread may [`Registry::get`] or [`Registry::clear`] a slot very
//! frequently, while [`Registry::publish`] (and the growth it occasionally
//! triggers) is comparatively rare.
//!
//! The registry grows on demand to hold arbitrarily large pids without ever
//! blocking a concurrent reader. It is not a standard RCU or seqlock, but a
//! close relative of both: readers publish and revalidate which *instance*
//! generation they're looking at through a thread-local status word, and a
//! writer grows by building a whole new instance off to the side, swapping
//! it in with a single atomic store, then waiting for every reader still
//! advertising the old generation to move on before freeing it.
//!
//! - Reading is wait-free: a read only ever loads and stores plain atomics,
//!   never blocks, and never takes a lock.
//! - Writing (`publish` past the edge of the current instance) takes an
//!   internal mutex, builds a new instance, publishes it with one atomic
//!   store, then spins (yielding) until quiescence.
//! - There is no reclamation of *referent* memory: `clear` only ever stores
//!   a null pointer into a slot. Whatever the caller published there is the
//!   caller's to free, if it is ever freed at all.
//!
//! See the module docs on [`coordinator`] for the exact ordering
//! requirements of the read/write handshake, and [`tls`] for the roster
//! readers and writers rendezvous through.

mod alloc;
mod coordinator;
mod instance;
mod registry;
mod sync;
mod tls;

pub use registry::Registry;

use std::ffi::c_void;

/// Number of slots per block.
///
/// Chosen to amortize block allocation over many pids while keeping cold
/// blocks cheap. Fixed at compile time: implementations may expose it as a
/// build parameter, but it must not change at runtime after [`Registry::new`].
pub const BLOCK_SIZE: usize = 1024;

/// Dense, externally-assigned identifier. Non-negative in practice; the pid
/// space need not be presented in monotonic order (pid 27 may be published
/// before pid 2).
pub type Pid = i64;

/// An opaque object pointer. The registry never dereferences it -- it only
/// ever stores, returns, and overwrites it.
pub type ObjPtr = *mut c_void;

/// Process-wide singleton surface matching the registry's external
/// interface: `init`, `publish`, `get`, `clear`, `capacity`, with no handle
/// parameter threaded through by callers.
pub mod global {
    use super::{ObjPtr, Pid, Registry};
    use std::sync::OnceLock;

    static REGISTRY: OnceLock<Registry> = OnceLock::new();

    fn handle() -> &'static Registry {
        REGISTRY.get_or_init(Registry::new)
    }

    /// One-time process initialization. Idempotent: later calls are no-ops
    /// that return the already-initialized singleton.
    pub fn init() {
        handle();
    }

    /// Store `ptr` at slot `pid`, growing the registry as needed.
    pub fn publish(pid: Pid, ptr: ObjPtr) {
        handle().publish(pid, ptr)
    }

    /// Return the current value stored at `pid`, or null if `pid` has never
    /// been published.
    pub fn get(pid: Pid) -> ObjPtr {
        handle().get(pid)
    }

    /// Overwrite the slot at `pid` with a null pointer.
    pub fn clear(pid: Pid) {
        handle().clear(pid)
    }

    /// Upper bound on the number of pids the registry currently has storage
    /// for (`len * BLOCK_SIZE` of the current instance). Used for leak
    /// detection only, not for correctness.
    pub fn capacity() -> usize {
        handle().capacity()
    }
}
