//! Public API: `publish`, `get`, `clear`, `capacity`, and construction,
//! plus the block/slot arithmetic and growth-triggering that ties the
//! reader roster, instance pair, and coordinator together.

use crate::coordinator::Coordinator;
use crate::instance::Instance;
use crate::sync::Ordering;
use crate::{ObjPtr, Pid, BLOCK_SIZE};

/// An instantiable privatized-object registry.
///
/// `Registry::new()` sets up instance 0 with a single fresh block (so
/// `publish`/`get` on small pids never pay for a grow), leaves instance 1
/// empty until the first grow needs it, and sets the current index to 0.
///
/// Most callers reach this through the process-wide singleton in
/// [`crate::global`]'s handle-free procedural surface; `Registry` itself
/// takes no global state so it can also be constructed directly (one per
/// test, for instance) without cross-test interference.
pub struct Registry {
    coordinator: Coordinator,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Registry {
        let coordinator = Coordinator::new();
        // SAFETY: nothing else can observe `coordinator.instances` yet --
        // we haven't returned from `new` and no reader/writer handle
        // exists. Slot 0 is the only one ever read before a grow runs.
        unsafe {
            *coordinator.instances.get_mut(0) = Instance::with_blocks(1);
        }
        Registry { coordinator }
    }

    /// Store `ptr` at `pid`, growing the registry as needed.
    ///
    /// Takes the wait-free read path unless `pid`'s block doesn't exist
    /// yet, in which case it releases the read, grows under the writer
    /// mutex, and retries.
    pub fn publish(&self, pid: Pid, ptr: ObjPtr) {
        let (block_idx, slot_idx) = Self::decompose(pid);
        loop {
            let i = self.coordinator.acquire_read();
            // SAFETY: `i` is a revalidated current index; we hold it for
            // the duration of this read critical section via our
            // advertised status, so the writer won't free it under us.
            let instance = unsafe { self.coordinator.instances.get(i) };
            if block_idx >= instance.len() {
                self.coordinator.release_read(i);
                self.grow_to_fit(block_idx);
                continue;
            }
            instance.blocks[block_idx][slot_idx].store(ptr, Ordering::Relaxed);
            self.coordinator.release_read(i);
            return;
        }
    }

    /// Return the current value at `pid`, or null if it has never been
    /// published.
    pub fn get(&self, pid: Pid) -> ObjPtr {
        let (block_idx, slot_idx) = Self::decompose(pid);
        let i = self.coordinator.acquire_read();
        // SAFETY: see `publish`.
        let instance = unsafe { self.coordinator.instances.get(i) };
        let value = if block_idx < instance.len() {
            instance.blocks[block_idx][slot_idx].load(Ordering::Relaxed)
        } else {
            crate::alloc::null()
        };
        self.coordinator.release_read(i);
        value
    }

    /// Overwrite the slot at `pid` with a null pointer. A no-op store if
    /// `pid` has never been published or never grown into.
    pub fn clear(&self, pid: Pid) {
        let (block_idx, slot_idx) = Self::decompose(pid);
        let i = self.coordinator.acquire_read();
        // SAFETY: see `publish`.
        let instance = unsafe { self.coordinator.instances.get(i) };
        if block_idx < instance.len() {
            instance.blocks[block_idx][slot_idx].store(crate::alloc::null(), Ordering::Relaxed);
        }
        self.coordinator.release_read(i);
    }

    /// Upper bound on the pid space the registry currently has storage
    /// for. Monotone non-decreasing over the registry's lifetime.
    pub fn capacity(&self) -> usize {
        let i = self.coordinator.acquire_read();
        // SAFETY: see `publish`.
        let instance = unsafe { self.coordinator.instances.get(i) };
        let cap = instance.len() * BLOCK_SIZE;
        self.coordinator.release_read(i);
        cap
    }

    fn decompose(pid: Pid) -> (usize, usize) {
        debug_assert!(pid >= 0, "pid must be non-negative, got {pid}");
        let pid = pid as usize;
        (pid / BLOCK_SIZE, pid % BLOCK_SIZE)
    }

    /// Grow the registry so that `block_idx` is valid, racing safely
    /// against other publishers growing toward the same or a larger
    /// index.
    fn grow_to_fit(&self, block_idx: usize) {
        self.coordinator.grow(|old_idx, pairs| {
            let new_idx = 1 - old_idx;
            // SAFETY: `old_idx` is the current index; we only read it.
            let old = unsafe { pairs.get(old_idx) };
            if block_idx < old.len() {
                // Another writer already grew past what we needed while
                // we were waiting on the mutex.
                return None;
            }
            let grown = Instance::grown_from(old, block_idx + 1);
            // SAFETY: `new_idx` is not the current index, and we hold the
            // grow mutex, so no reader or other writer touches this slot.
            unsafe {
                *pairs.get_mut(new_idx) = grown;
            }
            pairs.set_current_idx(new_idx);
            Some(old_idx)
        });
    }
}

// SAFETY: the coordinator's own Send/Sync impls already establish that
// concurrent access through shared references is sound; `Registry` adds
// no additional state.
unsafe impl Send for Registry {}
unsafe impl Sync for Registry {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // A grow retires the old instance's outer `blocks` vector but must
    // not touch the blocks themselves -- they are `Arc`-shared with the
    // surviving instance.
    #[test]
    fn grow_empties_the_retired_slot_and_keeps_shared_blocks_alive() {
        let r = Registry::new();
        let old_idx = r.coordinator.instances.current_idx();

        // SAFETY: test-only peek while no writer/reader is active.
        let shared_block = unsafe { r.coordinator.instances.get(old_idx).blocks[0].clone() };
        assert_eq!(Arc::strong_count(&shared_block), 2); // ours + the instance's

        r.publish(BLOCK_SIZE as i64, 1 as *mut _); // forces a grow past len 1
        let new_idx = r.coordinator.instances.current_idx();
        assert_ne!(old_idx, new_idx);

        // SAFETY: no writer is running; quiescence already completed
        // inside `publish`'s grow call.
        let retired = unsafe { r.coordinator.instances.get(old_idx) };
        assert_eq!(retired.len(), 0, "retired instance's vector must be freed");

        let grown = unsafe { r.coordinator.instances.get(new_idx) };
        assert_eq!(grown.len(), 2);
        // The first block is the very same allocation as before the grow.
        assert!(Arc::ptr_eq(&grown.blocks[0], &shared_block));
        // The retired instance held no references anymore, so the count
        // is still "ours + the surviving instance's", not 3.
        assert_eq!(Arc::strong_count(&shared_block), 2);
    }

    #[test]
    fn capacity_reports_len_times_block_size() {
        let r = Registry::new();
        assert_eq!(r.capacity(), BLOCK_SIZE);
        r.publish(5_000, 1 as *mut _);
        assert!(r.capacity() >= 5_001);
        assert_eq!(r.capacity() % BLOCK_SIZE, 0);
    }

    #[test]
    fn decompose_matches_block_size_arithmetic() {
        assert_eq!(Registry::decompose(0), (0, 0));
        assert_eq!(Registry::decompose(BLOCK_SIZE as i64 - 1), (0, BLOCK_SIZE - 1));
        assert_eq!(Registry::decompose(BLOCK_SIZE as i64), (1, 0));
        assert_eq!(Registry::decompose(BLOCK_SIZE as i64 + 5), (1, 5));
    }
}
