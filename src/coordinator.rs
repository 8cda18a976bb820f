//! The acquire/release primitives readers use on every operation, and the
//! write critical section a publish upgrades into when it needs to grow.
//!
//! The read side is a revalidation loop against an index that can move,
//! rather than a monotonically increasing epoch counter -- a reader only
//! ever cares about "am I on the instance the writer thinks is old", not
//! "which specific write am I observing".

use crate::instance::InstancePair;
use crate::sync::{fence, thread, Mutex, MutexGuard, Ordering};
use crate::tls::{Roster, IDLE};

/// Bundles the TLS roster, the instance pair, and the writer's mutual
/// exclusion lock: everything a read or a grow needs to coordinate.
pub struct Coordinator {
    pub instances: InstancePair,
    roster: Roster,
    grow_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new() -> Coordinator {
        Coordinator {
            instances: InstancePair::new(),
            roster: Roster::new(),
            grow_lock: Mutex::new(()),
        }
    }

    /// Enter a read critical section: publish this thread's intent to read
    /// the current instance, revalidating against a concurrent swap.
    ///
    /// The loop exists because a writer may swap the current instance
    /// index between our first load and our status store.
    /// Either the old or the new index is fine to settle on, because
    /// either way the writer's quiescence scan (run only after its swap)
    /// will see our status set to an index it must wait out.
    ///
    /// This is a store-buffer (Dekker) pattern: the status store and the
    /// revalidating index load are on opposite sides of it, and a plain
    /// Release store paired with a plain Acquire load permits the CPU to
    /// reorder the store after the load (spec.md §4.4 "Ordering required"
    /// calls this out explicitly). The `fence(SeqCst)` between them closes
    /// that window; it pairs with the symmetric fence the writer takes
    /// between its index swap and its status scan in [`Coordinator::grow`].
    #[inline]
    pub fn acquire_read(&self) -> u8 {
        let node = self.roster.ensure_local();
        debug_assert_eq!(
            node.status(),
            IDLE,
            "nested read critical sections on one thread are not supported"
        );
        loop {
            let i = self.instances.current_idx();
            node.set_status(i as i8);
            fence(Ordering::SeqCst);
            if self.instances.current_idx() == i {
                return i;
            }
        }
    }

    /// Leave a read critical section. `_idx` is accepted for symmetry with
    /// [`Coordinator::acquire_read`]'s return value; the underlying
    /// operation (reset status to idle) does not need it, since nesting is
    /// unsupported and there is exactly one open read per thread.
    #[inline]
    pub fn release_read(&self, _idx: u8) {
        self.roster.ensure_local().set_status(IDLE);
    }

    /// Run `body` (which must build and install a new, longer instance in
    /// the non-current slot) inside the writer's mutual exclusion lock,
    /// then wait for every reader still on the retired instance to move
    /// off before returning.
    ///
    /// `body` receives the currently-active index and the instance pair,
    /// and returns the retired index once it has published the new one
    /// (or `None` if it decided growth was unnecessary -- a racing grower
    /// may have already grown past what this one needed).
    pub fn grow(&self, body: impl FnOnce(u8, &InstancePair) -> Option<u8>) {
        let _held: MutexGuard<'_, ()> = self.grow_lock.lock().unwrap();
        let old_idx = self.instances.current_idx();
        let Some(retired_idx) = body(old_idx, &self.instances) else {
            return;
        };
        // Pairs with the fence in `acquire_read`: without it, this scan's
        // loads of `status` could be reordered before `body`'s release-store
        // of the new `currentInstanceIdx`, letting us observe a reader's
        // stale `IDLE` status when it is in fact still on `retired_idx`.
        fence(Ordering::SeqCst);
        self.wait_for_quiescence(retired_idx);
        // SAFETY: quiescence just established that no reader advertises
        // `retired_idx` anymore, and we still hold the grow mutex, so no
        // other writer can be touching this slot either.
        let retired = unsafe { self.instances.get_mut(retired_idx) };
        // Frees only the outer `blocks` vector; the blocks themselves are
        // `Arc`-shared with the surviving instance and stay alive through
        // its own reference.
        retired.blocks = Vec::new();
    }

    /// Spin (yielding between polls) until no roster node advertises
    /// `retired_idx`. Dropping the retired instance's `blocks` vector is
    /// the caller's job once this returns.
    fn wait_for_quiescence(&self, retired_idx: u8) {
        let target = retired_idx as i8;
        loop {
            let quiescent = self.roster.iter().all(|node| node.status() != target);
            if quiescent {
                return;
            }
            thread::yield_now();
        }
    }
}
