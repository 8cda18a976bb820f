//! Two parallel growable vectors of blocks, exactly one of which is
//! "current" at any moment.
//!
//! Instead of a single atomic pointer naming one boxed value, we have two
//! `Instance` slots and an atomic index naming which one readers should
//! consult. The index swap is the sole linearization point of a grow.

use crate::alloc::{zeroed_blocks, Block};
use crate::sync::{AtomicU8, Cell, Ordering};

/// One generation of storage: an ordered sequence of block references.
///
/// `blocks[i]` is only valid to index for `i < len`; `len >= blocks.len()`
/// is also possible transiently (never observed outside this module) but
/// is not relied on. Once published via [`InstancePair::set_current_idx`],
/// an `Instance`'s `blocks`/`len` are never again mutated -- a grow builds
/// an entirely new `Instance` in the other slot instead.
pub struct Instance {
    pub blocks: Vec<Block>,
}

impl Instance {
    /// The empty instance: valid, zero-length, never grown into.
    pub fn empty() -> Instance {
        Instance { blocks: Vec::new() }
    }

    /// A fresh instance with `n_blocks` zero-filled blocks.
    pub fn with_blocks(n_blocks: usize) -> Instance {
        Instance {
            blocks: zeroed_blocks(n_blocks),
        }
    }

    /// Build the next generation: share `old`'s blocks by reference and
    /// append freshly zeroed blocks for the new suffix `[old.len(), new_len)`.
    pub fn grown_from(old: &Instance, new_len: usize) -> Instance {
        debug_assert!(new_len >= old.len());
        let mut blocks = Vec::with_capacity(new_len);
        blocks.extend(old.blocks.iter().cloned());
        blocks.extend(zeroed_blocks(new_len - old.len()));
        Instance { blocks }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

/// Two instance slots plus the atomic index naming the current one.
///
/// Slot mutation is the writer's alone: only the writer, holding the grow
/// mutex, ever replaces the contents of the *non-current* slot (the
/// current one is read-only from the moment it's published until it's
/// retired). Readers only ever read through [`InstancePair::get`] by index.
pub struct InstancePair {
    slots: [Cell<Instance>; 2],
    current: AtomicU8,
}

impl InstancePair {
    /// Both slots start as the empty instance; `Registry::new` (in the
    /// `registry` module) replaces slot 0 with a one-block instance
    /// immediately after construction. Slot 1 is left empty until the
    /// first grow populates it.
    pub fn new() -> InstancePair {
        InstancePair {
            slots: [Cell::new(Instance::empty()), Cell::new(Instance::empty())],
            current: AtomicU8::new(0),
        }
    }

    /// Load the current instance index. Acquire: pairs with the writer's
    /// release-store in [`InstancePair::set_current_idx`].
    #[inline]
    pub fn current_idx(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }

    /// Publish a new current index. Release: everything the writer wrote
    /// into the named slot before this call is visible to any reader that
    /// observes the new index.
    #[inline]
    pub fn set_current_idx(&self, idx: u8) {
        self.current.store(idx, Ordering::Release);
    }

    /// Borrow a slot by index. Safe to call concurrently with a writer
    /// mutating the *other* slot; callers must never index the slot the
    /// writer currently holds exclusive access to.
    ///
    /// # Safety
    /// The caller must ensure no writer is concurrently mutating the slot
    /// named by `idx` (true for any reader using a revalidated
    /// `current_idx()`, and true for a writer accessing its own freshly
    /// claimed non-current slot).
    #[inline]
    pub unsafe fn get(&self, idx: u8) -> &Instance {
        self.slots[idx as usize].get()
    }

    /// Mutably borrow the non-current slot. Only the writer, holding the
    /// grow mutex, may call this.
    ///
    /// # Safety
    /// The caller must hold the grow mutex and must pass the *non-current*
    /// index (`1 - current_idx()`), never the slot live readers may be
    /// indexing.
    #[inline]
    pub unsafe fn get_mut(&self, idx: u8) -> &mut Instance {
        self.slots[idx as usize].get_mut()
    }
}

// SAFETY: all interior mutability is serialized by the grow mutex
// (exactly one writer ever touches a given slot's contents), and the
// current-slot/non-current-slot split means a reader's concurrent shared
// access never overlaps a writer's exclusive access to the same slot.
unsafe impl Send for InstancePair {}
unsafe impl Sync for InstancePair {}
