//! A singly-linked list of per-thread status nodes, reached through an
//! atomic head pointer so a writer can enumerate every thread that has
//! ever read the registry without taking a lock a reader would have to
//! contend on.
//!
//! Nodes are allocated once and never move, so the roster can be a
//! lock-free intrusive list rather than a locked table. The cost:
//! reclaiming a node (when its owning thread is gone) is "reclaim by CAS
//! on `in_use`", not "free the slot" -- nodes live for the rest of the
//! process.

use crate::sync::{AtomicBool, AtomicI8, AtomicPtr, Ordering};
use std::cell::RefCell;
use std::ptr;

/// Sentinel `status` value meaning "not currently reading".
pub const IDLE: i8 = -1;

/// A single thread's status node, always leaked (`'static`) and never
/// moved or freed once allocated: the roster only ever grows.
pub struct TlsNode {
    in_use: AtomicBool,
    status: AtomicI8,
    next: AtomicPtr<TlsNode>,
}

impl TlsNode {
    fn new() -> TlsNode {
        TlsNode {
            in_use: AtomicBool::new(true),
            status: AtomicI8::new(IDLE),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Read this node's advertised status.
    ///
    /// Acquire/release (rather than relaxed) on this field is required: a
    /// reader's slot accesses must happen-after its revalidated `status`
    /// store, and the writer's read of `status` during quiescence must
    /// happen-after its own index swap.
    #[inline]
    pub fn status(&self) -> i8 {
        self.status.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_status(&self, v: i8) {
        self.status.store(v, Ordering::Release);
    }
}

/// The roster: an atomic-CAS singly-linked list of [`TlsNode`]s, plus the
/// thread-local key binding each thread to the node it has reclaimed or
/// created.
pub struct Roster {
    head: AtomicPtr<TlsNode>,
}

thread_local! {
    // A thread may touch more than one independently-constructed `Registry`
    // (each with its own `Roster`), so the cache is keyed by roster identity
    // rather than being a single global slot -- otherwise a node reclaimed
    // for roster A would be handed back verbatim to roster B, and B's
    // writer would never see that thread's status during quiescence. Linear
    // scan over a small `Vec` rather than a `HashMap`: the number of
    // registries any one thread actually touches is tiny.
    static LOCAL_NODES: RefCell<Vec<(*const Roster, &'static TlsNode)>> =
        const { RefCell::new(Vec::new()) };
}

impl Roster {
    pub fn new() -> Roster {
        Roster {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Return this thread's node for *this* roster, reclaiming a vacated
    /// one or creating a new one and splicing it into the roster if none
    /// is free.
    ///
    /// Caches the result in a thread-local, keyed by this roster's address,
    /// so repeat calls from the same thread against the same registry (the
    /// overwhelmingly common case: every `get`/`publish`/`clear` calls this)
    /// skip the roster walk entirely.
    pub fn ensure_local(&self) -> &'static TlsNode {
        let key = self as *const Roster;
        let cached = LOCAL_NODES.with(|c| {
            c.borrow()
                .iter()
                .find(|&&(k, _)| k == key)
                .map(|&(_, node)| node)
        });
        if let Some(node) = cached {
            return node;
        }

        let node = self.reclaim_or_create();
        LOCAL_NODES.with(|c| c.borrow_mut().push((key, node)));
        node
    }

    fn reclaim_or_create(&self) -> &'static TlsNode {
        // Reclaim-then-create: walk the roster once, try to claim the
        // first vacated node via CAS. Nothing in this crate's public
        // surface currently resets `in_use` back to false (there is no
        // thread-exit hook in scope -- see the design notes on not relying
        // on TLS destructors), so in practice this walk never finds a
        // candidate today; it is kept so a future deregistration hook has
        // somewhere to plug in without changing the roster's shape.
        let mut cur = self.head.load(Ordering::Acquire);
        while !cur.is_null() {
            // SAFETY: every node ever linked into `head` is leaked and
            // lives for the rest of the process.
            let node = unsafe { &*cur };
            if node
                .in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                node.set_status(IDLE);
                return node;
            }
            cur = node.next.load(Ordering::Acquire);
        }

        // No vacated node found: allocate a fresh one and splice it at the
        // head via a CAS loop.
        let node: &'static TlsNode = Box::leak(Box::new(TlsNode::new()));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            node.next.store(head, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                node as *const TlsNode as *mut TlsNode,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return node,
                Err(actual) => head = actual,
            }
        }
    }

    /// Iterate every node ever linked into the roster, live or vacated.
    /// Used only by the writer's quiescence wait.
    pub fn iter(&self) -> RosterIter<'_> {
        RosterIter {
            cur: self.head.load(Ordering::Acquire),
            _roster: self,
        }
    }
}

pub struct RosterIter<'a> {
    cur: *mut TlsNode,
    _roster: &'a Roster,
}

impl<'a> Iterator for RosterIter<'a> {
    type Item = &'a TlsNode;

    fn next(&mut self) -> Option<&'a TlsNode> {
        if self.cur.is_null() {
            return None;
        }
        // SAFETY: nodes are leaked and never freed or moved.
        let node = unsafe { &*self.cur };
        self.cur = node.next.load(Ordering::Acquire);
        Some(node)
    }
}

// Every node is leaked and its fields are all plain atomics; sharing the
// roster across threads (each thread touching only its own node's `status`,
// and the writer reading all of them) is exactly what it's for.
unsafe impl Send for Roster {}
unsafe impl Sync for Roster {}
