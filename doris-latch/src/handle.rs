use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// LockableHandle is the lock-and-liveness state carried by one
/// catalog object.
///
/// It provides shared and exclusive acquisition, bounded-wait variants
/// of both, reentrant exclusive ownership keyed by thread identity, and
/// exclusive acquisition conditioned on the object still being live.
///
/// All fields form one unit guarded by a single internal mutex, so the
/// liveness check and the grant of exclusive access are one transition.
///
/// Fairness: writer preference. Once an exclusive requester is waiting,
/// new shared requests block until it has been served or has given up.
/// Shared access is tracked per thread, so a thread already holding it
/// can re-acquire it even with writers waiting. Shared access must be
/// released by the thread which acquired it.
///
/// There is no upgrade from shared to exclusive. Calling an exclusive
/// acquisition while holding shared access on the same handle blocks
/// until timeout (or forever for the unbounded variants).
#[derive(Debug, Default)]
pub struct LockableHandle {
    inner: Mutex<Inner>,
    cond: Condvar,
}

#[derive(Debug)]
struct Inner {
    readers: usize,
    // shared acquisition count of each holding thread.
    shared_holders: HashMap<ThreadId, usize>,
    writer: Option<ThreadId>,
    depth: usize,
    waiting_writers: usize,
    live: bool,
}

impl Default for Inner {
    #[inline]
    fn default() -> Self {
        Inner {
            readers: 0,
            shared_holders: HashMap::new(),
            writer: None,
            depth: 0,
            waiting_writers: 0,
            live: true,
        }
    }
}

impl Inner {
    #[inline]
    fn owned_by(&self, tid: ThreadId) -> bool {
        self.writer == Some(tid)
    }

    #[inline]
    fn can_share(&self, tid: ThreadId) -> bool {
        self.writer.is_none()
            && (self.waiting_writers == 0 || self.shared_holders.contains_key(&tid))
    }

    #[inline]
    fn can_own(&self) -> bool {
        self.writer.is_none() && self.readers == 0
    }
}

/// Snapshot of handle state, read atomically under the internal mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleState {
    /// Number of shared holders.
    pub readers: usize,
    /// Reentrancy depth of the exclusive owner, 0 if not exclusively locked.
    pub exclusive_depth: usize,
    /// Whether the calling thread is the exclusive owner.
    pub owned_by_caller: bool,
    /// Number of threads waiting for exclusive access.
    pub waiting_writers: usize,
    /// Whether the owning object is still registered in its catalog.
    pub live: bool,
}

impl HandleState {
    #[inline]
    pub fn is_unlocked(&self) -> bool {
        self.readers == 0 && self.exclusive_depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Granted,
    NotLive,
    TimedOut,
}

impl LockableHandle {
    /// Create a new handle, unlocked and live.
    #[inline]
    pub fn new() -> Self {
        LockableHandle::default()
    }

    /// Block until no exclusive holder (or waiter) is present,
    /// then register as a reader.
    ///
    /// Panics if the calling thread owns the exclusive lock.
    #[inline]
    pub fn acquire_shared(&self) {
        let res = self.lock_shared(None);
        debug_assert!(res);
    }

    /// Same as `acquire_shared` but gives up after `timeout`.
    /// Returns whether shared access is acquired.
    #[inline]
    pub fn try_acquire_shared(&self, timeout: Duration) -> bool {
        self.lock_shared(deadline(timeout))
    }

    /// Release shared access.
    ///
    /// Panics if the calling thread holds no shared access.
    #[inline]
    pub fn release_shared(&self) {
        let tid = thread::current().id();
        let mut g = self.inner.lock();
        let Some(held) = g.shared_holders.get_mut(&tid).map(|n| {
            *n -= 1;
            *n
        }) else {
            panic!("release shared latch which is not held by current thread");
        };
        if held == 0 {
            g.shared_holders.remove(&tid);
        }
        g.readers -= 1;
        if g.readers == 0 {
            // last reader should wake up waiting writers.
            self.cond.notify_all();
        }
    }

    /// Block until no other thread holds shared or exclusive access,
    /// then become the exclusive owner.
    /// If the caller already owns exclusive access, only the reentrancy
    /// depth is increased.
    #[inline]
    pub fn acquire_exclusive(&self) {
        let res = self.lock_exclusive(None, false);
        debug_assert_eq!(res, Grant::Granted);
    }

    /// Same as `acquire_exclusive` but gives up after `timeout`.
    /// Returns whether exclusive access is acquired.
    #[inline]
    pub fn try_acquire_exclusive(&self, timeout: Duration) -> bool {
        self.lock_exclusive(deadline(timeout), false) == Grant::Granted
    }

    /// Exclusive acquisition which fails once the handle is no longer live.
    ///
    /// Liveness is checked each time the caller wakes up, within the same
    /// critical section that grants the lock. So a drop that happens while
    /// the caller is waiting makes it fail instead of acquiring the lock
    /// of a dropped object. No lock is held when false is returned.
    #[inline]
    pub fn acquire_exclusive_if_live(&self) -> bool {
        self.lock_exclusive(None, true) == Grant::Granted
    }

    /// Bounded-wait variant of `acquire_exclusive_if_live`.
    /// Returns false on timeout or if the handle is not live.
    #[inline]
    pub fn try_acquire_exclusive_if_live(&self, timeout: Duration) -> bool {
        self.lock_exclusive(deadline(timeout), true) == Grant::Granted
    }

    /// Release one level of exclusive access.
    /// Waiters are woken up when the reentrancy depth reaches zero.
    ///
    /// Panics if the calling thread is not the exclusive owner.
    #[inline]
    pub fn release_exclusive(&self) {
        let tid = thread::current().id();
        let mut g = self.inner.lock();
        assert!(
            g.owned_by(tid),
            "release exclusive latch which is not owned by current thread"
        );
        g.depth -= 1;
        if g.depth == 0 {
            g.writer = None;
            self.cond.notify_all();
        }
    }

    /// Returns whether the calling thread owns exclusive access.
    #[inline]
    pub fn is_exclusive_held_by_caller(&self) -> bool {
        let tid = thread::current().id();
        self.inner.lock().owned_by(tid)
    }

    /// Returns whether the owning object is still live.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.inner.lock().live
    }

    /// Mark the owning object as removed from its catalog.
    /// Returns whether the handle was live before this call,
    /// liveness never comes back once cleared.
    ///
    /// Panics if the calling thread is not the exclusive owner.
    #[inline]
    pub fn mark_dropped(&self) -> bool {
        let tid = thread::current().id();
        let mut g = self.inner.lock();
        assert!(
            g.owned_by(tid),
            "mark dropped without holding exclusive latch"
        );
        let was_live = g.live;
        g.live = false;
        was_live
    }

    /// Returns a consistent snapshot of the handle.
    #[inline]
    pub fn state(&self) -> HandleState {
        let tid = thread::current().id();
        let g = self.inner.lock();
        HandleState {
            readers: g.readers,
            exclusive_depth: g.depth,
            owned_by_caller: g.owned_by(tid),
            waiting_writers: g.waiting_writers,
            live: g.live,
        }
    }

    #[inline]
    fn lock_shared(&self, deadline: Option<Instant>) -> bool {
        let tid = thread::current().id();
        let mut g = self.inner.lock();
        assert!(
            !g.owned_by(tid),
            "acquire shared latch while owning exclusive latch"
        );
        let mut timed_out = false;
        loop {
            if g.can_share(tid) {
                g.readers += 1;
                *g.shared_holders.entry(tid).or_insert(0) += 1;
                return true;
            }
            if timed_out {
                return false;
            }
            timed_out = !self.park(&mut g, deadline);
        }
    }

    #[inline]
    fn lock_exclusive(&self, deadline: Option<Instant>, require_live: bool) -> Grant {
        let tid = thread::current().id();
        let mut g = self.inner.lock();
        if require_live && !g.live {
            return Grant::NotLive;
        }
        if g.owned_by(tid) {
            g.depth += 1;
            return Grant::Granted;
        }
        g.waiting_writers += 1;
        let mut timed_out = false;
        let res = loop {
            if require_live && !g.live {
                break Grant::NotLive;
            }
            if g.can_own() {
                break Grant::Granted;
            }
            if timed_out {
                break Grant::TimedOut;
            }
            timed_out = !self.park(&mut g, deadline);
        };
        g.waiting_writers -= 1;
        if res == Grant::Granted {
            debug_assert_eq!(g.depth, 0);
            g.writer = Some(tid);
            g.depth = 1;
        } else if g.waiting_writers == 0 {
            // readers may be blocked by this writer.
            self.cond.notify_all();
        }
        res
    }

    /// Wait for a notification. Returns false if the deadline passed.
    #[inline]
    fn park(&self, g: &mut MutexGuard<'_, Inner>, deadline: Option<Instant>) -> bool {
        match deadline {
            None => {
                self.cond.wait(g);
                true
            }
            Some(d) => !self.cond.wait_until(g, d).timed_out(),
        }
    }
}

/// A timeout too large to represent is treated as no timeout.
#[inline]
fn deadline(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}
