// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A writer-preferring reader-writer lock built from a single state word.
//!
//! The word packs a *gate* bit, an *exclusive* bit and the reader count:
//!
//! - A writer first sets the gate bit. Only one writer can flip it from clear to set, which
//!   serializes writers. From that moment on every reader that tries to get in is turned away.
//! - The writer then waits for the reader count to drain to zero and sets the exclusive bit.
//! - A reader counts itself in with a single `fetch_add` and inspects the previous value. If the
//!   gate was set it backs out again and waits (without touching the count) for the gate to clear.
//!
//! Because the reader's increment and the writer's gate flip are read-modify-writes of the same
//! word, one of them always observes the other: either the reader sees the gate and backs out, or
//! the writer sees the reader and waits for it.

use core::fmt;

use mycelium_bitfield::bitfield;

use crate::SpinWait;
use crate::loom::loom_const_fn;
use crate::loom::sync::atomic::{AtomicUsize, Ordering};

bitfield! {
    #[derive(Eq, PartialEq)]
    struct State<usize> {
        /// Held by the writer that is draining readers or running its critical section.
        /// New readers are turned away while it is set.
        const GATE: bool;
        /// Set once the gate holder has seen the reader count drop to zero.
        const EXCLUSIVE: bool;
        /// The number of admitted readers, plus readers that are probing for admission and are
        /// about to back out again.
        const READERS = ..;
    }
}

impl State {
    const GATE_BIT: usize = Self::GATE.first_bit();
    const EXCLUSIVE_BIT: usize = Self::EXCLUSIVE.first_bit();
    const WRITER_BITS: usize = Self::GATE_BIT | Self::EXCLUSIVE_BIT;
    const ONE_READER: usize = Self::READERS.first_bit();
    /// An arbitrary cap that allows us to catch overflows long before they happen
    const MAX_READERS: usize = usize::MAX / Self::ONE_READER / 2;
}

/// A point-in-time view of a [`RawPriorityRwLock`], as returned by
/// [`RawPriorityRwLock::state`].
///
/// Other threads keep operating on the lock while the snapshot is inspected, so it is only
/// reliable when the caller knows nobody else can change the lock (for example in tests).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LockState {
    /// Nobody holds the lock.
    Free,
    /// This many readers hold the lock.
    ReadShared(usize),
    /// A writer holds the gate and is waiting for `draining` readers to leave. No new readers
    /// are admitted.
    WriteRequested { draining: usize },
    /// A writer has exclusive access.
    WriteExclusive,
}

impl LockState {
    fn from_state(state: State) -> Self {
        let readers = state.get(State::READERS);

        if state.get(State::EXCLUSIVE) {
            LockState::WriteExclusive
        } else if state.get(State::GATE) {
            LockState::WriteRequested { draining: readers }
        } else if readers > 0 {
            LockState::ReadShared(readers)
        } else {
            LockState::Free
        }
    }
}

/// Low-level writer-preferring reader-writer lock.
///
/// This type of lock allows a number of readers or at most one writer at any point in time.
/// Unlike a plain counting lock, a writer that has started waiting keeps every reader that
/// arrives after it out until it has run and released the lock. A steady stream of writers can
/// therefore starve readers.
///
/// This is the raw lock, it doesn't protect any data. Wrap it in a [`PriorityRwLock`] to guard a
/// value with RAII guards.
///
/// Waiting uses [`SpinWait`]: a bounded number of busy polls followed by yielding the thread.
///
/// [`PriorityRwLock`]: crate::PriorityRwLock
pub struct RawPriorityRwLock {
    state: AtomicUsize,
    spin_limit: u32,
}

impl RawPriorityRwLock {
    loom_const_fn! {
        /// Creates a new unlocked lock that busy-polls [`SpinWait::DEFAULT_SPIN_LIMIT`] times
        /// before yielding.
        #[must_use]
        pub const fn new() -> Self {
            Self::with_spin_limit(SpinWait::DEFAULT_SPIN_LIMIT)
        }
    }

    loom_const_fn! {
        /// Creates a new unlocked lock whose waiters busy-poll `spin_limit` times before they
        /// start yielding to the scheduler.
        #[must_use]
        pub const fn with_spin_limit(spin_limit: u32) -> Self {
            Self {
                state: AtomicUsize::new(0),
                spin_limit,
            }
        }
    }

    /// Acquires the lock exclusively, waiting until no other writer holds it and all readers
    /// admitted before this call have left.
    ///
    /// As soon as this call has claimed the gate no new reader is admitted, even while it is
    /// still waiting for the earlier readers to drain.
    pub fn lock(&self) {
        let mut wait = self.spin_wait();

        // Setting an already set gate bit is a no-op, so a losing writer leaves no trace.
        while self
            .fetch_or(State::GATE_BIT, Ordering::Acquire)
            .get(State::GATE)
        {
            tracing::trace!(lock = ?self, "gate held by another writer, waiting");
            wait.wait_until(|| !self.load(Ordering::Relaxed).get(State::GATE));
        }

        let readers = self.load(Ordering::Acquire).get(State::READERS);
        if readers > 0 {
            tracing::trace!(readers, "draining readers");
            wait.reset();
            wait.wait_until(|| self.load(Ordering::Acquire).get(State::READERS) == 0);
        }

        self.state.fetch_or(State::EXCLUSIVE_BIT, Ordering::Relaxed);
    }

    /// Attempts to acquire the lock exclusively without waiting.
    ///
    /// Returns `true` if the lock was acquired. This fails whenever any reader or writer holds
    /// the lock, or a reader is momentarily probing it.
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(0, State::WRITER_BITS, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases an exclusive lock.
    ///
    /// The gate and the exclusive bit are cleared in one atomic step, after which either a
    /// waiting writer or any number of waiting readers may proceed.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not currently write-locked.
    #[track_caller]
    pub fn unlock(&self) {
        let state = self.load(Ordering::Relaxed);
        assert!(
            state.get(State::EXCLUSIVE),
            "attempted to unlock a PriorityRwLock that is not write-locked ({state:?})"
        );
        debug_assert!(state.get(State::GATE));

        self.state.fetch_and(!State::WRITER_BITS, Ordering::Release);
    }

    /// Acquires the lock shared, waiting while a writer holds the lock or is waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if the number of readers would overflow the reader count.
    #[track_caller]
    pub fn rlock(&self) {
        let mut wait = self.spin_wait();

        while !self.try_rlock() {
            tracing::trace!(lock = ?self, "reader turned away by a pending writer");
            wait.wait_until(|| !self.load(Ordering::Relaxed).get(State::GATE));
        }
    }

    /// Attempts to acquire the lock shared without waiting.
    ///
    /// Returns `false` if a writer holds the lock or is waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if the number of readers would overflow the reader count.
    #[track_caller]
    pub fn try_rlock(&self) -> bool {
        // fetch_add is considerably cheaper than a compare_exchange loop under contention, so we
        // count ourselves in optimistically and back out if the gate turns out to be held.
        let prev = self.fetch_add(State::ONE_READER, Ordering::Acquire);

        if prev.get(State::READERS) >= State::MAX_READERS {
            self.state.fetch_sub(State::ONE_READER, Ordering::Relaxed);
            panic!("too many PriorityRwLock readers, cannot safely proceed");
        }

        if prev.get(State::GATE) {
            self.state.fetch_sub(State::ONE_READER, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    /// Releases a shared lock.
    ///
    /// If this was the last reader a draining writer may proceed.
    ///
    /// # Panics
    ///
    /// Panics if no reader holds the lock. The reader count is left untouched in that case.
    #[track_caller]
    pub fn runlock(&self) {
        let prev = self.fetch_sub(State::ONE_READER, Ordering::Release);

        if prev.get(State::READERS) == 0 {
            // put the count back before it is observed wrapped around
            self.state.fetch_add(State::ONE_READER, Ordering::Relaxed);
            panic!("attempted to read-unlock a PriorityRwLock that has no readers");
        }
    }

    /// Atomically turns an exclusive lock into a shared one.
    ///
    /// The caller is counted as a reader before the gate is released, so no other writer can
    /// get in between. Readers that were turned away may join right after.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not currently write-locked.
    #[track_caller]
    pub fn downgrade(&self) {
        let state = self.load(Ordering::Relaxed);
        assert!(
            state.get(State::EXCLUSIVE),
            "attempted to downgrade a PriorityRwLock that is not write-locked ({state:?})"
        );

        self.state.fetch_add(State::ONE_READER, Ordering::Relaxed);
        self.state.fetch_and(!State::WRITER_BITS, Ordering::Release);
    }

    /// Returns `true` if any reader or writer holds the lock, or a writer is waiting for it.
    pub fn is_locked(&self) -> bool {
        let state = self.load(Ordering::Relaxed);
        state.get(State::GATE) || state.get(State::READERS) > 0
    }

    /// Returns `true` if a writer holds the lock or is waiting for readers to drain.
    pub fn is_write_locked(&self) -> bool {
        self.load(Ordering::Relaxed).get(State::GATE)
    }

    /// Returns a snapshot of the lock's current state.
    pub fn state(&self) -> LockState {
        LockState::from_state(self.load(Ordering::Acquire))
    }

    #[inline]
    fn spin_wait(&self) -> SpinWait {
        SpinWait::with_spin_limit(self.spin_limit)
    }

    #[inline]
    fn load(&self, order: Ordering) -> State {
        State::from_bits(self.state.load(order))
    }

    #[inline]
    fn fetch_add(&self, val: usize, order: Ordering) -> State {
        State::from_bits(self.state.fetch_add(val, order))
    }

    #[inline]
    fn fetch_sub(&self, val: usize, order: Ordering) -> State {
        State::from_bits(self.state.fetch_sub(val, order))
    }

    #[inline]
    fn fetch_or(&self, val: usize, order: Ordering) -> State {
        State::from_bits(self.state.fetch_or(val, order))
    }
}

impl Default for RawPriorityRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawPriorityRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = State::from_bits(self.state.load(Ordering::Relaxed));
        f.debug_struct("RawPriorityRwLock")
            .field("state", &LockState::from_state(state))
            .field("spin_limit", &self.spin_limit)
            .finish()
    }
}

// Safety: `lock_exclusive` only returns once this thread holds the gate and every reader has left,
// and `lock_shared` only admits readers while the gate is clear, so shared and exclusive access
// never overlap. Acquisitions use `Acquire` and releases `Release` on the same word.
#[cfg(not(loom))]
unsafe impl lock_api::RawRwLock for RawPriorityRwLock {
    const INIT: Self = Self::new();
    type GuardMarker = lock_api::GuardSend;

    fn lock_shared(&self) {
        self.rlock();
    }

    fn try_lock_shared(&self) -> bool {
        self.try_rlock()
    }

    unsafe fn unlock_shared(&self) {
        self.runlock();
    }

    fn lock_exclusive(&self) {
        self.lock();
    }

    fn try_lock_exclusive(&self) -> bool {
        self.try_lock()
    }

    unsafe fn unlock_exclusive(&self) {
        self.unlock();
    }

    fn is_locked(&self) -> bool {
        RawPriorityRwLock::is_locked(self)
    }

    fn is_locked_exclusive(&self) -> bool {
        self.is_write_locked()
    }
}

// Safety: the downgraded holder is counted as a reader before the gate is cleared, so no writer
// can be admitted in between.
#[cfg(not(loom))]
unsafe impl lock_api::RawRwLockDowngrade for RawPriorityRwLock {
    unsafe fn downgrade(&self) {
        RawPriorityRwLock::downgrade(self);
    }
}
