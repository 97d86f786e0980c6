// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A writer-preferring reader-writer lock.
//!
//! Many readers may hold the lock at once, or a single writer. Once a writer has asked for the
//! lock no new reader is admitted until that writer has run and released it again, so writers
//! never starve behind a steady stream of readers (the reverse is possible and accepted).
//!
//! The crate comes in two layers:
//!
//! - [`RawPriorityRwLock`] is the bare lock with `lock`/`unlock`/`rlock`/`runlock` and doesn't
//!   protect any data.
//! - [`PriorityRwLock<T>`] wraps a value and hands out RAII guards, built on [`lock_api`].
//!
//! ```
//! use priority_rwlock::PriorityRwLock;
//!
//! let lock = PriorityRwLock::new(5);
//!
//! // many reader locks can be held at once
//! {
//!     let r1 = lock.read();
//!     let r2 = lock.read();
//!     assert_eq!(*r1 + *r2, 10);
//! }
//!
//! // only one write lock can be held
//! *lock.write() += 1;
//! assert_eq!(*lock.read(), 6);
//! ```
//!
//! ```
//! use priority_rwlock::{LockState, RawPriorityRwLock};
//!
//! static LOCK: RawPriorityRwLock = RawPriorityRwLock::new();
//!
//! LOCK.rlock();
//! assert_eq!(LOCK.state(), LockState::ReadShared(1));
//! LOCK.runlock();
//!
//! LOCK.lock();
//! assert_eq!(LOCK.state(), LockState::WriteExclusive);
//! LOCK.unlock();
//! ```
//!
//! Waiting threads busy-poll for a short while and then yield to the scheduler, see
//! [`SpinWait`]. Without the default `std` feature the crate is `no_std` and the yield phase
//! falls back to spin loop hints.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod loom;
mod raw_rwlock;
#[cfg(not(loom))]
mod rw_lock;
mod spin_wait;

pub use raw_rwlock::{LockState, RawPriorityRwLock};
#[cfg(not(loom))]
pub use rw_lock::{
    MappedPriorityRwLockReadGuard, MappedPriorityRwLockWriteGuard, PriorityRwLock,
    PriorityRwLockReadGuard, PriorityRwLockWriteGuard,
};
pub use spin_wait::SpinWait;
