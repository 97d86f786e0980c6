// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::RawPriorityRwLock;

/// A writer-preferring reader-writer lock protecting a value of type `T`.
///
/// See [`RawPriorityRwLock`] for the locking protocol.
pub type PriorityRwLock<T> = lock_api::RwLock<RawPriorityRwLock, T>;
pub type PriorityRwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawPriorityRwLock, T>;
pub type PriorityRwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawPriorityRwLock, T>;
pub type MappedPriorityRwLockReadGuard<'a, T> =
    lock_api::MappedRwLockReadGuard<'a, RawPriorityRwLock, T>;
pub type MappedPriorityRwLockWriteGuard<'a, T> =
    lock_api::MappedRwLockWriteGuard<'a, RawPriorityRwLock, T>;
