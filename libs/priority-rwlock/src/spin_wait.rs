// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::hint;

/// A bounded spin-then-yield wait policy.
///
/// The first [`limit`] calls to [`SpinWait::spin`] busy-poll with a single
/// [spin loop hint] each, which is cheap when the condition being waited on
/// flips within a few hundred cycles. Once that budget is used up every further
/// call yields the current thread back to the scheduler instead, so long waits
/// don't burn a whole core and don't pay the latency of a fixed sleep either.
///
/// Without the `std` feature there is no scheduler to yield to and the second
/// phase degrades to spin loop hints.
///
/// [`limit`]: SpinWait::with_spin_limit
/// [spin loop hint]: hint::spin_loop
#[derive(Debug, Copy, Clone)]
pub struct SpinWait {
    spins: u32,
    limit: u32,
}

// === impl SpinWait ===

impl SpinWait {
    /// The default number of busy polls before falling back to yielding.
    pub const DEFAULT_SPIN_LIMIT: u32 = 100;

    /// Returns a new wait policy that spins [`Self::DEFAULT_SPIN_LIMIT`] times
    /// before yielding.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_spin_limit(Self::DEFAULT_SPIN_LIMIT)
    }

    /// Returns a new wait policy that spins `limit` times before yielding.
    ///
    /// A limit of zero yields right away.
    #[must_use]
    pub const fn with_spin_limit(limit: u32) -> Self {
        Self { spins: 0, limit }
    }

    /// Returns `true` once the spin budget is used up and [`SpinWait::spin`]
    /// yields instead of busy-polling.
    #[inline]
    #[must_use]
    pub fn is_yielding(&self) -> bool {
        self.spins >= self.limit
    }

    /// Waits a little.
    ///
    /// This should be called once per failed check of the condition being
    /// waited on.
    #[inline]
    pub fn spin(&mut self) {
        if self.spins < self.limit {
            self.spins += 1;

            if self.spins == self.limit {
                tracing::trace!(spins = self.limit, "spin budget used up, yielding from now on");
            }

            // Loom only makes progress in a spin loop if the thread yields to the model.
            // See https://github.com/tokio-rs/loom/issues/162#issuecomment-665128979
            #[cfg(loom)]
            crate::loom::thread::yield_now();

            hint::spin_loop();
        } else {
            yield_now();
        }
    }

    /// Calls [`SpinWait::spin`] until `cond` returns `true`.
    #[inline]
    pub fn wait_until(&mut self, mut cond: impl FnMut() -> bool) {
        while !cond() {
            self.spin();
        }
    }

    /// Starts the spin phase over.
    #[inline]
    pub fn reset(&mut self) {
        self.spins = 0;
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn yield_now() {
    cfg_if::cfg_if! {
        if #[cfg(any(loom, feature = "std"))] {
            crate::loom::thread::yield_now();
        } else {
            hint::spin_loop();
        }
    }
}
