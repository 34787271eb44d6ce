// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Signals
//!
//! This module provides the minimal pending-signal support the scheduler
//! requires: a per-thread set of pending signals that can be generated from
//! another thread (or an interrupt) and accepted by the target. Generating a
//! signal for a blocked thread wakes it early with [`EINTR`].
//!
//! There are no handlers, no queued values and no delivery semantics beyond
//! the pending mask; those are outside the kernel core.
//!
//! [`EINTR`]: crate::status::EINTR

use bitflags::bitflags;

bitflags! {
    /// A set of the 32 signal numbers the kernel distinguishes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalSet: u32 {}
}

impl SignalSet {
    /// Highest valid signal number
    pub const MAX_SIGNAL: u8 = 31;

    /// The set containing only `signal`, `None` if out of range
    pub fn single(signal: u8) -> Option<SignalSet> {
        if signal > Self::MAX_SIGNAL {
            return None;
        }
        Some(SignalSet::from_bits_retain(1 << signal))
    }
}

/// Per-thread signal state
///
/// Embedded in every thread control block.
#[derive(Debug)]
pub(crate) struct SignalsReceiver {
    pending: SignalSet,
}

impl SignalsReceiver {
    pub(crate) const fn new() -> Self {
        Self { pending: SignalSet::empty() }
    }

    /// Mark `signal` pending
    pub(crate) fn pend(&mut self, signal: u8) {
        if let Some(set) = SignalSet::single(signal) {
            self.pending |= set;
        }
    }

    /// Whether any signal is pending
    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Return and clear the pending set
    pub(crate) fn accept_pending(&mut self) -> SignalSet {
        let pending = self.pending;
        self.pending = SignalSet::empty();
        pending
    }
}

// ============================================================================
// Tests
// ============================================================================
