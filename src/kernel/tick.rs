// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Tick Clock
//!
//! This module provides the system clock: a steady 64-bit counter advanced
//! by the periodic tick interrupt at [`TICK_FREQUENCY`] Hz. It is the
//! fundamental unit of sleep and timeout resolution.
//!
//! # Design
//!
//! - **Signed ticks**: durations and time points are `i64` ticks so that
//!   subtracting time points is always safe
//! - **Monotonic**: the only mutator is the tick interrupt handler
//! - **Atomic reads**: `TickClock::now()` reads the counter inside the
//!   interrupt-masking critical section, so a tick cannot tear the value

use core::ops::{Add, AddAssign, Sub, SubAssign};

use crate::config::TICK_FREQUENCY;

/// A span of time, measured in ticks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Duration {
    /// Zero-length duration
    pub const ZERO: Duration = Duration(0);

    /// Create a duration from a raw tick count
    pub const fn from_ticks(ticks: i64) -> Self {
        Duration(ticks)
    }

    /// Create a duration from seconds, rounding up to whole ticks
    pub const fn from_secs(secs: i64) -> Self {
        Duration(secs * TICK_FREQUENCY as i64)
    }

    /// Create a duration from milliseconds, rounding up to whole ticks
    pub const fn from_millis(millis: i64) -> Self {
        Duration(div_ceil(millis * TICK_FREQUENCY as i64, 1_000))
    }

    /// Create a duration from microseconds, rounding up to whole ticks
    pub const fn from_micros(micros: i64) -> Self {
        Duration(div_ceil(micros * TICK_FREQUENCY as i64, 1_000_000))
    }

    /// Raw tick count
    pub const fn as_ticks(self) -> i64 {
        self.0
    }

    /// Duration in whole milliseconds, truncated
    pub const fn as_millis(self) -> i64 {
        self.0 * 1_000 / TICK_FREQUENCY as i64
    }
}

/// Rounded-up division for non-negative numerators
const fn div_ceil(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

/// A point in time, measured in ticks since scheduler start
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(i64);

impl TimePoint {
    /// The epoch: the instant the scheduler was started
    pub const EPOCH: TimePoint = TimePoint(0);

    /// Create a time point from a raw tick count
    pub const fn from_ticks(ticks: i64) -> Self {
        TimePoint(ticks)
    }

    /// Raw tick count since the epoch
    pub const fn as_ticks(self) -> i64 {
        self.0
    }

    /// Duration elapsed since another (earlier) time point
    pub const fn since(self, earlier: TimePoint) -> Duration {
        Duration(self.0 - earlier.0)
    }
}

impl Add<Duration> for TimePoint {
    type Output = TimePoint;

    fn add(self, rhs: Duration) -> TimePoint {
        TimePoint(self.0 + rhs.as_ticks())
    }
}

impl Sub<Duration> for TimePoint {
    type Output = TimePoint;

    fn sub(self, rhs: Duration) -> TimePoint {
        TimePoint(self.0 - rhs.as_ticks())
    }
}

impl Sub for TimePoint {
    type Output = Duration;

    fn sub(self, rhs: TimePoint) -> Duration {
        Duration::from_ticks(self.0 - rhs.0)
    }
}

/// The system clock
///
/// A steady clock whose period is `1 / TICK_FREQUENCY` seconds. Reads are
/// performed under interrupt masking so they are atomic with respect to the
/// tick interrupt service routine, including on 32-bit machines where a
/// 64-bit counter read would otherwise tear.
pub struct TickClock;

impl TickClock {
    /// Clock period, ticks per second
    pub const FREQUENCY: u32 = TICK_FREQUENCY;

    /// Current time
    ///
    /// Must not be called before [`crate::kernel::init`].
    pub fn now() -> TimePoint {
        let _lock = crate::kernel::sync::InterruptMaskingLock::new();
        crate::kernel::with_scheduler(|scheduler| scheduler.tick_count())
    }
}

// ============================================================================
// Tests
// ============================================================================
