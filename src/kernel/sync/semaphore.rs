// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Counting Semaphore
//!
//! A semaphore holds a non-negative count. `wait` takes one unit or blocks;
//! `post` wakes the highest-priority waiter or returns one unit, failing
//! with [`EOVERFLOW`](crate::status::EOVERFLOW) at the maximum value.
//!
//! Waiters are queued by descending effective priority, FIFO within a
//! priority; `post` always wakes the head. The invariant `value > 0 implies
//! no waiters` holds at every stable point because the compound
//! test-and-modify runs inside the interrupt-masking critical section.

use crate::kernel::list::ThreadList;
use crate::kernel::sched::{BlockOutcome, Scheduler};
use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::thread::ThreadState;
use crate::kernel::tick::{Duration, TickClock, TimePoint};
use crate::kernel::{finish_blocking, with_scheduler};
use crate::status::{self, Status};

struct SemaphoreInner {
    value: u32,
    max_value: u32,
    queue: Option<ThreadList>,
}

/// Counting semaphore
///
/// Constructible in a `static`; its lifetime is unrelated to any thread.
pub struct Semaphore {
    inner: spin::Mutex<SemaphoreInner>,
}

impl Semaphore {
    /// Create a semaphore with `initial` units and no practical maximum
    pub const fn new(initial: u32) -> Self {
        Self::with_max_value(initial, u32::MAX)
    }

    /// Create a semaphore with `initial` units, capped at `max_value`
    ///
    /// `max_value` is raised to 1 if zero; `initial` is clamped to the
    /// maximum.
    pub const fn with_max_value(initial: u32, max_value: u32) -> Self {
        let max_value = if max_value == 0 { 1 } else { max_value };
        let value = if initial > max_value { max_value } else { initial };
        Self { inner: spin::Mutex::new(SemaphoreInner { value, max_value, queue: None }) }
    }

    /// Current count
    pub fn value(&self) -> u32 {
        let _lock = InterruptMaskingLock::new();
        self.inner.lock().value
    }

    /// Take one unit, blocking until one is available
    ///
    /// Returns 0 on success or [`EINTR`](status::EINTR) if interrupted by a
    /// signal.
    pub fn wait(&self) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.wait_with(scheduler))
        };
        finish_blocking(outcome)
    }

    /// Take one unit without blocking
    ///
    /// Returns [`EAGAIN`](status::EAGAIN) when no unit is available.
    pub fn try_wait(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.try_wait_with(scheduler))
    }

    /// Take one unit, blocking for at most `duration`
    pub fn try_wait_for(&self, duration: Duration) -> Status {
        self.try_wait_until(TickClock::now() + duration + Duration::from_ticks(1))
    }

    /// Take one unit, blocking until `deadline` at the latest
    ///
    /// Returns [`ETIMEDOUT`](status::ETIMEDOUT) if the deadline passes
    /// first.
    pub fn try_wait_until(&self, deadline: TimePoint) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.try_wait_until_with(scheduler, deadline))
        };
        finish_blocking(outcome)
    }

    /// Return one unit, waking the highest-priority waiter if any
    ///
    /// Returns [`EOVERFLOW`](status::EOVERFLOW) if the count is already at
    /// the maximum and no thread is waiting.
    pub fn post(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.post_with(scheduler))
    }

    /// ========================================================================
    /// Critical-section bodies
    /// ========================================================================

    fn queue(&self, inner: &mut SemaphoreInner, scheduler: &mut Scheduler) -> ThreadList {
        *inner
            .queue
            .get_or_insert_with(|| scheduler.new_blocked_list(ThreadState::BlockedOnSemaphore))
    }

    pub(crate) fn wait_with(&self, scheduler: &mut Scheduler) -> BlockOutcome {
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            return BlockOutcome::Complete(status::OK);
        }
        let queue = self.queue(&mut inner, scheduler);
        drop(inner);
        scheduler.block(queue, None)
    }

    pub(crate) fn try_wait_with(&self, scheduler: &mut Scheduler) -> Status {
        let _ = scheduler;
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            status::OK
        } else {
            status::EAGAIN
        }
    }

    pub(crate) fn try_wait_until_with(
        &self,
        scheduler: &mut Scheduler,
        deadline: TimePoint,
    ) -> BlockOutcome {
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            return BlockOutcome::Complete(status::OK);
        }
        let queue = self.queue(&mut inner, scheduler);
        drop(inner);
        scheduler.block_until(queue, deadline, None)
    }

    pub(crate) fn post_with(&self, scheduler: &mut Scheduler) -> Status {
        let mut inner = self.inner.lock();
        if let Some(queue) = inner.queue {
            if let Some(waiter) = scheduler.list_front(queue) {
                scheduler.unblock(waiter, status::OK);
                return status::OK;
            }
        }
        if inner.value >= inner.max_value {
            return status::EOVERFLOW;
        }
        inner.value += 1;
        status::OK
    }
}

// ============================================================================
// Tests
// ============================================================================
