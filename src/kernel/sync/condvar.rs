// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Condition Variable
//!
//! Wait / notify on top of an associated [`Mutex`]. The unlock and the
//! transfer to the blocked list happen inside one interrupt-masking
//! critical section, so a notification between them cannot be lost; the
//! mutex is re-acquired before any wait variant returns.
//!
//! A wake-up caused by a signal ([`EINTR`](crate::status::EINTR)) is
//! reported as a spurious wake: the wait returns 0 with the mutex held and
//! the caller re-checks its predicate.

use crate::kernel::list::{ThreadIndex, ThreadList};
use crate::kernel::sched::{BlockOutcome, Scheduler};
use crate::kernel::sync::{InterruptMaskingLock, Mutex};
use crate::kernel::thread::ThreadState;
use crate::kernel::tick::{Duration, TickClock, TimePoint};
use crate::kernel::with_scheduler;
use crate::status::{self, Status};

struct ConditionVariableInner {
    queue: Option<ThreadList>,
}

/// Outcome of the critical section of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitStep {
    /// The associated mutex was not released (e.g. not owned)
    UnlockFailed(Status),
    /// The wait completed without blocking (past deadline, pending signal)
    Immediate(Status),
    /// The thread was blocked on the condition variable
    Blocked(ThreadIndex),
}

/// Condition variable
///
/// Constructible in a `static`.
pub struct ConditionVariable {
    inner: spin::Mutex<ConditionVariableInner>,
}

impl ConditionVariable {
    pub const fn new() -> Self {
        Self { inner: spin::Mutex::new(ConditionVariableInner { queue: None }) }
    }

    /// Wait for a notification
    ///
    /// The caller must hold `mutex`; it is released for the duration of the
    /// wait and re-acquired before returning. Returns 0 on notification or
    /// spurious wake, or the error from the failed unlock/relock.
    pub fn wait(&self, mutex: &Mutex) -> Status {
        let step = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.wait_step(scheduler, mutex, None))
        };
        self.finish_wait(mutex, step)
    }

    /// Wait for a notification for at most `duration`
    pub fn wait_for(&self, mutex: &Mutex, duration: Duration) -> Status {
        self.wait_until(mutex, TickClock::now() + duration + Duration::from_ticks(1))
    }

    /// Wait for a notification until `deadline` at the latest
    ///
    /// Returns [`ETIMEDOUT`](status::ETIMEDOUT) if the deadline passes
    /// first; the mutex is re-acquired in every case.
    pub fn wait_until(&self, mutex: &Mutex, deadline: TimePoint) -> Status {
        let step = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.wait_step(scheduler, mutex, Some(deadline)))
        };
        self.finish_wait(mutex, step)
    }

    /// Wake the highest-priority waiter, if any
    pub fn notify_one(&self) {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.notify_one_with(scheduler));
    }

    /// Wake every waiter
    pub fn notify_all(&self) {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.notify_all_with(scheduler));
    }

    /// ========================================================================
    /// Critical-section bodies
    /// ========================================================================

    fn queue(&self, scheduler: &mut Scheduler) -> ThreadList {
        let mut inner = self.inner.lock();
        *inner
            .queue
            .get_or_insert_with(|| {
                scheduler.new_blocked_list(ThreadState::BlockedOnConditionVariable)
            })
    }

    /// Atomically release the mutex and block on the condition variable
    pub(crate) fn wait_step(
        &self,
        scheduler: &mut Scheduler,
        mutex: &Mutex,
        deadline: Option<TimePoint>,
    ) -> WaitStep {
        let unlocked = mutex.unlock_with(scheduler);
        if unlocked != status::OK {
            return WaitStep::UnlockFailed(unlocked);
        }
        let queue = self.queue(scheduler);
        let outcome = match deadline {
            None => scheduler.block(queue, None),
            Some(deadline) => scheduler.block_until(queue, deadline, None),
        };
        match outcome {
            BlockOutcome::Complete(value) => WaitStep::Immediate(value),
            BlockOutcome::Blocked(index) => WaitStep::Blocked(index),
        }
    }

    fn finish_wait(&self, mutex: &Mutex, step: WaitStep) -> Status {
        let wait_value = match step {
            WaitStep::UnlockFailed(error) => return error,
            WaitStep::Immediate(value) => value,
            WaitStep::Blocked(index) => {
                // On hardware the context switch runs here; the slot holds
                // the wake cause once the thread resumes.
                let _lock = InterruptMaskingLock::new();
                with_scheduler(|scheduler| scheduler.take_unblock_value(index))
            }
        };
        let relocked = mutex.lock();
        Self::resolve(relocked, wait_value)
    }

    /// Combine the relock result with the wait result; a signal wake is a
    /// spurious wake, not an error
    pub(crate) fn resolve(relocked: Status, wait_value: Status) -> Status {
        if relocked != status::OK {
            return relocked;
        }
        if wait_value == status::EINTR {
            return status::OK;
        }
        wait_value
    }

    pub(crate) fn notify_one_with(&self, scheduler: &mut Scheduler) {
        let queue = self.inner.lock().queue;
        if let Some(queue) = queue {
            if let Some(waiter) = scheduler.list_front(queue) {
                scheduler.unblock(waiter, status::OK);
            }
        }
    }

    pub(crate) fn notify_all_with(&self, scheduler: &mut Scheduler) {
        let queue = self.inner.lock().queue;
        if let Some(queue) = queue {
            while let Some(waiter) = scheduler.list_front(queue) {
                scheduler.unblock(waiter, status::OK);
            }
        }
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
