// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Once Flag
//!
//! At-most-once execution of an initializer under contention. The first
//! thread through `call_once` runs the function; racing threads block until
//! it finishes and then observe the completed state. The initializer runs
//! with the interrupt mask restored, so it may take as long as it needs.

use crate::kernel::list::ThreadList;
use crate::kernel::sched::{BlockOutcome, Scheduler};
use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::thread::ThreadState;
use crate::kernel::{finish_blocking, with_scheduler};
use crate::status::{self, Status};

struct OnceFlagInner {
    done: bool,
    /// Present while the initializer is executing; holds the blocked racers
    in_progress: Option<ThreadList>,
}

/// Decision taken inside the critical section of `call_once`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnceStep {
    /// The initializer already ran
    AlreadyDone,
    /// Another thread is running the initializer; we blocked
    Wait(BlockOutcome),
    /// The calling thread claimed the execution
    Run,
}

/// Once flag
///
/// Constructible in a `static`.
pub struct OnceFlag {
    inner: spin::Mutex<OnceFlagInner>,
}

impl OnceFlag {
    pub const fn new() -> Self {
        Self { inner: spin::Mutex::new(OnceFlagInner { done: false, in_progress: None }) }
    }

    /// Whether the initializer has completed
    pub fn is_done(&self) -> bool {
        let _lock = InterruptMaskingLock::new();
        self.inner.lock().done
    }

    /// Execute `function` exactly once across all threads racing on this
    /// flag
    ///
    /// Threads arriving while the initializer runs block until it is done;
    /// every caller returns only after the initializer has completed.
    pub fn call_once(&self, function: fn()) -> Status {
        loop {
            let step = {
                let _lock = InterruptMaskingLock::new();
                with_scheduler(|scheduler| self.begin_with(scheduler))
            };
            match step {
                OnceStep::AlreadyDone => return status::OK,
                OnceStep::Wait(outcome) => {
                    let _ = finish_blocking(outcome);
                    // Re-check: the initializer may have completed, or the
                    // wake may be stale.
                }
                OnceStep::Run => {
                    // Interrupt masking is not held here; the functor may
                    // block or take its time.
                    function();
                    let _lock = InterruptMaskingLock::new();
                    with_scheduler(|scheduler| self.complete_with(scheduler));
                    return status::OK;
                }
            }
        }
    }

    /// ========================================================================
    /// Critical-section bodies
    /// ========================================================================

    pub(crate) fn begin_with(&self, scheduler: &mut Scheduler) -> OnceStep {
        let mut inner = self.inner.lock();
        if inner.done {
            return OnceStep::AlreadyDone;
        }
        if let Some(list) = inner.in_progress {
            drop(inner);
            return OnceStep::Wait(scheduler.block(list, None));
        }
        inner.in_progress = Some(scheduler.new_blocked_list(ThreadState::BlockedOnOnceFlag));
        OnceStep::Run
    }

    pub(crate) fn complete_with(&self, scheduler: &mut Scheduler) {
        let mut inner = self.inner.lock();
        inner.done = true;
        let list = inner.in_progress.take().expect("once flag completed without a run");
        drop(inner);
        while let Some(waiter) = scheduler.list_front(list) {
            scheduler.unblock(waiter, status::OK);
        }
        scheduler.dispose_list(list);
    }
}

impl Default for OnceFlag {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::sched::test_support::{scheduler_with_main, spawn, switch_to};

    #[test]
    fn test_first_caller_runs() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let once = OnceFlag::new();

        assert_eq!(once.begin_with(&mut scheduler), OnceStep::Run);
        once.complete_with(&mut scheduler);
        assert_eq!(once.begin_with(&mut scheduler), OnceStep::AlreadyDone);
    }

    #[test]
    fn test_racers_block_until_completion() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let once = OnceFlag::new();

        let runner = spawn(&mut scheduler, 50);
        let racer_a = spawn(&mut scheduler, 50);
        let racer_b = spawn(&mut scheduler, 60);

        switch_to(&mut scheduler, runner);
        assert_eq!(once.begin_with(&mut scheduler), OnceStep::Run);

        switch_to(&mut scheduler, racer_a);
        assert!(matches!(once.begin_with(&mut scheduler), OnceStep::Wait(_)));
        assert_eq!(scheduler.tcb(racer_a).state, ThreadState::BlockedOnOnceFlag);

        switch_to(&mut scheduler, racer_b);
        assert!(matches!(once.begin_with(&mut scheduler), OnceStep::Wait(_)));

        // The runner finishes: all racers wake and see the done state.
        switch_to(&mut scheduler, runner);
        once.complete_with(&mut scheduler);
        assert_eq!(scheduler.tcb(racer_a).state, ThreadState::Runnable);
        assert_eq!(scheduler.tcb(racer_b).state, ThreadState::Runnable);

        switch_to(&mut scheduler, racer_a);
        assert_eq!(once.begin_with(&mut scheduler), OnceStep::AlreadyDone);
    }

    #[test]
    fn test_signal_does_not_wake_once_waiter() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let once = OnceFlag::new();

        let runner = spawn(&mut scheduler, 50);
        let racer = spawn(&mut scheduler, 50);

        switch_to(&mut scheduler, runner);
        once.begin_with(&mut scheduler);
        switch_to(&mut scheduler, racer);
        once.begin_with(&mut scheduler);

        // Once-flag waits are not interruptible; the retry loop depends on
        // waking only at completion.
        scheduler.generate_signal(racer, 1);
        assert_eq!(scheduler.tcb(racer).state, ThreadState::BlockedOnOnceFlag);

        switch_to(&mut scheduler, runner);
        once.complete_with(&mut scheduler);
        assert_eq!(scheduler.tcb(racer).state, ThreadState::Runnable);
    }
}
