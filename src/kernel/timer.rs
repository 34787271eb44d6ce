// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Software Timers
//!
//! This module provides the software timer engine: a deadline-ordered queue
//! of timer control blocks driven by the tick interrupt, plus the dedicated
//! highest-priority thread that dispatches the callbacks.
//!
//! # Design
//!
//! - **Deadline-ordered**: armed timers are kept sorted by deadline
//!   ascending; the tick handler only inspects the head
//! - **Thread-context callbacks**: the tick interrupt never calls user
//!   code; it moves due timers to a fired list and wakes the timer thread,
//!   which invokes the callbacks with interrupts enabled
//! - **One-shot or periodic**: a period of zero means one-shot; a periodic
//!   timer re-arms itself at `deadline + period` when it fires
//!
//! Callbacks run at the timer thread's priority (the highest); they must be
//! short and must not block.

use alloc::vec::Vec;

use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::tick::{Duration, TickClock, TimePoint};
use crate::kernel::{finish_blocking, with_scheduler};
use crate::status::{self, Status};

/// Identifier of a registered timer control block
pub(crate) type TimerId = usize;

/// A timer ready for callback dispatch
#[derive(Debug, Clone, Copy)]
pub(crate) struct FiredTimer {
    pub(crate) callback: fn(usize),
    pub(crate) argument: usize,
}

/// One timer control block
#[derive(Debug)]
struct TimerControlBlock {
    callback: fn(usize),
    argument: usize,
    deadline: i64,
    /// 0 = one-shot
    period: i64,
    running: bool,
}

/// The software timer engine, owned by the scheduler
#[derive(Debug, Default)]
pub(crate) struct TimerEngine {
    timers: Vec<TimerControlBlock>,
    /// Armed timer ids, sorted by deadline ascending (FIFO among equals)
    armed: Vec<TimerId>,
    /// Due timers awaiting dispatch by the timer thread
    fired: Vec<TimerId>,
}

impl TimerEngine {
    pub(crate) fn new() -> Self {
        Self { timers: Vec::new(), armed: Vec::new(), fired: Vec::new() }
    }

    /// Register a new timer control block; it starts out stopped
    pub(crate) fn register(&mut self, callback: fn(usize), argument: usize) -> TimerId {
        self.timers.push(TimerControlBlock {
            callback,
            argument,
            deadline: 0,
            period: 0,
            running: false,
        });
        self.timers.len() - 1
    }

    fn insert_armed(&mut self, id: TimerId) {
        let deadline = self.timers[id].deadline;
        let position = self
            .armed
            .iter()
            .position(|&armed| self.timers[armed].deadline > deadline)
            .unwrap_or(self.armed.len());
        self.armed.insert(position, id);
    }

    /// Arm a timer: one-shot when `period` is zero, periodic otherwise
    ///
    /// Restarting a running timer moves it to the new deadline.
    pub(crate) fn start(&mut self, id: TimerId, deadline: TimePoint, period: Duration) -> Status {
        if id >= self.timers.len() || period.as_ticks() < 0 {
            return status::EINVAL;
        }
        self.disarm(id);
        let timer = &mut self.timers[id];
        timer.deadline = deadline.as_ticks();
        timer.period = period.as_ticks();
        timer.running = true;
        self.insert_armed(id);
        status::OK
    }

    /// Stop a timer; a stopped timer's callback will not run
    pub(crate) fn stop(&mut self, id: TimerId) -> Status {
        if id >= self.timers.len() {
            return status::EINVAL;
        }
        self.disarm(id);
        self.timers[id].running = false;
        status::OK
    }

    fn disarm(&mut self, id: TimerId) {
        self.armed.retain(|&armed| armed != id);
        self.fired.retain(|&fired| fired != id);
    }

    pub(crate) fn is_running(&self, id: TimerId) -> bool {
        self.timers.get(id).map(|timer| timer.running).unwrap_or(false)
    }

    /// Move timers whose deadline has been reached to the fired list
    ///
    /// Called from the tick interrupt handler. Returns whether any timer
    /// became due, so the caller can wake the timer thread.
    pub(crate) fn process_tick(&mut self, now: i64) -> bool {
        let mut any = false;
        while let Some(&head) = self.armed.first() {
            if self.timers[head].deadline > now {
                break;
            }
            self.armed.remove(0);
            self.fired.push(head);
            any = true;
        }
        any
    }

    /// Drain the fired list for dispatch, re-arming periodic timers
    pub(crate) fn take_fired(&mut self) -> Vec<FiredTimer> {
        let fired = core::mem::take(&mut self.fired);
        let mut dispatch = Vec::with_capacity(fired.len());
        for id in fired {
            let timer = &self.timers[id];
            if !timer.running {
                continue;
            }
            dispatch.push(FiredTimer { callback: timer.callback, argument: timer.argument });
            if timer.period > 0 {
                let next = timer.deadline + timer.period;
                self.timers[id].deadline = next;
                self.insert_armed(id);
            } else {
                self.timers[id].running = false;
            }
        }
        dispatch
    }
}

/// ============================================================================
/// Timer Thread
/// ============================================================================

/// Body of the dedicated software-timer thread
///
/// Runs at the highest priority: parks until the tick handler reports due
/// timers, then dispatches their callbacks outside the critical section.
pub(crate) fn timer_thread_function() -> ! {
    loop {
        let fired = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.take_fired_timers())
        };

        if fired.is_empty() {
            let outcome = {
                let _lock = InterruptMaskingLock::new();
                with_scheduler(|scheduler| scheduler.timer_thread_wait())
            };
            let _ = finish_blocking(outcome);
            continue;
        }

        for timer in fired {
            (timer.callback)(timer.argument);
        }
    }
}

/// ============================================================================
/// Public Timer Handle
/// ============================================================================

/// A software timer
///
/// Holds a callback and an opaque argument; starting it schedules the
/// callback to run in the timer thread at the given deadline, once or
/// periodically.
pub struct SoftwareTimer {
    id: spin::Mutex<Option<TimerId>>,
    callback: fn(usize),
    argument: usize,
}

impl SoftwareTimer {
    /// Create a stopped timer
    pub const fn new(callback: fn(usize), argument: usize) -> Self {
        Self { id: spin::Mutex::new(None), callback, argument }
    }

    fn with_id<R>(&self, f: impl FnOnce(&mut crate::kernel::sched::Scheduler, TimerId) -> R) -> R {
        let _lock = InterruptMaskingLock::new();
        let mut id = self.id.lock();
        with_scheduler(|scheduler| {
            let id = *id.get_or_insert_with(|| {
                scheduler.timer_register(self.callback, self.argument)
            });
            f(scheduler, id)
        })
    }

    /// Arm the timer to fire once at `deadline`
    pub fn start_until(&self, deadline: TimePoint) -> Status {
        self.with_id(|scheduler, id| scheduler.timer_start(id, deadline, Duration::ZERO))
    }

    /// Arm the timer to fire once after at least `delay`
    pub fn start_for(&self, delay: Duration) -> Status {
        self.start_until(TickClock::now() + delay + Duration::from_ticks(1))
    }

    /// Arm the timer to fire at `first` and every `period` after that
    pub fn start_periodic(&self, first: TimePoint, period: Duration) -> Status {
        if period.as_ticks() <= 0 {
            return status::EINVAL;
        }
        self.with_id(|scheduler, id| scheduler.timer_start(id, first, period))
    }

    /// Stop the timer
    pub fn stop(&self) -> Status {
        self.with_id(|scheduler, id| scheduler.timer_stop(id))
    }

    /// Whether the timer is armed (or its callback pending)
    pub fn is_running(&self) -> bool {
        self.with_id(|scheduler, id| scheduler.timer_is_running(id))
    }
}

// ============================================================================
// Tests
// ============================================================================
