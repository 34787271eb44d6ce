// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Core
//!
//! This module ties the kernel together: it owns the scheduler singleton,
//! performs low-level initialization and exposes the two entry points the
//! architecture port's interrupt handlers call into.
//!
//! # Startup
//!
//! ```rust,ignore
//! tickos::kernel::init();          // scheduler, main + idle + timer threads
//! // create and start application threads...
//! tickos::kernel::start();         // hands the processor to the scheduler
//! ```
//!
//! The singleton is created by [`init`] before any thread runs; internally
//! every component receives the scheduler by explicit reference rather than
//! reaching for a global.

pub mod arch;
pub mod capi;
pub mod debug;
pub(crate) mod list;
pub mod memory;
pub(crate) mod sched;
pub mod signals;
pub mod sync;
pub mod thread;
pub mod tick;
pub mod timer;

#[cfg(test)]
mod tests;

use crate::config::{
    IDLE_THREAD_STACK_SIZE, MAIN_THREAD_PRIORITY, MAIN_THREAD_STACK_SIZE,
    TIMER_THREAD_STACK_SIZE,
};
use crate::kernel::sched::{BlockOutcome, Scheduler};
use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::thread::{Stack, ThreadRoutine, PRIORITY_IDLE, PRIORITY_TIMER};
use crate::log_info;
use crate::status::{self, Status};

/// The scheduler singleton
///
/// The spin mutex provides interior mutability for the one kernel object;
/// it is uncontended by construction, because every access happens inside
/// the interrupt-masking critical section on a single core.
static SCHEDULER: spin::Mutex<Option<Scheduler>> = spin::Mutex::new(None);

/// Run `f` with exclusive access to the scheduler
///
/// Must be called inside an [`InterruptMaskingLock`] critical section.
/// Calling before [`init`] is an unrecoverable usage error.
pub(crate) fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    let mut guard = SCHEDULER.lock();
    match guard.as_mut() {
        Some(scheduler) => f(scheduler),
        None => panic!("kernel not initialized"),
    }
}

/// Whether [`init`] has completed
pub fn is_initialized() -> bool {
    SCHEDULER.lock().is_some()
}

/// Resolve a possibly-blocking operation's result
///
/// For a blocked outcome, the requested context switch runs as soon as the
/// caller's interrupt-masking guard is released; once the thread resumes,
/// the wake cause is read from its control block slot.
pub(crate) fn finish_blocking(outcome: BlockOutcome) -> Status {
    match outcome {
        BlockOutcome::Complete(value) => value,
        BlockOutcome::Blocked(index) => {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.take_unblock_value(index))
        }
    }
}

/// Low-level kernel initialization
///
/// Creates the scheduler, adopts the startup context as the main thread
/// (priority [`MAIN_THREAD_PRIORITY`]), and creates the idle thread
/// (priority 0) and the software-timer thread (priority 255). Must run
/// before any other kernel call; returns [`EINVAL`](status::EINVAL) if the
/// kernel is already initialized.
pub fn init() -> Status {
    let _lock = InterruptMaskingLock::new();
    let mut guard = SCHEDULER.lock();
    if guard.is_some() {
        return status::EINVAL;
    }

    let mut scheduler = Scheduler::new();

    let main = scheduler.add_thread(
        Stack::with_size(MAIN_THREAD_STACK_SIZE),
        MAIN_THREAD_PRIORITY,
        ThreadRoutine::Main,
    );
    scheduler.adopt_main_thread(main);

    let idle = scheduler.add_thread(
        Stack::with_size(IDLE_THREAD_STACK_SIZE),
        PRIORITY_IDLE,
        ThreadRoutine::Idle,
    );
    scheduler.set_idle_thread(idle);

    let timer = scheduler.add_thread(
        Stack::with_size(TIMER_THREAD_STACK_SIZE),
        PRIORITY_TIMER,
        ThreadRoutine::Timer,
    );
    scheduler.start_thread(timer);

    *guard = Some(scheduler);
    drop(guard);

    log_info!("kernel initialized: main priority {}", MAIN_THREAD_PRIORITY);
    status::OK
}

/// Start scheduling
///
/// Hands the processor to the architecture port for the first context
/// switch. Requires [`init`]; does not return.
pub fn start() -> ! {
    {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            assert!(scheduler.thread_count() >= 2, "kernel started without idle thread");
            assert_eq!(
                scheduler.group_size(),
                scheduler.thread_count(),
                "thread group out of sync with thread table"
            );
        });
        log_info!("scheduler starting");
    }
    arch::start_scheduling()
}

/// Periodic tick entry point
///
/// The architecture port's tick interrupt service routine calls this once
/// per tick.
pub fn tick_interrupt_handler() {
    let _lock = InterruptMaskingLock::new();
    with_scheduler(|scheduler| scheduler.tick_interrupt_handler());
}

/// Context-switch entry point
///
/// The architecture port's context-switch interrupt calls this with the
/// outgoing thread's saved stack pointer and loads the returned one.
/// Interrupt masking is already in effect in that context.
pub fn switch_context(stack_pointer: usize) -> usize {
    with_scheduler(|scheduler| scheduler.switch_context(stack_pointer))
}
