// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Scenario Tests
//!
//! End-to-end scenarios driven against a private scheduler instance, with
//! context switches performed explicitly where a port would perform them,
//! plus smoke tests of the public API against the global kernel singleton.

use alloc::vec::Vec;

use crate::kernel::sched::test_support::{scheduler_with_main, spawn, switch_to};
use crate::kernel::sync::{Mutex, MutexProtocol, MutexType, Semaphore};
use crate::kernel::thread::{RoundRobinQuantum, ThreadState};
use crate::kernel::tick::Duration;
use crate::status;

/// Priority preemption: a high-priority thread waking from sleep preempts
/// the busy low-priority thread within one tick.
#[test]
fn test_scenario_priority_preemption() {
    let (mut scheduler, low) = scheduler_with_main(10);
    let high = spawn(&mut scheduler, 100);

    // The new high-priority thread preempts immediately.
    assert!(scheduler.switch_requested());
    scheduler.switch_context(0x1000);
    assert_eq!(scheduler.current_index(), high);
    scheduler.assert_scheduling_invariants();

    // The high thread sleeps 100 ticks; the low thread runs busy.
    let deadline = scheduler.tick_count() + Duration::from_ticks(100);
    scheduler.sleep_until(deadline);
    scheduler.switch_context(0x2000);
    assert_eq!(scheduler.current_index(), low);

    for _ in 0..99 {
        scheduler.tick_interrupt_handler();
        assert_eq!(scheduler.current_index(), low);
    }
    assert!(!scheduler.switch_requested());

    // Deadline tick: the high thread is runnable again and preempts.
    scheduler.tick_interrupt_handler();
    assert!(scheduler.switch_requested());
    scheduler.switch_context(0x3000);
    assert_eq!(scheduler.current_index(), high);

    // The low thread went back to runnable, not terminated.
    assert_eq!(scheduler.tcb(low).state, ThreadState::Runnable);
    scheduler.assert_scheduling_invariants();
}

/// Round-robin fairness: four equal-priority busy threads each receive the
/// same number of ticks over many quanta.
#[test]
fn test_scenario_round_robin_fairness() {
    let (mut scheduler, _main) = scheduler_with_main(5);
    let workers = [
        spawn(&mut scheduler, 50),
        spawn(&mut scheduler, 50),
        spawn(&mut scheduler, 50),
        spawn(&mut scheduler, 50),
    ];
    scheduler.switch_context(0x1000);

    let quantum = RoundRobinQuantum::INITIAL as usize;
    let rounds = 10;
    let mut ticks_per_worker = [0usize; 4];

    for _ in 0..(workers.len() * quantum * rounds) {
        let current = scheduler.current_index();
        let position = workers.iter().position(|&worker| worker == current).unwrap();
        ticks_per_worker[position] += 1;

        scheduler.tick_interrupt_handler();
        if scheduler.switch_requested() {
            scheduler.switch_context(0x2000);
        }
    }

    let max = *ticks_per_worker.iter().max().unwrap();
    let min = *ticks_per_worker.iter().min().unwrap();
    assert!(max - min <= quantum, "unfair tick distribution: {:?}", ticks_per_worker);
    assert_eq!(ticks_per_worker.iter().sum::<usize>(), workers.len() * quantum * rounds);
}

/// Priority inheritance: the boosted owner shuts out the middle-priority
/// thread until it releases the lock.
#[test]
fn test_scenario_priority_inheritance_shuts_out_middle() {
    let (mut scheduler, _main) = scheduler_with_main(5);
    let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);

    let low = spawn(&mut scheduler, 10);
    switch_to(&mut scheduler, low);
    assert!(matches!(
        mutex.lock_with(&mut scheduler),
        crate::kernel::sched::BlockOutcome::Complete(status::OK)
    ));

    let middle = spawn(&mut scheduler, 50);
    let high = spawn(&mut scheduler, 100);

    switch_to(&mut scheduler, high);
    mutex.lock_with(&mut scheduler);

    // The owner inherited the waiter's priority and outranks middle.
    assert_eq!(scheduler.tcb(low).effective_priority, 100);
    scheduler.switch_context(0x1000);
    assert_eq!(scheduler.current_index(), low);
    assert_ne!(scheduler.current_index(), middle);

    // Release: ownership transfers to high, the boost is withdrawn.
    mutex.unlock_with(&mut scheduler);
    assert_eq!(scheduler.tcb(low).effective_priority, 10);
    scheduler.switch_context(0x2000);
    assert_eq!(scheduler.current_index(), high);

    switch_to(&mut scheduler, high);
    mutex.unlock_with(&mut scheduler);
    assert!(!mutex.is_locked());
}

/// Semaphore wake-ups drain in FIFO order within one priority band.
#[test]
fn test_scenario_semaphore_fifo_wakeup() {
    let (mut scheduler, _main) = scheduler_with_main(90);
    let semaphore = Semaphore::new(0);

    let a = spawn(&mut scheduler, 50);
    let b = spawn(&mut scheduler, 50);
    let c = spawn(&mut scheduler, 50);

    for waiter in [a, b, c] {
        switch_to(&mut scheduler, waiter);
        semaphore.wait_with(&mut scheduler);
    }

    let mut wake_order = Vec::new();
    for _ in 0..3 {
        semaphore.post_with(&mut scheduler);
        for waiter in [a, b, c] {
            if scheduler.tcb(waiter).state == ThreadState::Runnable
                && !wake_order.contains(&waiter)
            {
                wake_order.push(waiter);
            }
        }
    }
    assert_eq!(wake_order, [a, b, c]);
}

/// Condition variable: notify while holding the mutex; the waiter returns
/// success with the mutex re-acquired and the flag observable.
#[test]
fn test_scenario_condition_variable_notify() {
    use crate::kernel::sync::ConditionVariable;

    let (mut scheduler, waiter) = scheduler_with_main(50);
    let condvar = ConditionVariable::new();
    let mutex = Mutex::normal();
    let mut flag = false;

    mutex.lock_with(&mut scheduler);
    let deadline = scheduler.tick_count() + Duration::from_millis(50) + Duration::from_ticks(1);
    let step = condvar.wait_step(&mut scheduler, &mutex, Some(deadline));
    assert!(matches!(step, crate::kernel::sync::condvar::WaitStep::Blocked(_)));

    // The notifier runs 20 ticks later.
    let notifier = spawn(&mut scheduler, 40);
    switch_to(&mut scheduler, notifier);
    for _ in 0..20 {
        scheduler.tick_interrupt_handler();
    }
    mutex.lock_with(&mut scheduler);
    flag = true;
    condvar.notify_one_with(&mut scheduler);
    mutex.unlock_with(&mut scheduler);

    // The waiter woke with success, re-locks and sees the flag.
    assert_eq!(scheduler.tcb(waiter).state, ThreadState::Runnable);
    assert_eq!(scheduler.take_unblock_value(waiter), status::OK);
    switch_to(&mut scheduler, waiter);
    assert!(matches!(
        mutex.lock_with(&mut scheduler),
        crate::kernel::sched::BlockOutcome::Complete(status::OK)
    ));
    assert!(flag);
    assert_eq!(ConditionVariable::resolve(status::OK, status::OK), status::OK);
}

/// Ten threads race on a once flag: one runs the initializer, the other
/// nine block and then observe the completed state.
#[cfg(feature = "callonce")]
#[test]
fn test_scenario_once_flag_race() {
    use crate::kernel::sync::once::OnceStep;
    use crate::kernel::sync::OnceFlag;

    let (mut scheduler, _main) = scheduler_with_main(90);
    let once = OnceFlag::new();

    let racers: Vec<_> = (0..10).map(|_| spawn(&mut scheduler, 50)).collect();

    switch_to(&mut scheduler, racers[0]);
    assert_eq!(once.begin_with(&mut scheduler), OnceStep::Run);

    for &racer in &racers[1..] {
        switch_to(&mut scheduler, racer);
        assert!(matches!(once.begin_with(&mut scheduler), OnceStep::Wait(_)));
        assert_eq!(scheduler.tcb(racer).state, ThreadState::BlockedOnOnceFlag);
    }

    switch_to(&mut scheduler, racers[0]);
    once.complete_with(&mut scheduler);

    for &racer in &racers[1..] {
        assert_eq!(scheduler.tcb(racer).state, ThreadState::Runnable);
        switch_to(&mut scheduler, racer);
        assert_eq!(once.begin_with(&mut scheduler), OnceStep::AlreadyDone);
    }
}

/// Suspending and resuming leaves run-queue ordering among equal-priority
/// peers unchanged (re-insertion after existing peers).
#[test]
fn test_scenario_suspend_resume_is_order_neutral() {
    let (mut scheduler, main) = scheduler_with_main(50);
    let peer = spawn(&mut scheduler, 50);

    scheduler.suspend_current();
    scheduler.switch_context(0x1000);
    assert_eq!(scheduler.current_index(), peer);

    scheduler.resume(main);
    // Main rejoined behind its peer, as a fresh arrival would.
    assert_eq!(&scheduler.run_queue_order()[..2], [peer, main]);
    scheduler.assert_scheduling_invariants();
}

/// ============================================================================
/// Public API smoke tests (global kernel)
/// ============================================================================

mod public_api {
    use super::*;
    use crate::kernel::thread::{this_thread, Thread};
    use crate::kernel::tick::TickClock;

    /// Serializes every test that touches the global kernel singleton.
    static API_TEST_LOCK: spin::Mutex<()> = spin::Mutex::new(());

    fn with_global_kernel<R>(f: impl FnOnce() -> R) -> R {
        let guard = API_TEST_LOCK.lock();
        if !crate::kernel::is_initialized() {
            assert_eq!(crate::kernel::init(), status::OK);
        }
        let result = f();
        drop(guard);
        result
    }

    #[test]
    fn test_init_is_single_shot() {
        with_global_kernel(|| {
            assert!(crate::kernel::is_initialized());
            assert_eq!(crate::kernel::init(), status::EINVAL);
        });
    }

    #[test]
    fn test_current_thread_identity() {
        with_global_kernel(|| {
            let me = this_thread::get();
            assert!(me.id() > 0);
            assert_eq!(me.state(), Some(ThreadState::Runnable));
            assert_eq!(
                this_thread::priority(),
                crate::config::MAIN_THREAD_PRIORITY
            );
        });
    }

    #[test]
    fn test_thread_creation_and_priorities() {
        fn body(_argument: usize) {}

        with_global_kernel(|| {
            let thread = Thread::with_stack_size(2048, 30, body, 7).unwrap();
            assert_eq!(thread.state(), Some(ThreadState::New));

            assert_eq!(thread.start(), status::OK);
            assert_eq!(thread.state(), Some(ThreadState::Runnable));

            assert_eq!(thread.set_priority(40), status::OK);
            assert_eq!(thread.priority(), Some(40));
            assert_eq!(thread.effective_priority(), Some(40));

            // Signals pend without waking a runnable thread.
            assert_eq!(thread.generate_signal(3), status::OK);
            assert_eq!(thread.generate_signal(200), status::EINVAL);
            assert_eq!(thread.state(), Some(ThreadState::Runnable));
        });
    }

    #[test]
    fn test_stack_too_small_rejected() {
        fn body(_argument: usize) {}

        with_global_kernel(|| {
            assert!(Thread::with_stack_size(8, 30, body, 0).is_err());
        });
    }

    #[test]
    fn test_semaphore_public_surface() {
        with_global_kernel(|| {
            let semaphore = Semaphore::with_max_value(1, 2);
            assert_eq!(semaphore.try_wait(), status::OK);
            assert_eq!(semaphore.try_wait(), status::EAGAIN);
            assert_eq!(semaphore.post(), status::OK);
            assert_eq!(semaphore.post(), status::OK);
            assert_eq!(semaphore.post(), status::EOVERFLOW);
            assert_eq!(semaphore.value(), 2);
        });
    }

    #[test]
    fn test_mutex_public_surface() {
        with_global_kernel(|| {
            let mutex = Mutex::recursive();
            assert_eq!(mutex.lock(), status::OK);
            assert_eq!(mutex.lock(), status::OK);
            assert_eq!(mutex.unlock(), status::OK);
            assert_eq!(mutex.unlock(), status::OK);
            assert!(!mutex.is_locked());
            assert_eq!(mutex.try_lock(), status::OK);
            assert_eq!(mutex.unlock(), status::OK);
        });
    }

    #[cfg(feature = "callonce")]
    #[test]
    fn test_call_once_public_surface() {
        use crate::kernel::sync::OnceFlag;
        use core::sync::atomic::{AtomicU32, Ordering};

        static CALLS: AtomicU32 = AtomicU32::new(0);

        fn initializer() {
            CALLS.fetch_add(1, Ordering::Relaxed);
        }

        with_global_kernel(|| {
            let once = OnceFlag::new();
            assert!(!once.is_done());
            assert_eq!(once.call_once(initializer), status::OK);
            assert_eq!(once.call_once(initializer), status::OK);
            assert!(once.is_done());
            assert_eq!(CALLS.load(Ordering::Relaxed), 1);
        });
    }

    #[test]
    fn test_software_timer_public_surface() {
        use crate::kernel::timer::SoftwareTimer;

        fn callback(_argument: usize) {}

        with_global_kernel(|| {
            let timer = SoftwareTimer::new(callback, 0);
            assert!(!timer.is_running());
            assert_eq!(timer.start_for(Duration::from_millis(100)), status::OK);
            assert!(timer.is_running());
            assert_eq!(timer.stop(), status::OK);
            assert!(!timer.is_running());
        });
    }

    #[test]
    fn test_tick_clock_reads() {
        with_global_kernel(|| {
            let first = TickClock::now();
            let second = TickClock::now();
            assert!(second >= first);
        });
    }

    #[test]
    fn test_malloc_mutex_recursive_inherit() {
        with_global_kernel(|| {
            let heap = crate::kernel::memory::malloc_mutex();
            assert_eq!(heap.lock(), status::OK);
            assert_eq!(heap.lock(), status::OK);
            assert_eq!(heap.unlock(), status::OK);
            assert_eq!(heap.unlock(), status::OK);
        });
    }

    #[test]
    fn test_capi_objects_on_global_kernel() {
        use crate::kernel::capi;
        use core::mem::MaybeUninit;

        with_global_kernel(|| unsafe {
            let mut storage = MaybeUninit::<Semaphore>::uninit();
            assert_eq!(capi::tickos_semaphore_construct(storage.as_mut_ptr(), 1, 4), status::OK);
            let semaphore = storage.as_ptr();
            assert_eq!(capi::tickos_semaphore_try_wait(semaphore), status::OK);
            assert_eq!(capi::tickos_semaphore_try_wait(semaphore), status::EAGAIN);
            assert_eq!(capi::tickos_semaphore_post(semaphore), status::OK);

            let mut mutex_storage = MaybeUninit::<Mutex>::uninit();
            assert_eq!(
                capi::tickos_mutex_construct(
                    mutex_storage.as_mut_ptr(),
                    capi::TICKOS_MUTEX_TYPE_NORMAL,
                    capi::TICKOS_MUTEX_PROTOCOL_NONE,
                    0,
                ),
                status::OK
            );
            let mutex = mutex_storage.as_ptr();
            assert_eq!(capi::tickos_mutex_lock(mutex), status::OK);
            assert_eq!(capi::tickos_mutex_unlock(mutex), status::OK);
        });
    }
}
