// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Mutex
//!
//! A lock with ownership tracking, three relock behaviors and three
//! priority protocols.
//!
//! # Design
//!
//! - **Types**: `Normal`, `ErrorCheck` and `Recursive` differ only in how a
//!   relock by the owner behaves. Relocking a non-recursive mutex returns
//!   [`EDEADLK`](crate::status::EDEADLK) for every type; the deadlock is
//!   detected rather than left undefined.
//! - **Protocols**: `Inherit` boosts the owner to the highest waiter
//!   priority and propagates along chains of blocked owners; `Protect`
//!   boosts the owner to the mutex's priority ceiling for the whole
//!   critical section.
//! - **Transfer on unlock**: a contended unlock hands ownership directly to
//!   the highest-priority waiter; the mutex is never observably unlocked in
//!   between.
//!
//! Mutex waits are not interruptible by signals; a waiter leaves the
//! blocked list only through ownership transfer or timeout.

use crate::kernel::list::ThreadList;
use crate::kernel::sched::{BlockOutcome, Scheduler};
use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::thread::{BoostKind, BoostSource, ThreadPriority, ThreadState, WaitingOn};
use crate::kernel::tick::{Duration, TickClock, TimePoint};
use crate::kernel::{finish_blocking, with_scheduler};
use crate::status::{self, Status};

/// Relock behavior of a mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexType {
    /// No owner bookkeeping beyond deadlock detection
    Normal,
    /// Relock and non-owner unlock are reported as errors
    ErrorCheck,
    /// The owner may relock; unlocks must balance locks
    Recursive,
}

/// Priority protocol of a mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexProtocol {
    /// No priority adjustment
    None,
    /// Priority inheritance: the owner inherits its highest waiter's
    /// effective priority
    Inherit,
    /// Priority protection: the owner runs at the mutex's ceiling
    Protect,
}

struct MutexInner {
    owner: Option<usize>,
    recursion: u16,
    queue: Option<ThreadList>,
}

/// Mutual exclusion lock
///
/// Constructible in a `static`. Destroying a locked mutex is undefined.
pub struct Mutex {
    mutex_type: MutexType,
    protocol: MutexProtocol,
    ceiling: ThreadPriority,
    inner: spin::Mutex<MutexInner>,
}

impl Mutex {
    /// Create a mutex with the given type, protocol and priority ceiling
    ///
    /// The ceiling is only meaningful with [`MutexProtocol::Protect`].
    pub const fn new(
        mutex_type: MutexType,
        protocol: MutexProtocol,
        priority_ceiling: ThreadPriority,
    ) -> Self {
        Self {
            mutex_type,
            protocol,
            ceiling: priority_ceiling,
            inner: spin::Mutex::new(MutexInner { owner: None, recursion: 0, queue: None }),
        }
    }

    /// A `Normal` mutex with no priority protocol
    pub const fn normal() -> Self {
        Self::new(MutexType::Normal, MutexProtocol::None, 0)
    }

    /// A `Recursive` mutex with no priority protocol
    pub const fn recursive() -> Self {
        Self::new(MutexType::Recursive, MutexProtocol::None, 0)
    }

    /// Whether the mutex is currently locked
    pub fn is_locked(&self) -> bool {
        let _lock = InterruptMaskingLock::new();
        self.inner.lock().owner.is_some()
    }

    /// Acquire the mutex, blocking until it is available
    ///
    /// Returns 0 on success, [`EDEADLK`](status::EDEADLK) if the caller
    /// already owns a non-recursive mutex, or [`EINVAL`](status::EINVAL) if
    /// the caller's priority exceeds a `Protect` mutex's ceiling.
    pub fn lock(&self) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.lock_with(scheduler))
        };
        finish_blocking(outcome)
    }

    /// Acquire the mutex without blocking
    ///
    /// Returns [`EBUSY`](status::EBUSY) when the mutex is held by another
    /// thread.
    pub fn try_lock(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.try_lock_with(scheduler))
    }

    /// Acquire the mutex, blocking for at most `duration`
    pub fn try_lock_for(&self, duration: Duration) -> Status {
        self.try_lock_until(TickClock::now() + duration + Duration::from_ticks(1))
    }

    /// Acquire the mutex, blocking until `deadline` at the latest
    ///
    /// On timeout the caller's inheritance contribution is withdrawn and
    /// [`ETIMEDOUT`](status::ETIMEDOUT) returned.
    pub fn try_lock_until(&self, deadline: TimePoint) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| self.try_lock_until_with(scheduler, deadline))
        };
        finish_blocking(outcome)
    }

    /// Release the mutex
    ///
    /// Returns [`EPERM`](status::EPERM) if the caller is not the owner. If
    /// threads are waiting, ownership transfers to the highest-priority
    /// waiter, which may preempt the caller once its priority boost is
    /// withdrawn.
    pub fn unlock(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| self.unlock_with(scheduler))
    }

    /// ========================================================================
    /// Critical-section bodies
    /// ========================================================================

    fn boost_kind(&self) -> Option<BoostKind> {
        match self.protocol {
            MutexProtocol::None => None,
            MutexProtocol::Inherit => Some(BoostKind::Inherit),
            MutexProtocol::Protect => Some(BoostKind::Ceiling(self.ceiling)),
        }
    }

    fn queue(&self, inner: &mut MutexInner, scheduler: &mut Scheduler) -> ThreadList {
        *inner.queue.get_or_insert_with(|| scheduler.new_blocked_list(ThreadState::BlockedOnMutex))
    }

    /// Take ownership of an unowned mutex
    fn take_ownership(&self, inner: &mut MutexInner, scheduler: &mut Scheduler, thread: usize) {
        inner.owner = Some(thread);
        inner.recursion = 0;
        if let Some(kind) = self.boost_kind() {
            let queue = self.queue(inner, scheduler);
            scheduler.add_boost_source(thread, BoostSource { list: queue, kind });
        }
    }

    pub(crate) fn lock_with(&self, scheduler: &mut Scheduler) -> BlockOutcome {
        let current = scheduler.current_index();
        if self.protocol == MutexProtocol::Protect
            && scheduler.tcb(current).base_priority > self.ceiling
        {
            return BlockOutcome::Complete(status::EINVAL);
        }
        let mut inner = self.inner.lock();
        match inner.owner {
            None => {
                self.take_ownership(&mut inner, scheduler, current);
                BlockOutcome::Complete(status::OK)
            }
            Some(owner) if owner == current => BlockOutcome::Complete(self.relock(&mut inner)),
            Some(owner) => {
                let queue = self.queue(&mut inner, scheduler);
                drop(inner);
                let inherit = self.protocol == MutexProtocol::Inherit;
                let outcome = scheduler.block(queue, Some(WaitingOn { owner, inherit }));
                if inherit {
                    // The new waiter may raise the owner's inherited
                    // priority, propagating along any mutex chain.
                    scheduler.update_effective_priority(owner);
                }
                outcome
            }
        }
    }

    fn relock(&self, inner: &mut MutexInner) -> Status {
        match self.mutex_type {
            MutexType::Recursive => {
                inner.recursion += 1;
                status::OK
            }
            _ => status::EDEADLK,
        }
    }

    pub(crate) fn try_lock_with(&self, scheduler: &mut Scheduler) -> Status {
        let current = scheduler.current_index();
        if self.protocol == MutexProtocol::Protect
            && scheduler.tcb(current).base_priority > self.ceiling
        {
            return status::EINVAL;
        }
        let mut inner = self.inner.lock();
        match inner.owner {
            None => {
                self.take_ownership(&mut inner, scheduler, current);
                status::OK
            }
            Some(owner) if owner == current && self.mutex_type == MutexType::Recursive => {
                inner.recursion += 1;
                status::OK
            }
            Some(_) => status::EBUSY,
        }
    }

    pub(crate) fn try_lock_until_with(
        &self,
        scheduler: &mut Scheduler,
        deadline: TimePoint,
    ) -> BlockOutcome {
        let current = scheduler.current_index();
        if self.protocol == MutexProtocol::Protect
            && scheduler.tcb(current).base_priority > self.ceiling
        {
            return BlockOutcome::Complete(status::EINVAL);
        }
        let mut inner = self.inner.lock();
        match inner.owner {
            None => {
                self.take_ownership(&mut inner, scheduler, current);
                BlockOutcome::Complete(status::OK)
            }
            Some(owner) if owner == current => BlockOutcome::Complete(self.relock(&mut inner)),
            Some(owner) => {
                let queue = self.queue(&mut inner, scheduler);
                drop(inner);
                let inherit = self.protocol == MutexProtocol::Inherit;
                let outcome = scheduler.block_until(queue, deadline, Some(WaitingOn { owner, inherit }));
                if inherit && matches!(outcome, BlockOutcome::Blocked(_)) {
                    scheduler.update_effective_priority(owner);
                }
                outcome
            }
        }
    }

    pub(crate) fn unlock_with(&self, scheduler: &mut Scheduler) -> Status {
        let current = scheduler.current_index();
        let mut inner = self.inner.lock();
        if inner.owner != Some(current) {
            return status::EPERM;
        }
        if inner.recursion > 0 {
            inner.recursion -= 1;
            return status::OK;
        }

        // Withdraw this mutex's boost from the releasing owner first, so
        // its effective priority drops before any transfer wake-up.
        if let (Some(_), Some(queue)) = (self.boost_kind(), inner.queue) {
            scheduler.remove_boost_source(current, queue);
        }

        if let Some(queue) = inner.queue {
            if let Some(waiter) = scheduler.list_front(queue) {
                // Transfer the lock to the highest-priority waiter.
                let new_owner = scheduler.unblock(waiter, status::OK);
                inner.owner = Some(new_owner);
                inner.recursion = 0;
                scheduler.retarget_waiters(queue, new_owner);
                if let Some(kind) = self.boost_kind() {
                    scheduler.add_boost_source(new_owner, BoostSource { list: queue, kind });
                }
                return status::OK;
            }
        }

        inner.owner = None;
        status::OK
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
    fn test_lock_unlock_round_trip() {
        let (mut scheduler, main) = scheduler_with_main(50);
        let mutex = Mutex::normal();

        assert!(!mutex.is_locked());
        assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::OK));
        assert!(mutex.is_locked());
        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);
        assert!(!mutex.is_locked());
        assert_eq!(scheduler.tcb(main).effective_priority, 50);
    }

    #[test]
    fn test_relock_detected_for_all_non_recursive_types() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        for mutex in [
            Mutex::new(MutexType::Normal, MutexProtocol::None, 0),
            Mutex::new(MutexType::ErrorCheck, MutexProtocol::None, 0),
        ] {
            mutex.lock_with(&mut scheduler);
            assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::EDEADLK));
        }
    }

    #[test]
    fn test_recursive_lock_counts() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::recursive();

        mutex.lock_with(&mut scheduler);
        assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::OK));
        assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::OK));

        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);
        assert!(mutex.is_locked());
        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);
        assert!(mutex.is_locked());
        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_unlock_by_non_owner_is_eperm() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::normal();
        mutex.lock_with(&mut scheduler);

        let other = spawn(&mut scheduler, 50);
        switch_to(&mut scheduler, other);
        assert_eq!(mutex.unlock_with(&mut scheduler), status::EPERM);
        assert!(mutex.is_locked());
    }

    #[test]
    fn test_try_lock_busy() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::normal();
        mutex.lock_with(&mut scheduler);

        let other = spawn(&mut scheduler, 50);
        switch_to(&mut scheduler, other);
        assert_eq!(mutex.try_lock_with(&mut scheduler), status::EBUSY);
    }

    #[test]
    fn test_contended_lock_transfers_to_highest_waiter() {
        let (mut scheduler, main) = scheduler_with_main(50);
        let mutex = Mutex::normal();
        mutex.lock_with(&mut scheduler);

        let low = spawn(&mut scheduler, 20);
        let high = spawn(&mut scheduler, 80);

        switch_to(&mut scheduler, low);
        assert!(matches!(mutex.lock_with(&mut scheduler), BlockOutcome::Blocked(_)));
        switch_to(&mut scheduler, high);
        assert!(matches!(mutex.lock_with(&mut scheduler), BlockOutcome::Blocked(_)));

        switch_to(&mut scheduler, main);
        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);

        // Ownership went to the high-priority waiter; low still blocked.
        assert_eq!(scheduler.tcb(high).state, ThreadState::Runnable);
        assert_eq!(scheduler.tcb(low).state, ThreadState::BlockedOnMutex);
        assert!(mutex.is_locked());

        // And the new owner can release to the remaining waiter.
        switch_to(&mut scheduler, high);
        assert_eq!(mutex.unlock_with(&mut scheduler), status::OK);
        assert_eq!(scheduler.tcb(low).state, ThreadState::Runnable);
    }

    #[test]
    fn test_priority_inheritance_boosts_and_restores() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);

        let low = spawn(&mut scheduler, 10);
        let high = spawn(&mut scheduler, 100);

        switch_to(&mut scheduler, low);
        mutex.lock_with(&mut scheduler);
        assert_eq!(scheduler.tcb(low).effective_priority, 10);

        switch_to(&mut scheduler, high);
        assert!(matches!(mutex.lock_with(&mut scheduler), BlockOutcome::Blocked(_)));

        // The owner inherits its waiter's priority...
        assert_eq!(scheduler.tcb(low).effective_priority, 100);
        assert_eq!(scheduler.tcb(low).base_priority, 10);

        // ...and drops back on release, with ownership handed over.
        switch_to(&mut scheduler, low);
        mutex.unlock_with(&mut scheduler);
        assert_eq!(scheduler.tcb(low).effective_priority, 10);
        assert_eq!(scheduler.tcb(high).state, ThreadState::Runnable);
    }

    #[test]
    fn test_priority_inheritance_chain_propagates() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex_a = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);
        let mutex_b = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);

        let lowest = spawn(&mut scheduler, 5);
        let middle = spawn(&mut scheduler, 20);
        let high = spawn(&mut scheduler, 90);

        // lowest owns A; middle owns B and blocks on A; high blocks on B.
        switch_to(&mut scheduler, lowest);
        mutex_a.lock_with(&mut scheduler);
        switch_to(&mut scheduler, middle);
        mutex_b.lock_with(&mut scheduler);
        assert!(matches!(mutex_a.lock_with(&mut scheduler), BlockOutcome::Blocked(_)));
        assert_eq!(scheduler.tcb(lowest).effective_priority, 20);

        switch_to(&mut scheduler, high);
        assert!(matches!(mutex_b.lock_with(&mut scheduler), BlockOutcome::Blocked(_)));

        // The boost walks the chain: middle inherits 90, and through it so
        // does lowest.
        assert_eq!(scheduler.tcb(middle).effective_priority, 90);
        assert_eq!(scheduler.tcb(lowest).effective_priority, 90);

        // Releasing A transfers it to middle and deflates lowest.
        switch_to(&mut scheduler, lowest);
        mutex_a.unlock_with(&mut scheduler);
        assert_eq!(scheduler.tcb(lowest).effective_priority, 5);
        assert_eq!(scheduler.tcb(middle).effective_priority, 90);
    }

    #[test]
    fn test_protect_ceiling_boosts_immediately() {
        let (mut scheduler, main) = scheduler_with_main(50);
        let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Protect, 200);

        assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::OK));
        assert_eq!(scheduler.tcb(main).effective_priority, 200);

        mutex.unlock_with(&mut scheduler);
        assert_eq!(scheduler.tcb(main).effective_priority, 50);
    }

    #[test]
    fn test_protect_rejects_priority_above_ceiling() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Protect, 40);
        assert_eq!(mutex.lock_with(&mut scheduler), BlockOutcome::Complete(status::EINVAL));
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_timed_lock_timeout_withdraws_inheritance() {
        let (mut scheduler, _main) = scheduler_with_main(50);
        let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);

        let low = spawn(&mut scheduler, 10);
        let high = spawn(&mut scheduler, 100);

        switch_to(&mut scheduler, low);
        mutex.lock_with(&mut scheduler);

        switch_to(&mut scheduler, high);
        let outcome = mutex.try_lock_until_with(&mut scheduler, TimePoint::from_ticks(2));
        assert!(matches!(outcome, BlockOutcome::Blocked(_)));
        assert_eq!(scheduler.tcb(low).effective_priority, 100);

        scheduler.tick_interrupt_handler();
        scheduler.tick_interrupt_handler();

        // Timed out: the waiter is runnable again and the boost is gone.
        assert_eq!(scheduler.tcb(high).state, ThreadState::Runnable);
        assert_eq!(scheduler.take_unblock_value(high), status::ETIMEDOUT);
        assert_eq!(scheduler.tcb(low).effective_priority, 10);
        assert!(mutex.is_locked());
    }

    #[test]
    fn test_transfer_retargets_remaining_waiters() {
        let (mut scheduler, main) = scheduler_with_main(50);
        let mutex = Mutex::new(MutexType::Normal, MutexProtocol::Inherit, 0);
        mutex.lock_with(&mut scheduler);

        let a = spawn(&mut scheduler, 60);
        let b = spawn(&mut scheduler, 70);
        switch_to(&mut scheduler, a);
        mutex.lock_with(&mut scheduler);
        switch_to(&mut scheduler, b);
        mutex.lock_with(&mut scheduler);

        switch_to(&mut scheduler, main);
        mutex.unlock_with(&mut scheduler);

        // b owns the mutex now and inherits from the remaining waiter a.
        assert_eq!(scheduler.tcb(b).state, ThreadState::Runnable);
        assert_eq!(scheduler.tcb(b).effective_priority, 70);
        assert_eq!(scheduler.tcb(a).state, ThreadState::BlockedOnMutex);

        // Raising a's priority while it waits must now boost b, not main.
        scheduler.set_priority(a, 95);
        assert_eq!(scheduler.tcb(b).effective_priority, 95);
        assert_eq!(scheduler.tcb(main).effective_priority, 50);
    }
}
