// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Scheduler
//!
//! This module implements the preemptive priority scheduler.
//!
//! # Design
//!
//! - **Priority-based**: 256 priority levels; the run queue is sorted by
//!   descending effective priority and the head is always the next thread
//! - **Round-robin**: threads at the same effective priority share the
//!   processor in FIFO order, rotating when their quantum expires
//! - **Preemptive**: any operation that makes a higher-priority thread
//!   runnable requests a context switch through the architecture port
//! - **Single core**: all scheduler state is mutated inside the
//!   interrupt-masking critical section
//!
//! Blocking follows the slot protocol: `block` transfers the current thread
//! to a blocked list and requests a switch; whoever wakes the thread writes
//! the wake cause into its control block, and the blocking call reads the
//! slot after the thread resumes.

use alloc::vec::Vec;

use crate::kernel::arch;
use crate::kernel::list::{ListArena, NodeIndex, SortOrder, ThreadIndex, ThreadList};
use crate::kernel::thread::{
    thread_runner, thread_trap, BoostKind, BoostSource, Stack, ThreadControlBlock, ThreadId,
    ThreadPriority, ThreadRoutine, ThreadState, ThreadTable, WaitingOn,
};
use crate::kernel::tick::TimePoint;
use crate::kernel::timer::{FiredTimer, TimerEngine, TimerId};
use crate::kernel::signals::SignalSet;
use crate::log_debug;
use crate::status::{self, Status};

/// Result of an operation that may block the calling thread
///
/// `Complete` carries a status decided inside the critical section;
/// `Blocked` means the thread was transferred to a blocked list and the
/// caller must read the wake-cause slot after resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockOutcome {
    Complete(Status),
    Blocked(ThreadIndex),
}

/// Whether a signal may wake a thread blocked in this state
///
/// Mutex and once-flag waits are not interrupted: a mutex wake is always an
/// ownership transfer, and the once-flag retry loop must make progress.
fn interruptible(state: ThreadState) -> bool {
    matches!(
        state,
        ThreadState::Sleeping
            | ThreadState::BlockedOnSemaphore
            | ThreadState::BlockedOnConditionVariable
            | ThreadState::BlockedOnJoin
    )
}

/// Placeholder for "no current thread yet"
const NO_THREAD: ThreadIndex = usize::MAX;

/// The scheduler
///
/// Owns the thread table, the node arena backing every sorted thread list,
/// the run queue, the sleep queue and the software timer engine. There is
/// one instance per system, created by [`crate::kernel::init`].
pub(crate) struct Scheduler {
    arena: ListArena,
    threads: ThreadTable,
    run_queue: ThreadList,
    sleep_queue: ThreadList,
    sleeping_list: ThreadList,
    suspended_list: ThreadList,
    timer_wait_list: ThreadList,
    /// The single thread group: every live thread, ordered by thread ID
    thread_group: ThreadList,
    timers: TimerEngine,
    current: ThreadIndex,
    idle: Option<ThreadIndex>,
    tick_count: i64,
    switch_requested: bool,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        let mut arena = ListArena::new();
        let run_queue = ThreadList::new(&mut arena, ThreadState::Runnable, SortOrder::Descending);
        let sleep_queue = ThreadList::new(&mut arena, ThreadState::Sleeping, SortOrder::Ascending);
        let sleeping_list =
            ThreadList::new(&mut arena, ThreadState::Sleeping, SortOrder::Descending);
        let suspended_list =
            ThreadList::new(&mut arena, ThreadState::Suspended, SortOrder::Descending);
        let timer_wait_list =
            ThreadList::new(&mut arena, ThreadState::BlockedOnSemaphore, SortOrder::Descending);
        let thread_group = ThreadList::new(&mut arena, ThreadState::New, SortOrder::Ascending);
        Self {
            arena,
            threads: ThreadTable::new(),
            run_queue,
            sleep_queue,
            sleeping_list,
            suspended_list,
            timer_wait_list,
            thread_group,
            timers: TimerEngine::new(),
            current: NO_THREAD,
            idle: None,
            tick_count: 0,
            switch_requested: false,
        }
    }

    /// ========================================================================
    /// Thread table access
    /// ========================================================================

    pub(crate) fn tcb(&self, index: ThreadIndex) -> &ThreadControlBlock {
        self.threads.get(index).expect("invalid thread index")
    }

    pub(crate) fn tcb_mut(&mut self, index: ThreadIndex) -> &mut ThreadControlBlock {
        self.threads.get_mut(index).expect("invalid thread index")
    }

    /// Whether `index` still holds the thread identified by `tid`
    pub(crate) fn thread_exists(&self, index: ThreadIndex, tid: ThreadId) -> bool {
        self.threads.get(index).map(|tcb| tcb.tid == tid).unwrap_or(false)
    }

    pub(crate) fn current_index(&self) -> ThreadIndex {
        debug_assert!(self.current != NO_THREAD, "scheduler has no current thread");
        self.current
    }

    pub(crate) fn tick_count(&self) -> TimePoint {
        TimePoint::from_ticks(self.tick_count)
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.threads.count()
    }

    /// ========================================================================
    /// Thread lifecycle
    /// ========================================================================

    /// Register a new thread in state `New`
    pub(crate) fn add_thread(
        &mut self,
        stack: Stack,
        priority: ThreadPriority,
        routine: ThreadRoutine,
    ) -> ThreadIndex {
        let join_list =
            ThreadList::new(&mut self.arena, ThreadState::BlockedOnJoin, SortOrder::Descending);
        let index = self.threads.insert(ThreadControlBlock::new(
            stack, priority, routine, 0, 0, join_list,
        ));
        let list_node = self.arena.alloc_thread_node(index);
        let sleep_node = self.arena.alloc_thread_node(index);
        let group_node = self.arena.alloc_thread_node(index);
        let tid = {
            let tcb = self.tcb_mut(index);
            tcb.list_node = list_node;
            tcb.sleep_node = sleep_node;
            tcb.group_node = group_node;
            tcb.tid
        };
        let thread_group = self.thread_group;
        thread_group.insert_sorted(&mut self.arena, group_node, tid);
        index
    }

    /// Number of threads in the thread group
    pub(crate) fn group_size(&self) -> usize {
        self.thread_group.len(&self.arena)
    }

    /// Make a `New` thread runnable, building its initial stack frame
    pub(crate) fn start_thread(&mut self, index: ThreadIndex) -> Status {
        let tcb = self.tcb(index);
        if tcb.state != ThreadState::New {
            return status::EINVAL;
        }
        self.tcb_mut(index).stack.initialize(thread_runner, index, thread_trap);
        let run_queue = self.run_queue;
        self.transfer_to_list(index, run_queue);
        self.maybe_request_preemption();
        status::OK
    }

    /// Adopt the startup context as the running main thread
    ///
    /// The main thread's stack frame is live, so it is not initialized; its
    /// stack pointer is captured by the first context switch away from it.
    pub(crate) fn adopt_main_thread(&mut self, index: ThreadIndex) {
        debug_assert!(self.current == NO_THREAD, "scheduler already has a main thread");
        let run_queue = self.run_queue;
        self.transfer_to_list(index, run_queue);
        self.current = index;
    }

    /// Record and start the idle thread
    pub(crate) fn set_idle_thread(&mut self, index: ThreadIndex) {
        debug_assert!(self.idle.is_none(), "idle thread already set");
        self.idle = Some(index);
        self.start_thread(index);
    }

    /// Terminate the current thread
    ///
    /// Wakes all join waiters and requests the final context switch away
    /// from the thread.
    pub(crate) fn terminate_current(&mut self) {
        let current = self.current_index();
        let tcb = self.tcb(current);
        debug_assert!(
            tcb.boost_sources.is_empty(),
            "thread terminated while owning a protocol mutex"
        );
        let node = tcb.list_node;
        let sleep_node = tcb.sleep_node;
        let join_list = tcb.join_list;
        if self.arena.is_linked(node) {
            self.arena.unlink(node);
        }
        if self.arena.is_linked(sleep_node) {
            self.arena.unlink(sleep_node);
        }
        self.tcb_mut(current).state = ThreadState::Terminated;
        while let Some(waiter) = join_list.front(&self.arena) {
            self.unblock(waiter, status::OK);
        }
        log_debug!("thread tid={} terminated", self.tcb(current).tid);
        self.request_switch();
    }

    /// Reclaim a terminated thread's resources
    pub(crate) fn reap(&mut self, index: ThreadIndex, tid: ThreadId) -> bool {
        if !self.thread_exists(index, tid) {
            return false;
        }
        if self.tcb(index).state != ThreadState::Terminated || index == self.current {
            return false;
        }
        let tcb = self.threads.remove(index);
        debug_assert!(tcb.join_list.is_empty(&self.arena));
        self.arena.free_node(tcb.list_node);
        self.arena.free_node(tcb.sleep_node);
        self.arena.unlink(tcb.group_node);
        self.arena.free_node(tcb.group_node);
        tcb.join_list.dispose(&mut self.arena);
        true
    }

    /// Reclaim every detached terminated thread (runs in the idle thread)
    #[cfg(feature = "thread-detach")]
    pub(crate) fn reap_deferred(&mut self) {
        let deferred: Vec<(ThreadIndex, ThreadId)> = self
            .threads
            .iter()
            .filter(|(index, tcb)| {
                tcb.detached && tcb.state == ThreadState::Terminated && *index != self.current
            })
            .map(|(index, tcb)| (index, tcb.tid))
            .collect();
        for (index, tid) in deferred {
            self.reap(index, tid);
        }
    }

    /// ========================================================================
    /// Blocking and waking
    /// ========================================================================

    /// Transfer a thread's state node into `list` and stamp the list's state
    fn transfer_to_list(&mut self, index: ThreadIndex, list: ThreadList) {
        let tcb = self.tcb(index);
        let node = tcb.list_node;
        let key = tcb.effective_priority as u64;
        list.splice_sorted(&mut self.arena, node, key);
        let state = list.state(&self.arena);
        self.tcb_mut(index).state = state;
    }

    /// Block the current thread on `list`
    ///
    /// Returns `Complete(EINTR)` without blocking if the wait is
    /// interruptible and a signal is already pending.
    pub(crate) fn block(
        &mut self,
        list: ThreadList,
        waiting: Option<WaitingOn>,
    ) -> BlockOutcome {
        let current = self.current_index();
        if interruptible(list.state(&self.arena)) && self.tcb(current).signals.has_pending() {
            return BlockOutcome::Complete(status::EINTR);
        }
        self.tcb_mut(current).unblock_value = status::OK;
        self.transfer_to_list(current, list);
        self.tcb_mut(current).waiting_on = waiting;
        self.request_switch();
        BlockOutcome::Blocked(current)
    }

    /// Block the current thread on `list` with a wake-up deadline
    ///
    /// A deadline at or before the current tick completes immediately with
    /// `ETIMEDOUT`.
    pub(crate) fn block_until(
        &mut self,
        list: ThreadList,
        deadline: TimePoint,
        waiting: Option<WaitingOn>,
    ) -> BlockOutcome {
        if deadline.as_ticks() <= self.tick_count {
            return BlockOutcome::Complete(status::ETIMEDOUT);
        }
        let outcome = self.block(list, waiting);
        if let BlockOutcome::Blocked(index) = outcome {
            let sleep_node = self.tcb(index).sleep_node;
            let sleep_queue = self.sleep_queue;
            sleep_queue.insert_sorted(&mut self.arena, sleep_node, deadline.as_ticks() as u64);
        }
        outcome
    }

    /// Move a blocked thread back to the run queue
    ///
    /// `node` is the thread's position in its blocked list. The recorded
    /// `value` becomes the wake cause the thread's blocking call returns.
    /// Preempts the running thread if the woken thread's effective priority
    /// is higher.
    pub(crate) fn unblock(&mut self, node: NodeIndex, value: Status) -> ThreadIndex {
        let index = self.arena.thread_of(node).expect("unblock on a list sentinel");
        self.wake(index, value);
        index
    }

    fn wake(&mut self, index: ThreadIndex, value: Status) {
        let tcb = self.tcb(index);
        assert!(
            tcb.state.is_blocked() || tcb.state == ThreadState::Suspended,
            "waking a thread that is not blocked"
        );
        let boosted_owner =
            tcb.waiting_on.and_then(|waiting| waiting.inherit.then_some(waiting.owner));
        let sleep_node = tcb.sleep_node;
        if self.arena.is_linked(sleep_node) {
            self.arena.unlink(sleep_node);
        }
        let run_queue = self.run_queue;
        self.transfer_to_list(index, run_queue);
        let tcb = self.tcb_mut(index);
        tcb.waiting_on = None;
        tcb.unblock_value = value;
        // The waiter left a blocked list; any inheritance it contributed to
        // the mutex owner is withdrawn here.
        if let Some(owner) = boosted_owner {
            self.update_effective_priority(owner);
        }
        self.maybe_request_preemption();
    }

    /// Wake cause recorded for a thread by its most recent unblock
    pub(crate) fn take_unblock_value(&self, index: ThreadIndex) -> Status {
        self.tcb(index).unblock_value
    }

    /// Put the current thread to sleep until `deadline`
    pub(crate) fn sleep_until(&mut self, deadline: TimePoint) -> BlockOutcome {
        let sleeping_list = self.sleeping_list;
        self.block_until(sleeping_list, deadline, None)
    }

    /// Suspend the current thread
    pub(crate) fn suspend_current(&mut self) -> BlockOutcome {
        let suspended_list = self.suspended_list;
        self.block(suspended_list, None)
    }

    /// Resume a suspended thread
    pub(crate) fn resume(&mut self, index: ThreadIndex) -> Status {
        if self.threads.get(index).is_none() {
            return status::EINVAL;
        }
        if self.tcb(index).state != ThreadState::Suspended {
            return status::EINVAL;
        }
        self.wake(index, status::OK);
        status::OK
    }

    /// Move the current thread behind its equal-priority peers
    pub(crate) fn yield_now(&mut self) {
        let current = self.current_index();
        let tcb = self.tcb(current);
        if tcb.state != ThreadState::Runnable {
            return;
        }
        let run_queue = self.run_queue;
        self.transfer_to_list(current, run_queue);
        self.request_switch();
    }

    /// ========================================================================
    /// Priorities
    /// ========================================================================

    /// Change a thread's base priority and propagate the effective priority
    pub(crate) fn set_priority(&mut self, index: ThreadIndex, priority: ThreadPriority) {
        self.tcb_mut(index).base_priority = priority;
        self.update_effective_priority(index);
    }

    /// Register a mutex as a boost source for its (new) owner
    pub(crate) fn add_boost_source(&mut self, index: ThreadIndex, source: BoostSource) {
        let tcb = self.tcb_mut(index);
        if !tcb.boost_sources.iter().any(|existing| existing.list == source.list) {
            tcb.boost_sources.push(source);
        }
        self.update_effective_priority(index);
    }

    /// Withdraw a mutex's boost contribution from its former owner
    pub(crate) fn remove_boost_source(&mut self, index: ThreadIndex, list: ThreadList) {
        self.tcb_mut(index).boost_sources.retain(|source| source.list != list);
        self.update_effective_priority(index);
    }

    fn computed_effective_priority(&self, index: ThreadIndex) -> ThreadPriority {
        let tcb = self.tcb(index);
        let mut priority = tcb.base_priority;
        for source in &tcb.boost_sources {
            let boost = match source.kind {
                BoostKind::Ceiling(ceiling) => Some(ceiling),
                BoostKind::Inherit => {
                    source.list.front_key(&self.arena).map(|key| key as ThreadPriority)
                }
            };
            if let Some(boost) = boost {
                priority = priority.max(boost);
            }
        }
        priority
    }

    /// Recompute a thread's effective priority, re-sort the list it is in
    /// and continue along the mutex-inheritance chain
    ///
    /// Recursion depth is bounded by the chain of blocked owners; it stops
    /// as soon as a recomputation changes nothing.
    pub(crate) fn update_effective_priority(&mut self, index: ThreadIndex) {
        let new_priority = self.computed_effective_priority(index);
        let tcb = self.tcb(index);
        if new_priority == tcb.effective_priority {
            return;
        }
        let node = tcb.list_node;
        self.tcb_mut(index).effective_priority = new_priority;
        if let Some(list) = ThreadList::containing(&self.arena, node) {
            list.splice_sorted(&mut self.arena, node, new_priority as u64);
        }
        let chained_owner = self
            .tcb(index)
            .waiting_on
            .and_then(|waiting| waiting.inherit.then_some(waiting.owner));
        if let Some(owner) = chained_owner {
            self.update_effective_priority(owner);
        }
        self.maybe_request_preemption();
    }

    /// ========================================================================
    /// Signals
    /// ========================================================================

    /// Mark a signal pending for a thread, waking it with `EINTR` if it is
    /// blocked interruptibly
    pub(crate) fn generate_signal(&mut self, index: ThreadIndex, signal: u8) -> Status {
        if signal > SignalSet::MAX_SIGNAL {
            return status::EINVAL;
        }
        self.tcb_mut(index).signals.pend(signal);
        if interruptible(self.tcb(index).state) {
            self.wake(index, status::EINTR);
        }
        status::OK
    }

    /// ========================================================================
    /// Software timers
    /// ========================================================================

    pub(crate) fn timer_register(&mut self, callback: fn(usize), argument: usize) -> TimerId {
        self.timers.register(callback, argument)
    }

    pub(crate) fn timer_start(
        &mut self,
        id: TimerId,
        deadline: TimePoint,
        period: crate::kernel::tick::Duration,
    ) -> Status {
        self.timers.start(id, deadline, period)
    }

    pub(crate) fn timer_stop(&mut self, id: TimerId) -> Status {
        self.timers.stop(id)
    }

    pub(crate) fn timer_is_running(&self, id: TimerId) -> bool {
        self.timers.is_running(id)
    }

    /// Fired timers ready for dispatch, re-arming periodic ones
    pub(crate) fn take_fired_timers(&mut self) -> Vec<FiredTimer> {
        self.timers.take_fired()
    }

    /// Park the timer thread until a timer fires
    pub(crate) fn timer_thread_wait(&mut self) -> BlockOutcome {
        let timer_wait_list = self.timer_wait_list;
        self.block(timer_wait_list, None)
    }

    fn wake_timer_thread(&mut self) {
        if let Some(node) = self.timer_wait_list.front(&self.arena) {
            self.unblock(node, status::OK);
        }
    }

    /// ========================================================================
    /// Tick handling and context switching
    /// ========================================================================

    /// Advance the kernel by one tick
    ///
    /// Called from the periodic tick interrupt with interrupts masked.
    /// In order: advance the counter, wake due sleepers, fire due software
    /// timers, account the running thread's round-robin quantum, and leave
    /// any preemption request pending for the port to deliver.
    pub(crate) fn tick_interrupt_handler(&mut self) {
        self.tick_count += 1;
        let now = self.tick_count as u64;

        // Sleepers and timed-out waiters.
        loop {
            let Some(front) = self.sleep_queue.front(&self.arena) else {
                break;
            };
            if self.arena.key_of(front) > now {
                break;
            }
            let index = self.arena.thread_of(front).expect("sentinel in sleep queue");
            self.arena.unlink(front);
            // A pure sleep completing is success; expiring while blocked on
            // another list is a timeout.
            let cause = if self.tcb(index).state == ThreadState::Sleeping {
                status::OK
            } else {
                status::ETIMEDOUT
            };
            self.wake(index, cause);
        }

        // Software timers.
        if self.timers.process_tick(self.tick_count) {
            self.wake_timer_thread();
        }

        // Round-robin accounting for the running thread.
        if let Some(tcb) = self.threads.get_mut(self.current) {
            tcb.quantum.decrement();
            if tcb.quantum.is_zero() && tcb.state == ThreadState::Runnable {
                let key = tcb.effective_priority as u64;
                let current = self.current;
                let has_peer = self.run_queue.iter(&self.arena).any(|node| {
                    self.arena.thread_of(node) != Some(current) && self.arena.key_of(node) == key
                });
                if has_peer {
                    let run_queue = self.run_queue;
                    self.transfer_to_list(current, run_queue);
                    self.request_switch();
                }
            }
        }

        self.maybe_request_preemption();
    }

    /// Perform the scheduler half of a context switch
    ///
    /// Called from the low-level context-switch handler: saves the outgoing
    /// stack pointer, picks the run-queue head as the new current thread,
    /// resets its quantum if the thread changed, and returns its stack
    /// pointer.
    pub(crate) fn switch_context(&mut self, saved_stack_pointer: usize) -> usize {
        let previous = self.current;
        if let Some(tcb) = self.threads.get_mut(previous) {
            tcb.stack.set_stack_pointer(saved_stack_pointer);
            debug_assert!(tcb.stack.check_guard(), "stack overflow on outgoing thread");
        }

        #[cfg(feature = "thread-detach")]
        if let Some(tcb) = self.threads.get(previous) {
            if tcb.detached && tcb.state == ThreadState::Terminated {
                let tid = tcb.tid;
                // Safe to reclaim: the outgoing context has been saved and
                // will never be resumed.
                self.current = NO_THREAD;
                self.reap(previous, tid);
            }
        }

        let next_node =
            self.run_queue.front(&self.arena).expect("run queue empty: no idle thread");
        let next = self.arena.thread_of(next_node).expect("sentinel at run queue front");
        if next != previous {
            self.tcb_mut(next).quantum.reset();
        }
        self.current = next;
        self.switch_requested = false;
        self.tcb(next).stack.stack_pointer()
    }

    pub(crate) fn request_switch(&mut self) {
        self.switch_requested = true;
        arch::request_context_switch();
    }

    /// Request a switch if the run-queue head is not the current thread
    fn maybe_request_preemption(&mut self) {
        if self.threads.get(self.current).is_none() {
            return;
        }
        if let Some(front) = self.run_queue.front(&self.arena) {
            if self.arena.thread_of(front) != Some(self.current) {
                self.request_switch();
            }
        }
    }

    pub(crate) fn switch_requested(&self) -> bool {
        self.switch_requested
    }

    /// ========================================================================
    /// Blocked lists for synchronization objects
    /// ========================================================================

    /// Create a blocked list classifying its members into `state`
    pub(crate) fn new_blocked_list(&mut self, state: ThreadState) -> ThreadList {
        ThreadList::new(&mut self.arena, state, SortOrder::Descending)
    }

    pub(crate) fn dispose_list(&mut self, list: ThreadList) {
        list.dispose(&mut self.arena);
    }

    pub(crate) fn list_front(&self, list: ThreadList) -> Option<NodeIndex> {
        list.front(&self.arena)
    }

    pub(crate) fn list_is_empty(&self, list: ThreadList) -> bool {
        list.is_empty(&self.arena)
    }

    /// Update the recorded mutex owner for every thread in a blocked list
    /// after an ownership transfer
    pub(crate) fn retarget_waiters(&mut self, list: ThreadList, new_owner: ThreadIndex) {
        let waiters: Vec<ThreadIndex> =
            list.iter(&self.arena).filter_map(|node| self.arena.thread_of(node)).collect();
        for waiter in waiters {
            if let Some(waiting) = self.tcb_mut(waiter).waiting_on.as_mut() {
                waiting.owner = new_owner;
            }
        }
    }

    /// ========================================================================
    /// Test introspection
    /// ========================================================================

    /// Thread indices in run-queue order
    #[cfg(test)]
    pub(crate) fn run_queue_order(&self) -> Vec<ThreadIndex> {
        self.run_queue.iter(&self.arena).filter_map(|node| self.arena.thread_of(node)).collect()
    }

    /// Thread indices in sleep-queue order
    #[cfg(test)]
    pub(crate) fn sleep_queue_order(&self) -> Vec<ThreadIndex> {
        self.sleep_queue.iter(&self.arena).filter_map(|node| self.arena.thread_of(node)).collect()
    }

    #[cfg(test)]
    pub(crate) fn clear_switch_request(&mut self) {
        self.switch_requested = false;
    }

    /// Make `index` the current thread, simulating the context switch a
    /// real port would perform at this point
    #[cfg(test)]
    pub(crate) fn force_current(&mut self, index: ThreadIndex) {
        debug_assert_eq!(self.tcb(index).state, ThreadState::Runnable);
        self.current = index;
        self.switch_requested = false;
    }

    #[cfg(test)]
    pub(crate) fn idle_index(&self) -> Option<ThreadIndex> {
        self.idle
    }

    /// Check the universal scheduling invariants at a stable point
    ///
    /// - the current thread is runnable and its effective priority is the
    ///   maximum among runnable threads
    /// - every thread outside `New`/`Terminated` is linked into exactly one
    ///   sorted thread list
    /// - effective priority never drops below base priority
    #[cfg(test)]
    pub(crate) fn assert_scheduling_invariants(&self) {
        let current = self.tcb(self.current);
        assert_eq!(current.state, ThreadState::Runnable, "current thread not runnable");
        for (index, tcb) in self.threads.iter() {
            assert!(tcb.effective_priority >= tcb.base_priority);
            assert_eq!(
                tcb.state.in_thread_list(),
                self.arena.is_linked(tcb.list_node),
                "thread {} list membership does not match its state",
                index
            );
            if tcb.state == ThreadState::Runnable && index != self.current {
                assert!(
                    current.effective_priority >= tcb.effective_priority,
                    "runnable thread {} outranks the current thread",
                    index
                );
            }
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Helpers shared by the unit tests of the scheduler and the
/// synchronization primitives.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::kernel::thread::PRIORITY_IDLE;

    fn user_entry(_argument: usize) {}

    /// Scheduler with a running main thread at `main_priority` and an idle
    /// thread, mirroring the state right after kernel initialization.
    pub(crate) fn scheduler_with_main(
        main_priority: ThreadPriority,
    ) -> (Scheduler, ThreadIndex) {
        let mut scheduler = Scheduler::new();
        let main = scheduler.add_thread(
            Stack::with_size(Stack::MIN_SIZE),
            main_priority,
            ThreadRoutine::Main,
        );
        scheduler.adopt_main_thread(main);
        let idle = scheduler.add_thread(
            Stack::with_size(Stack::MIN_SIZE),
            PRIORITY_IDLE,
            ThreadRoutine::Idle,
        );
        scheduler.set_idle_thread(idle);
        scheduler.clear_switch_request();
        (scheduler, main)
    }

    /// Add and start a user thread
    pub(crate) fn spawn(scheduler: &mut Scheduler, priority: ThreadPriority) -> ThreadIndex {
        let index = scheduler.add_thread(
            Stack::with_size(Stack::MIN_SIZE),
            priority,
            ThreadRoutine::User { entry: user_entry, argument: 0 },
        );
        scheduler.start_thread(index);
        index
    }

    /// Make `index` the running thread
    pub(crate) fn switch_to(scheduler: &mut Scheduler, index: ThreadIndex) {
        scheduler.force_current(index);
    }
}

// ============================================================================
// Tests
// ============================================================================
