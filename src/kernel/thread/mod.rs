// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Management
//!
//! This module provides the thread control block and the public thread API.
//!
//! # Design
//!
//! - Each thread has a unique 64-bit thread ID (TID)
//! - Priorities run from 0 (lowest, idle) to 255 (highest)
//! - A thread's *effective* priority may be boosted above its base priority
//!   by mutexes using the inheritance or ceiling protocol
//! - Every thread that is neither `New` nor `Terminated` is linked into
//!   exactly one sorted thread list; the list it is in defines its state
//! - Thread bodies are a fixed tagged set (main, idle, timer, user) instead
//!   of dynamic dispatch
//!
//! # Thread States
//!
//! ```text
//! New -> Runnable <-> Sleeping / Suspended / BlockedOn*
//!           |
//!           v
//!       Terminated
//! ```

pub mod stack;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::config::ROUND_ROBIN_QUANTUM;
use crate::kernel::list::{NodeIndex, ThreadIndex, ThreadList};
use crate::kernel::sched::BlockOutcome;
use crate::kernel::signals::SignalsReceiver;
use crate::kernel::sync::InterruptMaskingLock;
use crate::kernel::tick::{Duration, TickClock, TimePoint};
use crate::kernel::{finish_blocking, with_scheduler};
use crate::log_debug;
use crate::status::{self, Status};

pub use stack::Stack;

/// ============================================================================
/// Thread ID
/// ============================================================================

/// Thread ID type
pub type ThreadId = u64;

/// Global thread ID allocator
static TID_ALLOCATOR: TidAllocator = TidAllocator::new();

/// Thread ID allocator
struct TidAllocator {
    next: AtomicU64,
}

impl TidAllocator {
    const fn new() -> Self {
        Self {
            next: AtomicU64::new(1), // TID 0 is reserved
        }
    }

    fn allocate(&self) -> ThreadId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// ============================================================================
/// Thread Priority
/// ============================================================================

/// Thread priority (0 = lowest, 255 = highest)
pub type ThreadPriority = u8;

/// Idle thread priority (lowest)
pub const PRIORITY_IDLE: ThreadPriority = 0;

/// Default priority for user threads
pub const PRIORITY_DEFAULT: ThreadPriority = 128;

/// Software-timer thread priority (highest)
pub const PRIORITY_TIMER: ThreadPriority = 255;

/// ============================================================================
/// Thread State
/// ============================================================================

/// Thread scheduling state
///
/// Transitions are driven exclusively by scheduler operations. The running
/// thread is the scheduler's current thread; it stays `Runnable` and at the
/// front of the run queue while it runs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but not yet started
    New,

    /// Ready to run (linked in the run queue)
    Runnable,

    /// Sleeping until a deadline
    Sleeping,

    /// Suspended until explicitly resumed
    Suspended,

    /// Finished; no longer in any list
    Terminated,

    /// Waiting on a semaphore
    BlockedOnSemaphore,

    /// Waiting on a mutex
    BlockedOnMutex,

    /// Waiting on a condition variable
    BlockedOnConditionVariable,

    /// Waiting for a once-flag initializer to finish
    BlockedOnOnceFlag,

    /// Waiting for another thread to terminate
    BlockedOnJoin,
}

impl ThreadState {
    /// Whether the thread is waiting for an event or deadline
    pub const fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::Sleeping
                | Self::BlockedOnSemaphore
                | Self::BlockedOnMutex
                | Self::BlockedOnConditionVariable
                | Self::BlockedOnOnceFlag
                | Self::BlockedOnJoin
        )
    }

    /// Whether the thread has not terminated yet
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Terminated)
    }

    /// Whether the thread is linked into a sorted thread list
    ///
    /// Holds for every state except `New` and `Terminated`.
    pub const fn in_thread_list(self) -> bool {
        !matches!(self, Self::New | Self::Terminated)
    }
}

/// ============================================================================
/// Thread Body
/// ============================================================================

/// What a thread executes
///
/// The kernel's internal threads are a fixed set, so a tagged variant
/// replaces dynamic dispatch.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ThreadRoutine {
    /// The startup context, adopted as a thread at initialization
    Main,

    /// The idle loop
    Idle,

    /// The software-timer callback dispatcher
    Timer,

    /// A user-supplied function
    User { entry: fn(usize), argument: usize },
}

/// ============================================================================
/// Round-Robin Quantum
/// ============================================================================

/// Remaining share of the current round-robin time slice, in ticks
///
/// Decremented by the tick interrupt; when it reaches zero and an
/// equal-priority peer is runnable, the running thread rotates to the back
/// of its priority band.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RoundRobinQuantum {
    quantum: u8,
}

impl RoundRobinQuantum {
    /// Initial value of the quantum, ticks
    pub(crate) const INITIAL: u8 = ROUND_ROBIN_QUANTUM as u8;

    pub(crate) const fn new() -> Self {
        Self { quantum: Self::INITIAL }
    }

    /// Decrement the quantum, saturating at zero
    pub(crate) fn decrement(&mut self) {
        self.quantum = self.quantum.saturating_sub(1);
    }

    pub(crate) const fn is_zero(self) -> bool {
        self.quantum == 0
    }

    /// Restore the quantum to its initial value
    pub(crate) fn reset(&mut self) {
        self.quantum = Self::INITIAL;
    }
}

/// ============================================================================
/// Priority Boosting
/// ============================================================================

/// Why a blocked thread's wait affects another thread's priority
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaitingOn {
    /// Owner of the mutex this thread is blocked on
    pub(crate) owner: ThreadIndex,

    /// Whether that mutex uses the priority-inheritance protocol
    pub(crate) inherit: bool,
}

/// Contribution of one owned mutex to its owner's effective priority
#[derive(Debug, Clone, Copy)]
pub(crate) enum BoostKind {
    /// Boost to the highest waiter priority (priority inheritance)
    Inherit,

    /// Boost to a fixed ceiling (priority protection)
    Ceiling(ThreadPriority),
}

/// Back-reference from a thread to a mutex it owns with a boosting protocol
///
/// Identified by the mutex's blocked list, which outlives the ownership.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoostSource {
    pub(crate) list: ThreadList,
    pub(crate) kind: BoostKind,
}

/// ============================================================================
/// Thread Control Block
/// ============================================================================

/// All per-thread kernel state
#[derive(Debug)]
pub(crate) struct ThreadControlBlock {
    /// Thread ID
    pub(crate) tid: ThreadId,

    /// What the thread executes
    pub(crate) routine: ThreadRoutine,

    /// The thread's stack
    pub(crate) stack: Stack,

    /// Scheduling state
    pub(crate) state: ThreadState,

    /// Base priority
    pub(crate) base_priority: ThreadPriority,

    /// Effective priority, always >= base priority
    pub(crate) effective_priority: ThreadPriority,

    /// Round-robin quantum
    pub(crate) quantum: RoundRobinQuantum,

    /// Node linking this thread into its current state list
    pub(crate) list_node: NodeIndex,

    /// Node linking this thread into the sleep queue
    pub(crate) sleep_node: NodeIndex,

    /// Node linking this thread into its thread group
    pub(crate) group_node: NodeIndex,

    /// Wake cause written by `unblock` and read after resuming
    pub(crate) unblock_value: Status,

    /// Set while blocked on a mutex, for the inheritance chain walk
    pub(crate) waiting_on: Option<WaitingOn>,

    /// Owned mutexes whose protocol boosts this thread's priority
    pub(crate) boost_sources: Vec<BoostSource>,

    /// Pending-signal state
    pub(crate) signals: SignalsReceiver,

    /// Threads waiting in `join` for this thread to terminate
    pub(crate) join_list: ThreadList,

    /// Whether the thread was detached (reclaimed without join)
    pub(crate) detached: bool,
}

impl ThreadControlBlock {
    pub(crate) fn new(
        stack: Stack,
        priority: ThreadPriority,
        routine: ThreadRoutine,
        list_node: NodeIndex,
        sleep_node: NodeIndex,
        join_list: ThreadList,
    ) -> Self {
        Self {
            tid: TID_ALLOCATOR.allocate(),
            routine,
            stack,
            state: ThreadState::New,
            base_priority: priority,
            effective_priority: priority,
            quantum: RoundRobinQuantum::new(),
            list_node,
            sleep_node,
            group_node: 0,
            unblock_value: status::OK,
            waiting_on: None,
            boost_sources: Vec::new(),
            signals: SignalsReceiver::new(),
            join_list,
            detached: false,
        }
    }
}

/// ============================================================================
/// Thread Table
/// ============================================================================

/// Slab of thread control blocks, indexed by [`ThreadIndex`]
#[derive(Debug, Default)]
pub(crate) struct ThreadTable {
    slots: Vec<Option<ThreadControlBlock>>,
    free: Vec<ThreadIndex>,
}

impl ThreadTable {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    pub(crate) fn insert(&mut self, tcb: ThreadControlBlock) -> ThreadIndex {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(tcb);
                index
            }
            None => {
                self.slots.push(Some(tcb));
                self.slots.len() - 1
            }
        }
    }

    pub(crate) fn remove(&mut self, index: ThreadIndex) -> ThreadControlBlock {
        let tcb = self.slots[index].take().expect("removing an empty thread slot");
        self.free.push(index);
        tcb
    }

    pub(crate) fn get(&self, index: ThreadIndex) -> Option<&ThreadControlBlock> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn get_mut(&mut self, index: ThreadIndex) -> Option<&mut ThreadControlBlock> {
        self.slots.get_mut(index).and_then(|slot| slot.as_mut())
    }

    /// Number of live threads
    pub(crate) fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over live (index, tcb) pairs
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ThreadIndex, &ThreadControlBlock)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| slot.as_ref().map(|tcb| (i, tcb)))
    }
}

/// ============================================================================
/// Public Thread Handle
/// ============================================================================

/// Handle to a kernel thread
///
/// The handle stays valid until the thread is reclaimed (joined, or
/// terminated after `detach`); operations on a reclaimed thread return
/// [`EINVAL`](status::EINVAL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thread {
    index: ThreadIndex,
    tid: ThreadId,
}

impl Thread {
    /// Create a new thread in state `New`
    ///
    /// The stack buffer is owned by the thread from here on. Returns
    /// [`EINVAL`](status::EINVAL) if the buffer is smaller than
    /// [`Stack::MIN_SIZE`].
    pub fn new(
        stack_buffer: alloc::boxed::Box<[u8]>,
        priority: ThreadPriority,
        entry: fn(usize),
        argument: usize,
    ) -> Result<Thread, Status> {
        if stack_buffer.len() < Stack::MIN_SIZE {
            return Err(status::EINVAL);
        }
        let stack = Stack::new(stack_buffer);
        let _lock = InterruptMaskingLock::new();
        let (index, tid) = with_scheduler(|scheduler| {
            let index =
                scheduler.add_thread(stack, priority, ThreadRoutine::User { entry, argument });
            (index, scheduler.tcb(index).tid)
        });
        log_debug!("created thread tid={} priority={}", tid, priority);
        Ok(Thread { index, tid })
    }

    /// Create a new thread with a freshly allocated stack of `stack_size` bytes
    pub fn with_stack_size(
        stack_size: usize,
        priority: ThreadPriority,
        entry: fn(usize),
        argument: usize,
    ) -> Result<Thread, Status> {
        Thread::new(alloc::vec![0u8; stack_size].into_boxed_slice(), priority, entry, argument)
    }

    pub(crate) fn from_parts(index: ThreadIndex, tid: ThreadId) -> Thread {
        Thread { index, tid }
    }

    /// Thread ID
    pub fn id(&self) -> ThreadId {
        self.tid
    }

    /// Start the thread: `New` -> `Runnable`
    ///
    /// Preempts the caller immediately if the new thread has a higher
    /// effective priority.
    pub fn start(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            if !scheduler.thread_exists(self.index, self.tid) {
                return status::EINVAL;
            }
            scheduler.start_thread(self.index)
        })
    }

    /// Wait for the thread to terminate
    ///
    /// Returns 0 once the thread has terminated (its resources are
    /// reclaimed), [`EDEADLK`](status::EDEADLK) for a self-join,
    /// [`EINVAL`](status::EINVAL) for a detached or reclaimed thread, or
    /// [`EINTR`](status::EINTR) if the wait was interrupted by a signal.
    pub fn join(&self) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| {
                if !scheduler.thread_exists(self.index, self.tid) {
                    return BlockOutcome::Complete(status::EINVAL);
                }
                if scheduler.current_index() == self.index {
                    return BlockOutcome::Complete(status::EDEADLK);
                }
                let tcb = scheduler.tcb(self.index);
                if tcb.detached {
                    return BlockOutcome::Complete(status::EINVAL);
                }
                if tcb.state == ThreadState::Terminated {
                    return BlockOutcome::Complete(status::OK);
                }
                let join_list = tcb.join_list;
                scheduler.block(join_list, None)
            })
        };
        let ret = finish_blocking(outcome);
        if ret == status::OK {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.reap(self.index, self.tid));
        }
        ret
    }

    /// Detach the thread: its resources are reclaimed on termination
    /// without a join
    #[cfg(feature = "thread-detach")]
    pub fn detach(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            if !scheduler.thread_exists(self.index, self.tid) {
                return status::EINVAL;
            }
            let tcb = scheduler.tcb_mut(self.index);
            if tcb.detached {
                return status::EINVAL;
            }
            tcb.detached = true;
            if tcb.state == ThreadState::Terminated {
                scheduler.reap(self.index, self.tid);
            }
            status::OK
        })
    }

    /// Detach is not compiled in
    #[cfg(not(feature = "thread-detach"))]
    pub fn detach(&self) -> Status {
        status::ENOTSUP
    }

    /// Resume the thread from `Suspended`
    ///
    /// Returns [`EINVAL`](status::EINVAL) if the thread is not suspended.
    /// Preempts the caller if the resumed thread has a higher effective
    /// priority.
    pub fn resume(&self) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            if !scheduler.thread_exists(self.index, self.tid) {
                return status::EINVAL;
            }
            scheduler.resume(self.index)
        })
    }

    /// Generate a signal for this thread
    ///
    /// Marks the signal pending; if the thread is blocked it is woken with
    /// [`EINTR`](status::EINTR).
    pub fn generate_signal(&self, signal: u8) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            if !scheduler.thread_exists(self.index, self.tid) {
                return status::EINVAL;
            }
            scheduler.generate_signal(self.index, signal)
        })
    }

    /// Base priority, `None` if the thread was reclaimed
    pub fn priority(&self) -> Option<ThreadPriority> {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            scheduler
                .thread_exists(self.index, self.tid)
                .then(|| scheduler.tcb(self.index).base_priority)
        })
    }

    /// Effective priority, `None` if the thread was reclaimed
    pub fn effective_priority(&self) -> Option<ThreadPriority> {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            scheduler
                .thread_exists(self.index, self.tid)
                .then(|| scheduler.tcb(self.index).effective_priority)
        })
    }

    /// Change the base priority
    pub fn set_priority(&self, priority: ThreadPriority) -> Status {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            if !scheduler.thread_exists(self.index, self.tid) {
                return status::EINVAL;
            }
            scheduler.set_priority(self.index, priority);
            status::OK
        })
    }

    /// Scheduling state, `None` if the thread was reclaimed
    pub fn state(&self) -> Option<ThreadState> {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            scheduler.thread_exists(self.index, self.tid).then(|| scheduler.tcb(self.index).state)
        })
    }
}

/// ============================================================================
/// Current-Thread Operations
/// ============================================================================

/// Operations on the calling thread
pub mod this_thread {
    use super::*;

    /// Handle to the calling thread
    pub fn get() -> Thread {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            let index = scheduler.current_index();
            Thread::from_parts(index, scheduler.tcb(index).tid)
        })
    }

    /// Move the calling thread behind its equal-priority peers and
    /// reschedule
    pub fn yield_now() {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| scheduler.yield_now());
    }

    /// Sleep for at least `duration`
    ///
    /// Returns 0 after sleeping, or [`EINTR`](status::EINTR) if woken early
    /// by a signal. A zero or negative duration still yields the processor
    /// for one tick boundary.
    pub fn sleep_for(duration: Duration) -> Status {
        sleep_until(TickClock::now() + duration + Duration::from_ticks(1))
    }

    /// Sleep until `deadline`
    ///
    /// Returns 0 once the deadline has been reached,
    /// [`ETIMEDOUT`](status::ETIMEDOUT) immediately if it already passed,
    /// or [`EINTR`](status::EINTR) if woken early by a signal.
    pub fn sleep_until(deadline: TimePoint) -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.sleep_until(deadline))
        };
        finish_blocking(outcome)
    }

    /// Suspend the calling thread until another thread resumes it
    pub fn suspend() -> Status {
        let outcome = {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.suspend_current())
        };
        finish_blocking(outcome)
    }

    /// Terminate the calling thread
    ///
    /// Join waiters are woken; the context switch happens as soon as
    /// interrupt masking is restored.
    pub fn exit() -> ! {
        {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.terminate_current());
        }
        // The pending context switch takes over here and never returns.
        loop {
            core::hint::spin_loop();
        }
    }

    /// Base priority of the calling thread
    pub fn priority() -> ThreadPriority {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| scheduler.tcb(scheduler.current_index()).base_priority)
    }

    /// Change the base priority of the calling thread
    pub fn set_priority(priority: ThreadPriority) {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            let current = scheduler.current_index();
            scheduler.set_priority(current, priority);
        });
    }

    /// Return and clear the calling thread's pending signal set
    pub fn accept_pending_signals() -> crate::kernel::signals::SignalSet {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| {
            let current = scheduler.current_index();
            scheduler.tcb_mut(current).signals.accept_pending()
        })
    }
}

/// ============================================================================
/// Thread Entry Plumbing
/// ============================================================================

/// Entry point every thread starts in
///
/// The architecture port places this function and the thread's table index
/// on the initial stack frame. It dispatches to the thread's routine and
/// terminates the thread if the routine returns.
pub(crate) extern "C" fn thread_runner(index: usize) -> ! {
    let routine = {
        let _lock = InterruptMaskingLock::new();
        with_scheduler(|scheduler| scheduler.tcb(index).routine)
    };

    match routine {
        ThreadRoutine::User { entry, argument } => entry(argument),
        ThreadRoutine::Idle => idle_thread_function(),
        ThreadRoutine::Timer => crate::kernel::timer::timer_thread_function(),
        // The main routine is the startup context itself; it never enters
        // through the runner.
        ThreadRoutine::Main => unreachable!("main thread entered through thread_runner"),
    }

    this_thread::exit()
}

/// Trap for a thread body that returns through the saved link register
pub(crate) extern "C" fn thread_trap() -> ! {
    panic!("thread returned through its trap handler");
}

/// The idle loop
///
/// Runs at priority 0 whenever nothing else is runnable. With the
/// `thread-detach` feature it also reclaims detached terminated threads.
fn idle_thread_function() -> ! {
    let mut counter: u64 = 0;
    loop {
        #[cfg(feature = "thread-detach")]
        {
            let _lock = InterruptMaskingLock::new();
            with_scheduler(|scheduler| scheduler.reap_deferred());
        }
        counter = counter.wrapping_add(1);
        core::hint::spin_loop();
    }
}

// ============================================================================
// Tests
// ============================================================================
