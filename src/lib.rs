// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Tickos - Preemptive RTOS Kernel Core
//!
//! Tickos is the core of a preemptive real-time operating system kernel for
//! single-core microcontrollers: fixed-priority threads with deterministic
//! scheduling, round-robin time slicing within a priority band, and
//! synchronization primitives (semaphores, mutexes with priority
//! inheritance and ceiling protocols, condition variables, once flags)
//! suitable for hard real-time workloads.
//!
//! # Architecture
//!
//! The scheduler is architecture-neutral; a thin port supplies interrupt
//! masking, initial stack frames, the context-switch trigger and the tick
//! source (see [`kernel::arch`]). On hosted targets the port is emulated,
//! so the complete scheduler state machine runs under `cargo test`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tickos::{kernel, this_thread, Duration, Thread};
//!
//! fn worker(argument: usize) {
//!     loop {
//!         // ...
//!         this_thread::sleep_for(Duration::from_millis(10));
//!     }
//! }
//!
//! kernel::init();
//! let thread = Thread::with_stack_size(2048, 50, worker, 0).unwrap();
//! thread.start();
//! kernel::start();
//! ```

#![no_std]

extern crate alloc;

#[cfg(all(target_os = "none", feature = "panic-halt"))]
use panic_halt as _;

pub mod config;
pub mod kernel;
pub mod status;

pub use kernel::signals::SignalSet;
pub use kernel::sync::{ConditionVariable, InterruptMaskingLock, Mutex, MutexProtocol, MutexType, Semaphore};
#[cfg(feature = "callonce")]
pub use kernel::sync::OnceFlag;
pub use kernel::thread::{this_thread, Stack, Thread, ThreadId, ThreadPriority, ThreadState};
pub use kernel::tick::{Duration, TickClock, TimePoint};
pub use kernel::timer::SoftwareTimer;
pub use status::Status;
