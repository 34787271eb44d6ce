// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Compile-Time Configuration
//!
//! This module collects the configuration knobs the kernel core recognizes.
//! All of them are resolved at compile time; changing one means rebuilding
//! the kernel. The constants are checked against each other below so that an
//! inconsistent combination fails the build instead of misbehaving at run
//! time.
//!
//! Two optional primitives are gated by Cargo features rather than
//! constants: the once-flag (`callonce`) and deferred deletion of detached
//! threads (`thread-detach`).

/// Ticks per second of the system timer.
///
/// Determines the period of `TickClock` and the resolution of every sleep
/// and timeout in the system.
pub const TICK_FREQUENCY: u32 = 1000;

/// Round-robin quanta per second.
///
/// A thread's quantum is `TICK_FREQUENCY / ROUND_ROBIN_FREQUENCY` ticks
/// (rounded to nearest); when it expires and an equal-priority peer is
/// runnable, the running thread rotates to the back of its priority band.
pub const ROUND_ROBIN_FREQUENCY: u32 = 100;

/// Size of the initial (main) thread's stack, bytes
pub const MAIN_THREAD_STACK_SIZE: usize = 4096;

/// Base priority of the initial (main) thread
pub const MAIN_THREAD_PRIORITY: u8 = 127;

/// Size of the idle thread's stack, bytes
pub const IDLE_THREAD_STACK_SIZE: usize = 512;

/// Size of the software-timer thread's stack, bytes
pub const TIMER_THREAD_STACK_SIZE: usize = 1024;

/// Interrupt priority threshold below which the kernel masks interrupts.
///
/// Passed through to the architecture port. `0` means "mask all maskable
/// interrupts"; a non-zero value leaves a high-priority band enabled, and
/// handlers in that band must not call into the scheduler.
pub const ARCHITECTURE_KERNEL_BASEPRI: u8 = 0;

/// Size of the red zone at the bottom of every stack, bytes.
///
/// The guard area is filled with a sentinel pattern when the stack is
/// created; `Stack::check_guard` reports whether it is still intact. `0`
/// disables the guard.
pub const STACK_GUARD_SIZE: usize = 32;

/// Round-robin quantum in ticks, rounded to nearest
pub const ROUND_ROBIN_QUANTUM: u32 =
    (TICK_FREQUENCY + ROUND_ROBIN_FREQUENCY / 2) / ROUND_ROBIN_FREQUENCY;

const _: () = assert!(TICK_FREQUENCY > 0, "TICK_FREQUENCY must be positive and non-zero");
const _: () = assert!(
    ROUND_ROBIN_FREQUENCY > 0,
    "ROUND_ROBIN_FREQUENCY must be positive and non-zero"
);
const _: () = assert!(
    ROUND_ROBIN_QUANTUM > 0,
    "TICK_FREQUENCY and ROUND_ROBIN_FREQUENCY result in a zero round-robin quantum"
);
const _: () = assert!(
    ROUND_ROBIN_QUANTUM <= u8::MAX as u32,
    "TICK_FREQUENCY and ROUND_ROBIN_FREQUENCY result in a too large round-robin quantum"
);
const _: () = assert!(
    MAIN_THREAD_STACK_SIZE > STACK_GUARD_SIZE,
    "MAIN_THREAD_STACK_SIZE must leave room beyond the stack guard"
);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantum_rounding() {
        // 1000 / 100 divides evenly; the rounding term must not change it.
        assert_eq!(ROUND_ROBIN_QUANTUM, TICK_FREQUENCY / ROUND_ROBIN_FREQUENCY);
    }

    #[test]
    fn test_quantum_fits_counter() {
        assert!(ROUND_ROBIN_QUANTUM >= 1);
        assert!(ROUND_ROBIN_QUANTUM <= u8::MAX as u32);
    }
}
