// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Hosted Architecture Port
//!
//! Port used when the crate is built for a target with an operating system
//! (development, CI, `cargo test`). There is no real interrupt controller:
//! masking is a nesting level in an atomic, and a requested context switch
//! is a latched flag the tests can observe through the scheduler.
//!
//! `initialize_stack` builds the same kind of frame a real port would, so
//! stack accounting and the switch-context plumbing behave identically on
//! the host.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::InterruptMask;
use crate::kernel::thread::stack::{EntryFunction, TrapFunction};

/// Emulated interrupt-mask level; 0 = unmasked
static MASK_LEVEL: AtomicU32 = AtomicU32::new(0);

/// Latched context-switch request
static SWITCH_PENDING: AtomicBool = AtomicBool::new(false);

/// Mask normal-priority interrupts, returning the previous mask state
pub(crate) fn enable_interrupt_masking() -> InterruptMask {
    MASK_LEVEL.swap(1, Ordering::AcqRel)
}

/// Restore the mask state returned by a matching enable
pub(crate) fn restore_interrupt_masking(mask: InterruptMask) {
    MASK_LEVEL.store(mask, Ordering::Release)
}

/// Latch a context switch request
///
/// On hardware this pends the switch interrupt; here the flag is simply
/// recorded.
pub(crate) fn request_context_switch() {
    SWITCH_PENDING.store(true, Ordering::Release);
}

/// Whether a context switch has been requested and not yet consumed
#[allow(dead_code)]
pub(crate) fn context_switch_pending() -> bool {
    SWITCH_PENDING.load(Ordering::Acquire)
}

/// The hosted port cannot hand the processor to kernel threads
pub(crate) fn start_scheduling() -> ! {
    panic!("start_scheduling is not available on the hosted port");
}

/// Saved-context frame restored by a context switch
///
/// Layout mirrors a callee-saved-registers-plus-entry frame; the offsets
/// are part of the port contract and pinned by the tests below.
#[repr(C)]
pub(crate) struct SavedContext {
    /// Callee-saved registers, zeroed in a fresh frame
    pub(crate) callee_saved: [usize; 8],
    /// Argument delivered in the first argument register
    pub(crate) argument: usize,
    /// Where the thread returns if its entry function ever returns
    pub(crate) trap: usize,
    /// First instruction of the thread
    pub(crate) entry: usize,
    /// Initial processor status
    pub(crate) status: usize,
}

/// Default processor-status word of a fresh frame
const INITIAL_STATUS: usize = 0x0100_0000;

/// Stack alignment required by the frame
const STACK_ALIGNMENT: usize = 16;

/// Construct the initial stack frame in `buffer`
///
/// Returns the initial stack pointer, which points at the frame just below
/// the aligned top of the buffer.
pub(crate) fn initialize_stack(
    buffer: &mut [u8],
    entry: EntryFunction,
    argument: usize,
    trap: TrapFunction,
) -> usize {
    let base = buffer.as_mut_ptr() as usize;
    let top = (base + buffer.len()) & !(STACK_ALIGNMENT - 1);
    let stack_pointer = (top - core::mem::size_of::<SavedContext>()) & !(STACK_ALIGNMENT - 1);
    assert!(stack_pointer >= base, "stack buffer too small for an initial frame");

    let frame = SavedContext {
        callee_saved: [0; 8],
        argument,
        trap: trap as usize,
        entry: entry as usize,
        status: INITIAL_STATUS,
    };
    // In-bounds and suitably aligned by construction above.
    unsafe {
        core::ptr::write(stack_pointer as *mut SavedContext, frame);
    }
    stack_pointer
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;

    extern "C" fn entry(_argument: usize) -> ! {
        unreachable!()
    }

    extern "C" fn trap() -> ! {
        unreachable!()
    }

    #[test]
    fn test_frame_layout_is_stable() {
        // The switch code restores registers by offset; these are contract.
        assert_eq!(offset_of!(SavedContext, callee_saved), 0);
        assert_eq!(offset_of!(SavedContext, argument), 8 * core::mem::size_of::<usize>());
        assert_eq!(offset_of!(SavedContext, trap), 9 * core::mem::size_of::<usize>());
        assert_eq!(offset_of!(SavedContext, entry), 10 * core::mem::size_of::<usize>());
        assert_eq!(offset_of!(SavedContext, status), 11 * core::mem::size_of::<usize>());
    }

    #[test]
    fn test_initialize_stack_writes_frame() {
        let mut buffer = [0u8; 256];
        let stack_pointer = initialize_stack(&mut buffer, entry, 0x1234, trap);

        assert_eq!(stack_pointer % STACK_ALIGNMENT, 0);
        let frame = unsafe { &*(stack_pointer as *const SavedContext) };
        assert_eq!(frame.argument, 0x1234);
        assert_eq!(frame.entry, entry as usize);
        assert_eq!(frame.trap, trap as usize);
        assert_eq!(frame.status, INITIAL_STATUS);
        assert_eq!(frame.callee_saved, [0; 8]);
    }

    #[test]
    fn test_masking_nests() {
        // Other tests share the emulated mask, so only the save/restore
        // shape is asserted, not absolute levels.
        let outer = enable_interrupt_masking();
        let inner = enable_interrupt_masking();
        restore_interrupt_masking(inner);
        restore_interrupt_masking(outer);
    }

    #[test]
    fn test_context_switch_request_latches() {
        request_context_switch();
        assert!(context_switch_pending());
    }
}
