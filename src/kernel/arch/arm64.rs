// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! AArch64 Bare-Metal Architecture Port
//!
//! Interrupt masking sets DAIF.I; the saved mask is the full DAIF image.
//! The context switch is latched and delivered by the platform's IRQ exit
//! path, which calls [`crate::kernel::switch_context`] when the latch is
//! set; the tick source is the generic timer wired to
//! [`crate::kernel::tick_interrupt_handler`].

use core::sync::atomic::{AtomicBool, Ordering};

use aarch64_cpu::asm;

use super::InterruptMask;
use crate::kernel::thread::stack::{EntryFunction, TrapFunction};

static SWITCH_PENDING: AtomicBool = AtomicBool::new(false);

pub(crate) fn enable_interrupt_masking() -> InterruptMask {
    let daif: u64;
    unsafe {
        core::arch::asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
        core::arch::asm!("msr daifset, #2", options(nomem, nostack));
    }
    daif as InterruptMask
}

pub(crate) fn restore_interrupt_masking(mask: InterruptMask) {
    unsafe {
        core::arch::asm!("msr daif, {}", in(reg) mask as u64, options(nomem, nostack));
    }
}

/// Latch the context switch for the IRQ exit path
pub(crate) fn request_context_switch() {
    SWITCH_PENDING.store(true, Ordering::Release);
}

/// Consume the context-switch latch; called by the platform's IRQ exit path
pub fn take_context_switch_request() -> bool {
    SWITCH_PENDING.swap(false, Ordering::AcqRel)
}

pub(crate) fn start_scheduling() -> ! {
    unsafe {
        core::arch::asm!("msr daifclr, #2", options(nomem, nostack));
    }
    request_context_switch();
    loop {
        asm::wfi();
    }
}

/// Construct the initial frame the context-switch path restores:
/// callee-saved x19-x28, frame pointer, link register and the entry /
/// argument image.
pub(crate) fn initialize_stack(
    buffer: &mut [u8],
    entry: EntryFunction,
    argument: usize,
    trap: TrapFunction,
) -> usize {
    let base = buffer.as_mut_ptr() as usize;
    let mut stack_pointer = (base + buffer.len()) & !0b1111;

    let mut push = |value: u64| {
        stack_pointer -= core::mem::size_of::<u64>();
        unsafe {
            (stack_pointer as *mut u64).write_volatile(value);
        }
    };

    push(entry as usize as u64); // resume pc
    push(argument as u64); // x0
    push(trap as usize as u64); // x30 (lr)
    push(0); // x29 (fp)
    for _ in 0..10 {
        push(0); // x19-x28
    }

    assert!(stack_pointer >= base);
    stack_pointer
}
