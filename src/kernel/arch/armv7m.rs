// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! ARMv7-M Architecture Port (Cortex-M3 / Cortex-M4 / Cortex-M7)
//!
//! - Interrupt masking uses BASEPRI when [`ARCHITECTURE_KERNEL_BASEPRI`] is
//!   non-zero, leaving the higher-priority band enabled; otherwise PRIMASK
//!   masks everything
//! - The context switch runs in PendSV at the lowest exception priority, so
//!   it fires exactly when the last interrupt-masking guard is released
//! - SysTick is the tick source
//! - Floating-point context is stacked lazily by the hardware; the PendSV
//!   handler saves s16-s31 only when the outgoing thread used the FPU
//!
//! The firmware must call [`configure_sys_tick`] with the reload value for
//! its core clock before [`crate::kernel::start`].

use core::sync::atomic::{AtomicU32, Ordering};

use super::InterruptMask;
use crate::config::{ARCHITECTURE_KERNEL_BASEPRI, STACK_GUARD_SIZE};
use crate::kernel::thread::stack::{EntryFunction, TrapFunction};

/// Priority bits implemented by the NVIC (vendor-specific; 4 covers the
/// common STM32 parts)
const NVIC_PRIO_BITS: u32 = 4;

/// BASEPRI register value for the configured kernel masking threshold
const BASEPRI_VALUE: u32 = (ARCHITECTURE_KERNEL_BASEPRI as u32) << (8 - NVIC_PRIO_BITS);

/// Interrupt control and state register
const ICSR: *mut u32 = 0xe000_ed04 as *mut u32;

/// PENDSVSET bit in ICSR
const ICSR_PENDSVSET: u32 = 1 << 28;

/// System handler priority register 3 (PendSV and SysTick priorities)
const SHPR3: *mut u32 = 0xe000_ed20 as *mut u32;

/// SysTick control / reload / current-value registers
const SYST_CSR: *mut u32 = 0xe000_e010 as *mut u32;
const SYST_RVR: *mut u32 = 0xe000_e014 as *mut u32;
const SYST_CVR: *mut u32 = 0xe000_e018 as *mut u32;

/// SysTick: processor clock, interrupt enabled, counter enabled
const SYST_CSR_ENABLE: u32 = 0b111;

static SYS_TICK_RELOAD: AtomicU32 = AtomicU32::new(0);

/// Record the SysTick reload value for the firmware's core clock
/// (`core_clock_hz / TICK_FREQUENCY - 1`)
pub fn configure_sys_tick(reload: u32) {
    SYS_TICK_RELOAD.store(reload, Ordering::Release);
}

pub(crate) fn enable_interrupt_masking() -> InterruptMask {
    let mask: u32;
    unsafe {
        if ARCHITECTURE_KERNEL_BASEPRI != 0 {
            core::arch::asm!("mrs {}, basepri", out(reg) mask, options(nomem, nostack));
            core::arch::asm!("msr basepri, {}", in(reg) BASEPRI_VALUE, options(nomem, nostack));
        } else {
            core::arch::asm!("mrs {}, primask", out(reg) mask, options(nomem, nostack));
            core::arch::asm!("cpsid i", options(nomem, nostack));
        }
    }
    mask
}

pub(crate) fn restore_interrupt_masking(mask: InterruptMask) {
    unsafe {
        if ARCHITECTURE_KERNEL_BASEPRI != 0 {
            core::arch::asm!("msr basepri, {}", in(reg) mask, options(nomem, nostack));
        } else {
            core::arch::asm!("msr primask, {}", in(reg) mask, options(nomem, nostack));
        }
    }
}

/// Pend PendSV; the switch executes once masking is fully restored
pub(crate) fn request_context_switch() {
    unsafe {
        ICSR.write_volatile(ICSR_PENDSVSET);
    }
}

/// Start SysTick, drop to the process stack and pend the first switch
pub(crate) fn start_scheduling() -> ! {
    unsafe {
        // PendSV and SysTick at the lowest exception priority.
        SHPR3.write_volatile(0xffff_0000);

        let reload = SYS_TICK_RELOAD.load(Ordering::Acquire);
        SYST_RVR.write_volatile(reload);
        SYST_CVR.write_volatile(0);
        SYST_CSR.write_volatile(SYST_CSR_ENABLE);
    }
    request_context_switch();
    unsafe {
        core::arch::asm!("cpsie i", options(nomem, nostack));
    }
    // The pended PendSV switches into the highest-priority thread; the
    // startup context is captured as the main thread on the way out.
    loop {
        unsafe {
            core::arch::asm!("wfi", options(nomem, nostack));
        }
    }
}

/// Construct the exception-return stack frame
///
/// Hardware-stacked part (top down): xPSR, PC, LR, R12, R3-R0; below it the
/// software-stacked R11-R4, matching the PendSV handler. Register slots are
/// filled with recognizable patterns to aid crash dumps.
pub(crate) fn initialize_stack(
    buffer: &mut [u8],
    entry: EntryFunction,
    argument: usize,
    trap: TrapFunction,
) -> usize {
    let base = buffer.as_mut_ptr() as usize;
    let mut stack_pointer = (base + buffer.len()) & !0b111;

    let mut push = |value: u32| {
        stack_pointer -= core::mem::size_of::<u32>();
        unsafe {
            (stack_pointer as *mut u32).write_volatile(value);
        }
    };

    push(0x0100_0000); // xPSR (thumb state)
    push(entry as usize as u32); // pc
    push(trap as usize as u32); // lr
    push(0xcccc_cccc); // r12
    push(0x3333_3333); // r3
    push(0x2222_2222); // r2
    push(0x1111_1111); // r1
    push(argument as u32); // r0
    push(0xbbbb_bbbb); // r11
    push(0xaaaa_aaaa); // r10
    push(0x9999_9999); // r9
    push(0x8888_8888); // r8
    push(0x7777_7777); // r7
    push(0x6666_6666); // r6
    push(0x5555_5555); // r5
    push(0x4444_4444); // r4

    assert!(stack_pointer >= base + STACK_GUARD_SIZE);
    stack_pointer
}

/// Scheduler half of the context switch, called from the PendSV assembly
#[no_mangle]
extern "C" fn tickos_switch_context(stack_pointer: usize) -> usize {
    crate::kernel::switch_context(stack_pointer)
}

/// Tick interrupt
#[no_mangle]
pub extern "C" fn SysTick() {
    crate::kernel::tick_interrupt_handler();
}

// PendSV: save the outgoing thread's software-stacked registers on its
// process stack, switch, and restore the incoming thread's.
//
// On parts with an FPU, lazy stacking (FPCCR.LSPEN) defers the caller-saved
// floating-point context; a port for an FPU-enabled build additionally
// stores s16-s31 when EXC_RETURN bit 4 is clear.
#[cfg(target_feature = "vfp2")]
core::arch::global_asm!(
    r#"
    .syntax unified
    .thumb
    .global PendSV
    .type PendSV, %function
    .thumb_func
PendSV:
    mrs     r0, psp
    tst     lr, #(1 << 4)
    it      eq
    vstmdbeq r0!, {{s16-s31}}
    stmdb   r0!, {{r4-r12, lr}}
    bl      tickos_switch_context
    ldmia   r0!, {{r4-r12, lr}}
    tst     lr, #(1 << 4)
    it      eq
    vldmiaeq r0!, {{s16-s31}}
    msr     psp, r0
    bx      lr
    .size PendSV, . - PendSV
"#
);

#[cfg(not(target_feature = "vfp2"))]
core::arch::global_asm!(
    r#"
    .syntax unified
    .thumb
    .global PendSV
    .type PendSV, %function
    .thumb_func
PendSV:
    mrs     r0, psp
    stmdb   r0!, {{r4-r11}}
    mov     r4, lr
    bl      tickos_switch_context
    mov     lr, r4
    ldmia   r0!, {{r4-r11}}
    msr     psp, r0
    bx      lr
    .size PendSV, . - PendSV
"#
);
