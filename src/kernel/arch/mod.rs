// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Architecture Port
//!
//! This module selects the architecture port and defines the narrow
//! contract the scheduler requires from it:
//!
//! - `enable_interrupt_masking() -> InterruptMask` and
//!   `restore_interrupt_masking(mask)`: enter and leave the kernel
//!   critical section, nesting-safe
//! - `initialize_stack(buffer, entry, argument, trap) -> stack pointer`:
//!   construct the initial frame a context switch can restore from
//! - `request_context_switch()`: latch a context switch to run as soon as
//!   masking allows (typically a pended software interrupt)
//! - `start_scheduling() -> !`: perform the first context switch; never
//!   returns
//!
//! The port's periodic tick interrupt calls
//! [`crate::kernel::tick_interrupt_handler`] and its context-switch
//! interrupt calls [`crate::kernel::switch_context`].
//!
//! Host builds (anything with an OS) use the hosted port, which emulates
//! interrupt masking with atomics and lets the whole scheduler state
//! machine run under `cargo test`.

/// Saved interrupt-mask state, as returned by `enable_interrupt_masking`
pub(crate) type InterruptMask = u32;

#[cfg(not(target_os = "none"))]
mod hosted;
#[cfg(not(target_os = "none"))]
pub(crate) use hosted::{
    enable_interrupt_masking, initialize_stack, request_context_switch,
    restore_interrupt_masking, start_scheduling,
};

#[cfg(all(target_os = "none", target_arch = "arm"))]
pub mod armv7m;
#[cfg(all(target_os = "none", target_arch = "arm"))]
pub(crate) use armv7m::{
    enable_interrupt_masking, initialize_stack, request_context_switch,
    restore_interrupt_masking, start_scheduling,
};

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
pub mod amd64;
#[cfg(all(target_os = "none", target_arch = "x86_64"))]
pub(crate) use amd64::{
    enable_interrupt_masking, initialize_stack, request_context_switch,
    restore_interrupt_masking, start_scheduling,
};

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
pub mod arm64;
#[cfg(all(target_os = "none", target_arch = "aarch64"))]
pub(crate) use arm64::{
    enable_interrupt_masking, initialize_stack, request_context_switch,
    restore_interrupt_masking, start_scheduling,
};
