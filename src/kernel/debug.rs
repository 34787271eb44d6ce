// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Logging Support
//!
//! This module provides the logging macros used throughout the kernel. They
//! forward to the [`log`] crate facade so the firmware chooses the sink (a
//! UART writer, a ring buffer, nothing at all). With the `log` feature
//! disabled every macro degrades to a no-op that still type-checks its
//! arguments.
//!
//! The kernel logs lifecycle events only (thread created, scheduler
//! started); error paths return status codes and stay silent.

/// Log a trace message
#[cfg(feature = "log")]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        ::log::trace!(target: "tickos", $($arg)*)
    };
}

/// Log a trace message (no-op: `log` feature disabled)
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Log a debug message
#[cfg(feature = "log")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "tickos", $($arg)*)
    };
}

/// Log a debug message (no-op: `log` feature disabled)
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Log an info message
#[cfg(feature = "log")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        ::log::info!(target: "tickos", $($arg)*)
    };
}

/// Log an info message (no-op: `log` feature disabled)
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Log a warning message
#[cfg(feature = "log")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ::log::warn!(target: "tickos", $($arg)*)
    };
}

/// Log a warning message (no-op: `log` feature disabled)
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Log an error message
#[cfg(feature = "log")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ::log::error!(target: "tickos", $($arg)*)
    };
}

/// Log an error message (no-op: `log` feature disabled)
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

// ============================================================================
// Tests
// ============================================================================
