// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Status Codes
//!
//! This module provides the errno-style status codes returned by every
//! fallible kernel entry point. The kernel never panics on a caller error
//! and never logs one; callers surface these values.
//!
//! A return value of `0` means success. All error constants are positive,
//! matching the classic errno numbering so that the C API can hand them to
//! C callers unchanged.

/// Status code type returned by kernel operations
pub type Status = i32;

/// Operation completed successfully
pub const OK: Status = 0;

/// Mutex unlock attempted by a thread that is not the owner
pub const EPERM: Status = 1;

/// Blocked thread was woken by a pending signal rather than the awaited event
pub const EINTR: Status = 4;

/// Non-blocking variant found the resource unavailable
pub const EAGAIN: Status = 11;

/// Try-lock found the mutex locked
pub const EBUSY: Status = 16;

/// Parameter out of range
pub const EINVAL: Status = 22;

/// Relock of a non-recursive mutex by its owner
pub const EDEADLK: Status = 35;

/// Semaphore post beyond its maximum value
pub const EOVERFLOW: Status = 75;

/// Optional feature not compiled in
pub const ENOTSUP: Status = 95;

/// Blocking call's deadline passed
pub const ETIMEDOUT: Status = 110;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            OK, EPERM, EINTR, EAGAIN, EBUSY, EINVAL, EDEADLK, EOVERFLOW, ENOTSUP, ETIMEDOUT,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_errors_are_positive() {
        assert!(EPERM > 0);
        assert!(ETIMEDOUT > 0);
        assert_eq!(OK, 0);
    }
}
