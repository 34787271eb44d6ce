// Copyright 2026 The Tickos Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! C API
//!
//! Plain-function operations over opaque structures, usable from C. Device
//! drivers written in C consume the semaphore, mutex, condition variable,
//! clock and sleep surfaces through these wrappers.
//!
//! A C caller reserves `TICKOS_*_SIZE` bytes of suitably aligned storage,
//! constructs the object in place and passes the pointer to the operation
//! functions. Every function returns an errno-style status; a null pointer
//! yields [`EINVAL`](crate::status::EINVAL).

use crate::kernel::sync::{ConditionVariable, Mutex, MutexProtocol, MutexType, Semaphore};
use crate::kernel::thread::this_thread;
use crate::kernel::tick::{Duration, TickClock};
use crate::status::{self, Status};

/// Storage size of a [`Semaphore`], bytes
pub const TICKOS_SEMAPHORE_SIZE: usize = core::mem::size_of::<Semaphore>();

/// Storage size of a [`Mutex`], bytes
pub const TICKOS_MUTEX_SIZE: usize = core::mem::size_of::<Mutex>();

/// Storage size of a [`ConditionVariable`], bytes
pub const TICKOS_CONDITION_VARIABLE_SIZE: usize = core::mem::size_of::<ConditionVariable>();

/// Construct a semaphore in caller-provided storage
///
/// # Safety
///
/// `storage` must point to at least [`TICKOS_SEMAPHORE_SIZE`] bytes with
/// the alignment of `usize`, unused by any live object.
#[no_mangle]
pub unsafe extern "C" fn tickos_semaphore_construct(
    storage: *mut Semaphore,
    value: u32,
    max_value: u32,
) -> Status {
    if storage.is_null() {
        return status::EINVAL;
    }
    storage.write(Semaphore::with_max_value(value, max_value));
    status::OK
}

/// # Safety
///
/// `semaphore` must point to a constructed semaphore.
#[no_mangle]
pub unsafe extern "C" fn tickos_semaphore_wait(semaphore: *const Semaphore) -> Status {
    match semaphore.as_ref() {
        Some(semaphore) => semaphore.wait(),
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `semaphore` must point to a constructed semaphore.
#[no_mangle]
pub unsafe extern "C" fn tickos_semaphore_try_wait(semaphore: *const Semaphore) -> Status {
    match semaphore.as_ref() {
        Some(semaphore) => semaphore.try_wait(),
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `semaphore` must point to a constructed semaphore.
#[no_mangle]
pub unsafe extern "C" fn tickos_semaphore_try_wait_for(
    semaphore: *const Semaphore,
    ticks: i64,
) -> Status {
    match semaphore.as_ref() {
        Some(semaphore) => semaphore.try_wait_for(Duration::from_ticks(ticks)),
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `semaphore` must point to a constructed semaphore.
#[no_mangle]
pub unsafe extern "C" fn tickos_semaphore_post(semaphore: *const Semaphore) -> Status {
    match semaphore.as_ref() {
        Some(semaphore) => semaphore.post(),
        None => status::EINVAL,
    }
}

/// Mutex type codes accepted by [`tickos_mutex_construct`]
pub const TICKOS_MUTEX_TYPE_NORMAL: u8 = 0;
pub const TICKOS_MUTEX_TYPE_ERROR_CHECK: u8 = 1;
pub const TICKOS_MUTEX_TYPE_RECURSIVE: u8 = 2;

/// Mutex protocol codes accepted by [`tickos_mutex_construct`]
pub const TICKOS_MUTEX_PROTOCOL_NONE: u8 = 0;
pub const TICKOS_MUTEX_PROTOCOL_INHERIT: u8 = 1;
pub const TICKOS_MUTEX_PROTOCOL_PROTECT: u8 = 2;

/// Construct a mutex in caller-provided storage
///
/// # Safety
///
/// `storage` must point to at least [`TICKOS_MUTEX_SIZE`] bytes with the
/// alignment of `usize`, unused by any live object.
#[no_mangle]
pub unsafe extern "C" fn tickos_mutex_construct(
    storage: *mut Mutex,
    mutex_type: u8,
    protocol: u8,
    priority_ceiling: u8,
) -> Status {
    if storage.is_null() {
        return status::EINVAL;
    }
    let mutex_type = match mutex_type {
        TICKOS_MUTEX_TYPE_NORMAL => MutexType::Normal,
        TICKOS_MUTEX_TYPE_ERROR_CHECK => MutexType::ErrorCheck,
        TICKOS_MUTEX_TYPE_RECURSIVE => MutexType::Recursive,
        _ => return status::EINVAL,
    };
    let protocol = match protocol {
        TICKOS_MUTEX_PROTOCOL_NONE => MutexProtocol::None,
        TICKOS_MUTEX_PROTOCOL_INHERIT => MutexProtocol::Inherit,
        TICKOS_MUTEX_PROTOCOL_PROTECT => MutexProtocol::Protect,
        _ => return status::EINVAL,
    };
    storage.write(Mutex::new(mutex_type, protocol, priority_ceiling));
    status::OK
}

/// # Safety
///
/// `mutex` must point to a constructed mutex.
#[no_mangle]
pub unsafe extern "C" fn tickos_mutex_lock(mutex: *const Mutex) -> Status {
    match mutex.as_ref() {
        Some(mutex) => mutex.lock(),
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `mutex` must point to a constructed mutex.
#[no_mangle]
pub unsafe extern "C" fn tickos_mutex_try_lock(mutex: *const Mutex) -> Status {
    match mutex.as_ref() {
        Some(mutex) => mutex.try_lock(),
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `mutex` must point to a constructed mutex.
#[no_mangle]
pub unsafe extern "C" fn tickos_mutex_unlock(mutex: *const Mutex) -> Status {
    match mutex.as_ref() {
        Some(mutex) => mutex.unlock(),
        None => status::EINVAL,
    }
}

/// Construct a condition variable in caller-provided storage
///
/// # Safety
///
/// `storage` must point to at least [`TICKOS_CONDITION_VARIABLE_SIZE`]
/// bytes with the alignment of `usize`, unused by any live object.
#[no_mangle]
pub unsafe extern "C" fn tickos_condition_variable_construct(
    storage: *mut ConditionVariable,
) -> Status {
    if storage.is_null() {
        return status::EINVAL;
    }
    storage.write(ConditionVariable::new());
    status::OK
}

/// # Safety
///
/// Both pointers must point to constructed objects.
#[no_mangle]
pub unsafe extern "C" fn tickos_condition_variable_wait(
    condition_variable: *const ConditionVariable,
    mutex: *const Mutex,
) -> Status {
    match (condition_variable.as_ref(), mutex.as_ref()) {
        (Some(condition_variable), Some(mutex)) => condition_variable.wait(mutex),
        _ => status::EINVAL,
    }
}

/// # Safety
///
/// `condition_variable` must point to a constructed condition variable.
#[no_mangle]
pub unsafe extern "C" fn tickos_condition_variable_notify_one(
    condition_variable: *const ConditionVariable,
) -> Status {
    match condition_variable.as_ref() {
        Some(condition_variable) => {
            condition_variable.notify_one();
            status::OK
        }
        None => status::EINVAL,
    }
}

/// # Safety
///
/// `condition_variable` must point to a constructed condition variable.
#[no_mangle]
pub unsafe extern "C" fn tickos_condition_variable_notify_all(
    condition_variable: *const ConditionVariable,
) -> Status {
    match condition_variable.as_ref() {
        Some(condition_variable) => {
            condition_variable.notify_all();
            status::OK
        }
        None => status::EINVAL,
    }
}

/// Current tick count
#[no_mangle]
pub extern "C" fn tickos_now() -> i64 {
    TickClock::now().as_ticks()
}

/// Sleep the calling thread for at least `ticks`
#[no_mangle]
pub extern "C" fn tickos_sleep_for(ticks: i64) -> Status {
    this_thread::sleep_for(Duration::from_ticks(ticks))
}

// ============================================================================
// Tests
// ============================================================================
