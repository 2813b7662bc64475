//! Linux futex wait/wake on a 32-bit atomic.
//!
//! Both calls use the `*_PRIVATE` operations: the lock word is never shared
//! across processes.

#![allow(unsafe_code)]

use std::io;
use std::ptr;
use std::sync::atomic::AtomicU32;

/// Blocks the calling thread while `*word == expected`.
///
/// Returns `Ok(())` when woken, or immediately if the value already
/// differed (`EAGAIN`) or the wait was interrupted (`EINTR`); callers
/// re-check the word in a loop either way. Any other failure is returned.
pub fn wait_if_equal(word: &AtomicU32, expected: u32) -> io::Result<()> {
    // SAFETY: `word` is a valid, aligned 32-bit cell for the duration of the
    // call; FUTEX_WAIT only reads it. A null timeout means wait indefinitely.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ptr::null::<libc::timespec>(),
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN | libc::EINTR) => Ok(()),
        _ => Err(err),
    }
}

/// Wakes at most one thread blocked in [`wait_if_equal`] on `word`.
/// Returns the number of threads woken.
pub fn wake_one(word: &AtomicU32) -> io::Result<usize> {
    // SAFETY: `word` is a valid, aligned 32-bit cell; FUTEX_WAKE does not
    // dereference it beyond address hashing.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1_i32,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(rc as usize)
}
