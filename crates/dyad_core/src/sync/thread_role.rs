//! Thread role tracking.
//!
//! Exactly one thread per sync context plays the core role. It marks itself
//! on startup; everything else is treated as simulation side.

use std::cell::Cell;

use crate::error::{CoreError, CoreResult};

thread_local! {
    static IS_CORE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the calling thread as a core thread for the rest of its life.
///
/// Returns a guard that clears the mark when dropped, so a thread that
/// stops being the core thread (tests, shutdown) does not keep the role.
#[must_use = "the core role is released when the guard is dropped"]
pub fn enter_core_role() -> CoreRoleGuard {
    IS_CORE.with(|flag| flag.set(true));
    CoreRoleGuard { _private: () }
}

/// Returns true if the calling thread currently holds the core role.
#[inline]
#[must_use]
pub fn is_core_thread() -> bool {
    IS_CORE.with(Cell::get)
}

/// Checks that the calling thread holds the core role.
///
/// # Errors
///
/// Returns [`CoreError::WrongThread`] when called from any other thread.
#[inline]
pub fn check_core_thread(operation: &'static str) -> CoreResult<()> {
    if is_core_thread() {
        Ok(())
    } else {
        Err(CoreError::WrongThread { operation })
    }
}

/// Fatal form of [`check_core_thread`].
///
/// # Panics
///
/// Panics when called outside the core thread.
#[inline]
#[track_caller]
pub fn assert_core_thread(operation: &'static str) {
    if let Err(err) = check_core_thread(operation) {
        panic!("usage error: {err}");
    }
}

/// Releases the core role on drop.
pub struct CoreRoleGuard {
    _private: (),
}

impl Drop for CoreRoleGuard {
    fn drop(&mut self) {
        IS_CORE.with(|flag| flag.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_is_thread_local() {
        let guard = enter_core_role();
        assert!(is_core_thread());

        let other = std::thread::spawn(is_core_thread).join().unwrap();
        assert!(!other);

        drop(guard);
        assert!(!is_core_thread());
    }

    #[test]
    fn test_check_reports_operation() {
        let err = check_core_thread("apply").unwrap_err();
        assert_eq!(err, CoreError::WrongThread { operation: "apply" });
    }

    #[test]
    #[should_panic(expected = "usage error")]
    fn test_assert_panics_off_core() {
        assert_core_thread("mutate back object");
    }
}
