//! Blocking mutex with timeouts.
//!
//! For call sites that need more than the advisory `Busy` flag, e.g. a bus
//! shared by several logical devices. The lock itself is a `spin::Mutex`;
//! waiting is bounded by a [`Deadline`] on the caller's [`Clock`].
//!
//! The buffer and lifecycle machinery never uses this type.

use crate::error::HalError;
use crate::time::{Clock, Deadline, Timeout};

pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Mutual exclusion with bounded waiting.
///
/// Created with [`Mutex::new`], destroyed by dropping it. Unlocking is
/// unconditional: dropping the guard (or passing it to [`Mutex::unlock`])
/// always releases.
pub struct Mutex<T> {
    inner: spin::Mutex<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// Lock, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// `Timeout` if the lock is still held when the deadline passes.
    pub fn lock<C: Clock + ?Sized>(
        &self,
        clock: &C,
        timeout: Timeout,
    ) -> Result<MutexGuard<'_, T>, HalError> {
        if let Some(guard) = self.inner.try_lock() {
            return Ok(guard);
        }

        let deadline = Deadline::start(clock, timeout);
        loop {
            if let Some(guard) = self.inner.try_lock() {
                return Ok(guard);
            }
            if deadline.expired(clock) {
                return Err(HalError::Timeout);
            }
            core::hint::spin_loop();
        }
    }

    /// Lock with a zero timeout.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, HalError> {
        self.inner.try_lock().ok_or(HalError::Timeout)
    }

    /// Release a held lock.
    pub fn unlock(guard: MutexGuard<'_, T>) {
        drop(guard);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimClock;

    #[test]
    fn try_lock_is_zero_timeout_lock() {
        let clock = SimClock::new(1);
        let mutex = Mutex::new(0u8);

        let guard = mutex.lock(&clock, Timeout::Forever).unwrap();
        assert_eq!(mutex.try_lock().err(), Some(HalError::Timeout));
        assert_eq!(
            mutex.lock(&clock, Timeout::Immediate).err(),
            Some(HalError::Timeout)
        );
        Mutex::unlock(guard);

        assert!(mutex.try_lock().is_ok());
    }

    #[test]
    fn lock_times_out_while_held() {
        let clock = SimClock::new(1);
        let mutex = Mutex::new(());
        let _held = mutex.try_lock().unwrap();

        assert_eq!(
            mutex.lock(&clock, Timeout::Millis(5)).err(),
            Some(HalError::Timeout)
        );
    }

    #[test]
    fn guard_gives_exclusive_access() {
        let clock = SimClock::new(1);
        let mutex = Mutex::new(10u32);
        {
            let mut guard = mutex.lock(&clock, Timeout::Millis(1)).unwrap();
            *guard += 5;
        }
        assert!(!mutex.is_locked());
        assert_eq!(mutex.into_inner(), 15);
    }
}
