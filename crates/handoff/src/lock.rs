use crate::errors::SyncError;
use crate::semaphore::Semaphore;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Mutual exclusion with a deadline on every acquisition.
///
/// A binary semaphore guards the value; callers either get the guard within
/// the timeout or a `SyncError::Timeout` they can recover from.
pub struct TimedLock<T> {
    sem: Semaphore,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for TimedLock<T> {}
unsafe impl<T: Send> Sync for TimedLock<T> {}

impl<T> TimedLock<T> {
    pub fn new(value: T) -> Result<Self, SyncError> {
        Ok(Self {
            sem: Semaphore::new(1)?,
            value: UnsafeCell::new(value),
        })
    }

    pub fn lock_timeout(&self, timeout: Duration) -> Result<TimedGuard<'_, T>, SyncError> {
        if self.sem.timed_wait(timeout)? {
            Ok(TimedGuard { lock: self })
        } else {
            Err(SyncError::Timeout(timeout))
        }
    }

    pub fn try_lock(&self) -> Result<TimedGuard<'_, T>, SyncError> {
        if self.sem.try_wait()? {
            Ok(TimedGuard { lock: self })
        } else {
            Err(SyncError::Busy)
        }
    }

    pub fn is_locked(&self) -> bool {
        self.sem.value().map(|v| v == 0).unwrap_or(false)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

pub struct TimedGuard<'a, T> {
    lock: &'a TimedLock<T>,
}

impl<T> Deref for TimedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for TimedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for TimedGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.sem.post() {
            tracing::error!("Failed to release timed lock: {}", e);
        }
    }
}
