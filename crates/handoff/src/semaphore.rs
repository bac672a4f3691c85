use crate::errors::SyncError;
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use std::cell::UnsafeCell;
use std::os::raw::c_int;
use std::time::Duration;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
unsafe extern "C" {
    // glibc 2.30+
    fn sem_clockwait(
        sem: *mut libc::sem_t,
        clockid: libc::clockid_t,
        abstime: *const libc::timespec,
    ) -> c_int;
}

/// Clock that `timed_wait` deadlines are measured against.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub const DEADLINE_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

/// Clock that `timed_wait` deadlines are measured against.
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub const DEADLINE_CLOCK: ClockId = ClockId::CLOCK_REALTIME;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
unsafe fn wait_until(sem: *mut libc::sem_t, deadline: &TimeSpec) -> c_int {
    unsafe { sem_clockwait(sem, DEADLINE_CLOCK.as_raw(), deadline.as_ref()) }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
unsafe fn wait_until(sem: *mut libc::sem_t, deadline: &TimeSpec) -> c_int {
    unsafe { libc::sem_timedwait(sem, deadline.as_ref()) }
}

/// Process-private counting semaphore (`sem_init` with `pshared = 0`).
///
/// The `sem_t` lives in its own heap allocation so its address stays fixed
/// for as long as the semaphore exists, as POSIX requires.
pub struct Semaphore {
    sem: Box<UnsafeCell<libc::sem_t>>,
}

impl Semaphore {
    pub fn new(initial_value: u32) -> Result<Self, SyncError> {
        let sem: Box<UnsafeCell<libc::sem_t>> =
            Box::new(UnsafeCell::new(unsafe { std::mem::zeroed() }));

        let ret = unsafe { libc::sem_init(sem.get(), 0, initial_value) };
        if ret != 0 {
            return Err(SyncError::Semaphore(Errno::last()));
        }

        Ok(Self { sem })
    }

    /// Block until the count can be decremented.
    pub fn wait(&self) -> Result<(), SyncError> {
        loop {
            let ret = unsafe { libc::sem_wait(self.sem.get()) };
            if ret == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(SyncError::Semaphore(errno)),
            }
        }
    }

    /// Decrement the count, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` when the deadline passes first. On glibc the
    /// deadline follows `CLOCK_MONOTONIC`, so wall-clock steps do not move it.
    pub fn timed_wait(&self, timeout: Duration) -> Result<bool, SyncError> {
        let deadline = clock_gettime(DEADLINE_CLOCK)? + TimeSpec::from_duration(timeout);

        loop {
            let ret = unsafe { wait_until(self.sem.get(), &deadline) };
            if ret == 0 {
                return Ok(true);
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::ETIMEDOUT => return Ok(false),
                errno => return Err(SyncError::Semaphore(errno)),
            }
        }
    }

    pub fn try_wait(&self) -> Result<bool, SyncError> {
        let ret = unsafe { libc::sem_trywait(self.sem.get()) };
        if ret == 0 {
            Ok(true)
        } else {
            match Errno::last() {
                Errno::EAGAIN => Ok(false),
                errno => Err(SyncError::Semaphore(errno)),
            }
        }
    }

    pub fn post(&self) -> Result<(), SyncError> {
        let ret = unsafe { libc::sem_post(self.sem.get()) };
        if ret != 0 {
            return Err(SyncError::Semaphore(Errno::last()));
        }
        Ok(())
    }

    pub fn value(&self) -> Result<i32, SyncError> {
        let mut val: c_int = 0;
        let ret = unsafe { libc::sem_getvalue(self.sem.get(), &mut val) };
        if ret != 0 {
            return Err(SyncError::Semaphore(Errno::last()));
        }
        Ok(val)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_destroy(self.sem.get());
        }
    }
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}
