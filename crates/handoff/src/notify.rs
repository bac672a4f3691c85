use crate::errors::SyncError;
use crate::semaphore::Semaphore;
use std::time::Duration;

/// One-shot wake-up between two threads.
///
/// `give` never blocks. Any number of gives before a `take` collapse into a
/// single pending signal, which `take` consumes entirely.
pub struct Notify {
    sem: Semaphore,
}

impl Notify {
    pub fn new() -> Result<Self, SyncError> {
        Ok(Self {
            sem: Semaphore::new(0)?,
        })
    }

    pub fn give(&self) -> Result<(), SyncError> {
        self.sem.post()
    }

    /// Wait up to `timeout` for a signal. Returns `Ok(true)` if one arrived.
    pub fn take(&self, timeout: Duration) -> Result<bool, SyncError> {
        if !self.sem.timed_wait(timeout)? {
            return Ok(false);
        }
        while self.sem.try_wait()? {}
        Ok(true)
    }

    pub fn is_pending(&self) -> bool {
        self.sem.value().map(|v| v > 0).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_without_give_times_out() {
        let notify = Notify::new().unwrap();
        assert!(!notify.take(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_multiple_gives_collapse() {
        let notify = Notify::new().unwrap();
        notify.give().unwrap();
        notify.give().unwrap();
        notify.give().unwrap();
        assert!(notify.is_pending());

        assert!(notify.take(Duration::from_millis(10)).unwrap());
        assert!(!notify.is_pending());
        assert!(!notify.take(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_cross_thread_handshake() {
        let ping = Arc::new(Notify::new().unwrap());
        let pong = Arc::new(Notify::new().unwrap());
        let (ping2, pong2) = (Arc::clone(&ping), Arc::clone(&pong));

        let echo = thread::spawn(move || {
            for _ in 0..5 {
                assert!(ping2.take(Duration::from_secs(2)).unwrap());
                pong2.give().unwrap();
            }
        });

        for _ in 0..5 {
            ping.give().unwrap();
            assert!(pong.take(Duration::from_secs(2)).unwrap());
        }
        echo.join().unwrap();
    }
}
