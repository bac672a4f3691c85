use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(5);

/// What happens when a registered task stops pinging.
pub trait Supervisor: Send + Sync {
    fn expired(&self, task: &str, silent_for: Duration);
}

/// Treats a silent task as fatal: logs and aborts the process so it can be
/// restarted.
pub struct AbortSupervisor;

impl Supervisor for AbortSupervisor {
    fn expired(&self, task: &str, silent_for: Duration) {
        tracing::error!(
            task,
            silent_ms = silent_for.as_millis() as u64,
            "Watchdog expired, aborting"
        );
        std::process::abort();
    }
}

struct Registration {
    name: String,
    last_ping: Instant,
    reported: bool,
}

/// Per-task liveness monitor.
///
/// Each task registers once and must `ping` at least every `timeout`. A
/// background thread reports each lapse to the supervisor once; a later ping
/// re-arms the entry.
pub struct Watchdog {
    timeout: Duration,
    entries: Mutex<HashMap<u64, Registration>>,
    next_id: AtomicU64,
    supervisor: Box<dyn Supervisor>,
}

impl Watchdog {
    pub fn init(timeout: Duration, supervisor: impl Supervisor + 'static) -> io::Result<Arc<Self>> {
        let watchdog = Arc::new(Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            supervisor: Box::new(supervisor),
        });

        let monitor = Arc::downgrade(&watchdog);
        let interval = (timeout / 4).max(MIN_CHECK_INTERVAL);
        thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(interval);
                    match monitor.upgrade() {
                        Some(watchdog) => watchdog.check(),
                        None => break,
                    }
                }
            })?;

        tracing::info!("Watchdog initialized with {:?} timeout", timeout);
        Ok(watchdog)
    }

    pub fn register(self: &Arc<Self>, name: &str) -> WatchdogEntry {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().insert(
            id,
            Registration {
                name: name.to_string(),
                last_ping: Instant::now(),
                reported: false,
            },
        );
        tracing::debug!("{} registered with watchdog", name);

        WatchdogEntry {
            id,
            watchdog: Arc::clone(self),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Names of all currently registered tasks.
    pub fn registered(&self) -> Vec<String> {
        self.entries().values().map(|r| r.name.clone()).collect()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) {
        let now = Instant::now();
        let expired: Vec<(String, Duration)> = self
            .entries()
            .values_mut()
            .filter_map(|r| {
                let silent_for = now.saturating_duration_since(r.last_ping);
                if r.reported || silent_for < self.timeout {
                    return None;
                }
                r.reported = true;
                Some((r.name.clone(), silent_for))
            })
            .collect();

        for (name, silent_for) in expired {
            self.supervisor.expired(&name, silent_for);
        }
    }
}

/// A task's registration. Dropping it unregisters the task.
pub struct WatchdogEntry {
    id: u64,
    watchdog: Arc<Watchdog>,
}

impl WatchdogEntry {
    pub fn ping(&self) {
        if let Some(r) = self.watchdog.entries().get_mut(&self.id) {
            r.last_ping = Instant::now();
            r.reported = false;
        }
    }
}

impl Drop for WatchdogEntry {
    fn drop(&mut self) {
        if let Some(r) = self.watchdog.entries().remove(&self.id) {
            tracing::debug!("{} unregistered from watchdog", r.name);
        }
    }
}
