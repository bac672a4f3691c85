use nix::sched::{CpuSet, sched_setaffinity};
use nix::unistd::{Pid, gettid};
use std::io;
use std::thread::{self, JoinHandle};

/// How to start one pipeline thread.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub name: String,
    pub cpu: Option<usize>,
    /// Nice value; 0 keeps the inherited priority.
    pub priority: i32,
    pub stack_size: usize,
}

impl TaskContext {
    pub fn new(name: impl Into<String>, stack_size: usize) -> Self {
        Self {
            name: name.into(),
            cpu: None,
            priority: 0,
            stack_size,
        }
    }

    pub fn on_cpu(mut self, cpu: Option<usize>) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Spawn `body` on a named thread, pinned and reprioritized as `ctx` asks.
///
/// Pinning and priority are best effort: a failure is logged and the task runs
/// unpinned.
pub fn spawn<F>(ctx: TaskContext, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let TaskContext {
        name,
        cpu,
        priority,
        stack_size,
    } = ctx;

    thread::Builder::new()
        .name(name.clone())
        .stack_size(stack_size)
        .spawn(move || {
            if let Some(cpu) = cpu {
                match pin_current_thread(cpu) {
                    Ok(()) => tracing::debug!("{} pinned to CPU {}", name, cpu),
                    Err(e) => tracing::warn!("{}: could not pin to CPU {}: {}", name, cpu, e),
                }
            }
            if priority != 0
                && let Err(e) = set_current_priority(priority)
            {
                tracing::warn!("{}: could not set priority {}: {}", name, priority, e);
            }
            body();
        })
}

fn pin_current_thread(cpu: usize) -> nix::Result<()> {
    let mut set = CpuSet::new();
    set.set(cpu)?;
    sched_setaffinity(Pid::from_raw(0), &set)
}

fn set_current_priority(nice: i32) -> nix::Result<()> {
    let tid = gettid();
    let ret = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid.as_raw() as libc::id_t, nice) };
    if ret == -1 {
        return Err(nix::errno::Errno::last());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_named_and_pinned() {
        let (tx, rx) = mpsc::channel();
        let ctx = TaskContext::new("pinned-task", 64 * 1024).on_cpu(Some(0));

        spawn(ctx, move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .unwrap()
        .join()
        .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("pinned-task"));
    }

    #[test]
    fn test_bad_cpu_still_runs() {
        let (tx, rx) = mpsc::channel();
        let ctx = TaskContext::new("unpinnable", 64 * 1024)
            .on_cpu(Some(100_000))
            .with_priority(1);

        spawn(ctx, move || tx.send(()).unwrap()).unwrap().join().unwrap();
        assert!(rx.recv().is_ok());
    }
}
