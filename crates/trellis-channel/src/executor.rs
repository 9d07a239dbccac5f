//! Where channel workers run.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

/// A unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks in the background.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task) -> Result<()>;
}

/// Runs every task on a fresh, named thread.
#[derive(Clone, Debug)]
pub struct ThreadExecutor {
    thread_name: String,
}

impl ThreadExecutor {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new(ChannelConfig::default().thread_name)
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(task)
            .map(|_| ())
            .map_err(|e| ChannelError::Rejected(e.to_string()))
    }
}

/// A fixed set of threads fed from one queue.
///
/// Dropping the pool stops accepting tasks and joins the workers once the
/// queued tasks have run.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(thread_name: &str, size: usize) -> Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("{thread_name}-{index}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            warn!("pool task panicked");
                        }
                    }
                })
                .map_err(|e| ChannelError::Rejected(e.to_string()))?;
            workers.push(worker);
        }
        debug!(size, "worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting tasks and wait for the workers to drain the queue.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("pool worker exited abnormally");
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ChannelError::Rejected("worker pool is shut down".into()))?;
        sender
            .send(task)
            .map_err(|_| ChannelError::Rejected("worker pool is shut down".into()))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("accepting", &self.sender.is_some())
            .finish()
    }
}

/// The executor described by `config`: a pool when `worker_threads > 0`,
/// otherwise a thread per task.
pub fn executor_for(config: &ChannelConfig) -> Result<Box<dyn Executor>> {
    if config.worker_threads == 0 {
        Ok(Box::new(ThreadExecutor::new(config.thread_name.clone())))
    } else {
        Ok(Box::new(WorkerPool::new(&config.thread_name, config.worker_threads)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn thread_executor_names_thread() {
        let (tx, rx) = channel::bounded(1);
        ThreadExecutor::new("named-worker")
            .execute(Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).expect("receiver alive");
            }))
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("named-worker"));
    }

    #[test]
    fn pool_runs_all_tasks_before_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("pool", 3).unwrap();
        assert_eq!(pool.size(), 3);
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(pool.execute(Box::new(|| {})).is_err());
    }

    #[test]
    fn pool_survives_panicking_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("pool", 1).unwrap();
        pool.execute(Box::new(|| panic!("task failure"))).unwrap();
        let after = Arc::clone(&counter);
        pool.execute(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_selects_executor() {
        let config = ChannelConfig {
            worker_threads: 2,
            ..ChannelConfig::default()
        };
        let executor = executor_for(&config).unwrap();
        let (tx, rx) = channel::bounded(1);
        executor
            .execute(Box::new(move || tx.send(()).expect("receiver alive")))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
