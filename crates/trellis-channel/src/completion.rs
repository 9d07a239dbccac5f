use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ChannelError, Result};

/// State of a channel worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        !matches!(self, Outcome::Running)
    }

    fn into_result(self) -> Result<()> {
        match self {
            Outcome::Running | Outcome::Completed => Ok(()),
            Outcome::Failed(message) => Err(ChannelError::Execution(message)),
            Outcome::Cancelled => Err(ChannelError::Cancelled),
        }
    }
}

/// Handle on a worker task's completion.
///
/// The first transition out of [`Outcome::Running`] wins; later ones are
/// ignored, so a cancelled worker that finishes anyway stays cancelled.
#[derive(Clone, Debug)]
pub struct CompletionHandle {
    inner: Arc<(Mutex<Outcome>, Condvar)>,
}

impl CompletionHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(Outcome::Running), Condvar::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Outcome> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, outcome: Outcome) -> bool {
        let mut current = self.lock();
        if current.is_done() {
            return false;
        }
        *current = outcome;
        self.inner.1.notify_all();
        true
    }

    pub fn complete(&self) -> bool {
        self.finish(Outcome::Completed)
    }

    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.finish(Outcome::Failed(message.into()))
    }

    pub fn cancel(&self) -> bool {
        self.finish(Outcome::Cancelled)
    }

    pub fn outcome(&self) -> Outcome {
        self.lock().clone()
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_done()
    }

    /// Block until the worker is done.
    pub fn wait(&self) -> Result<()> {
        let mut current = self.lock();
        while !current.is_done() {
            current = self
                .inner
                .1
                .wait(current)
                .unwrap_or_else(PoisonError::into_inner);
        }
        current.clone().into_result()
    }

    /// Block until the worker is done or the timeout elapses.
    ///
    /// Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let deadline = Instant::now() + timeout;
        let mut current = self.lock();
        while !current.is_done() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            current = self
                .inner
                .1
                .wait_timeout(current, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Some(current.clone().into_result())
    }
}

impl Default for CompletionHandle {
    fn default() -> Self {
        Self::new()
    }
}
