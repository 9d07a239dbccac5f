//! Lifecycle state shared by every request.
//!
//! A request moves through two independent, one-way transitions:
//!
//! - **cancelled**: advisory. Set by anyone holding the request (or any
//!   request sharing its [`CancellationFlag`]); processors poll it.
//! - **frozen**: terminal. Set by the processor when it is done with the
//!   request. After that no field may change, and the optional
//!   [`CompletionLatch`] is released exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{RequestError, UsageError};
use crate::kind::RequestType;

// ---------------------------------------------------------------------------
// CancellationFlag
// ---------------------------------------------------------------------------

/// A jointly owned cancellation bit.
///
/// Cloning the flag shares it: every holder observes a cancel made through
/// any other holder. Composite requests hand one flag to all their members.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles refer to the same flag.
    pub fn is_shared_with(&self, other: &CancellationFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CancellationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancellationFlag({})", self.is_cancelled())
    }
}

// ---------------------------------------------------------------------------
// CompletionLatch
// ---------------------------------------------------------------------------

/// A count-down latch: waiters block until the count reaches zero.
///
/// A request holding a latch counts it down once, when it is frozen. One
/// latch may be shared by several requests to wait for all of them.
#[derive(Clone)]
pub struct CompletionLatch {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(count), Condvar::new())),
        }
    }

    /// Decrement the count, waking waiters when it reaches zero.
    pub fn count_down(&self) {
        let (count, zero) = &*self.inner;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                zero.notify_all();
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let (count, zero) = &*self.inner;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = zero.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or the timeout elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (count, zero) = &*self.inner;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = zero
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionLatch(count={})", self.count())
    }
}

// ---------------------------------------------------------------------------
// RequestState
// ---------------------------------------------------------------------------

/// The mutable lifecycle record embedded in every request.
#[derive(Debug)]
pub struct RequestState {
    request_type: RequestType,
    error: Option<RequestError>,
    cancelled: CancellationFlag,
    frozen: bool,
    latch: Option<CompletionLatch>,
}

impl RequestState {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            error: None,
            cancelled: CancellationFlag::new(),
            frozen: false,
            latch: None,
        }
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Fail with [`UsageError::Frozen`] if the request is frozen.
    pub fn check_not_frozen(&self) -> Result<(), UsageError> {
        if self.frozen {
            return Err(UsageError::Frozen {
                request_type: self.request_type,
            });
        }
        Ok(())
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record (or clear, with `None`) the request's error.
    pub fn set_error(&mut self, error: Option<RequestError>) -> Result<(), UsageError> {
        self.check_not_frozen()?;
        self.error = error;
        Ok(())
    }

    /// Mark the request cancelled. Does not freeze it.
    pub fn cancel(&self) -> Result<(), UsageError> {
        self.check_not_frozen()?;
        self.cancelled.cancel();
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancelled
    }

    /// Replace this request's flag with a shared one.
    pub fn share_cancellation(&mut self, flag: &CancellationFlag) {
        self.cancelled = flag.clone();
    }

    /// Register a latch to be counted down when the request is frozen.
    pub fn set_completion_latch(&mut self, latch: CompletionLatch) -> Result<(), UsageError> {
        self.check_not_frozen()?;
        self.latch = Some(latch);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze the request. Returns `false` if it was already frozen.
    ///
    /// The completion latch, if any, is counted down on the first call only.
    pub fn freeze(&mut self) -> bool {
        if self.frozen {
            return false;
        }
        self.frozen = true;
        if let Some(latch) = self.latch.take() {
            latch.count_down();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn state() -> RequestState {
        RequestState::new(RequestType::ReadNode)
    }

    // -----------------------------------------------------------------------
    // Freeze
    // -----------------------------------------------------------------------

    #[test]
    fn freeze_is_one_way() {
        let mut s = state();
        assert!(!s.is_frozen());
        assert!(s.freeze());
        assert!(s.is_frozen());
        assert!(!s.freeze());
    }

    #[test]
    fn frozen_state_rejects_mutation() {
        let mut s = state();
        s.freeze();
        let frozen = UsageError::Frozen {
            request_type: RequestType::ReadNode,
        };
        assert_eq!(s.set_error(Some(RequestError::Connector("x".into()))), Err(frozen.clone()));
        assert_eq!(s.cancel(), Err(frozen.clone()));
        assert_eq!(s.set_completion_latch(CompletionLatch::new(1)), Err(frozen));
        assert!(!s.is_cancelled());
    }

    #[test]
    fn freeze_releases_latch_once() {
        let latch = CompletionLatch::new(2);
        let mut s = state();
        s.set_completion_latch(latch.clone()).unwrap();
        s.freeze();
        s.freeze();
        assert_eq!(latch.count(), 1);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn cancel_does_not_freeze() {
        let s = state();
        s.cancel().unwrap();
        s.cancel().unwrap();
        assert!(s.is_cancelled());
        assert!(!s.is_frozen());
    }

    #[test]
    fn shared_flag_propagates() {
        let flag = CancellationFlag::new();
        let mut a = state();
        let mut b = state();
        a.share_cancellation(&flag);
        b.share_cancellation(&flag);
        a.cancel().unwrap();
        assert!(b.is_cancelled());
        assert!(flag.is_cancelled());
        assert!(a.cancellation_flag().is_shared_with(b.cancellation_flag()));
    }

    // -----------------------------------------------------------------------
    // Latch
    // -----------------------------------------------------------------------

    #[test]
    fn latch_wakes_waiter() {
        let latch = CompletionLatch::new(1);
        let waiter = {
            let latch = latch.clone();
            thread::spawn(move || latch.wait())
        };
        latch.count_down();
        waiter.join().expect("waiter should finish");
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn latch_wait_timeout_expires() {
        let latch = CompletionLatch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
        latch.count_down();
        assert!(latch.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn count_down_saturates_at_zero() {
        let latch = CompletionLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }
}
