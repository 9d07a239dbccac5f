use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, warn};
use trellis_request::{BatchRequestBuilder, CancellationFlag, CompletionLatch, Request, RequestKind};

use crate::completion::CompletionHandle;
use crate::composite::ChannelComposite;
use crate::consumer::ChannelConsumer;
use crate::error::{ChannelError, Result};
use crate::executor::{Executor, Task};
use crate::sink::ChannelSink;
use crate::SharedRequest;

/// How often [`CompositeRequestChannel::add_and_await`] checks whether the
/// worker has died without processing its request.
const AWAIT_POLL: Duration = Duration::from_millis(50);

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "consumer panicked".to_string()
    }
}

struct Pending {
    queue: Receiver<SharedRequest>,
    interrupt: Receiver<()>,
}

/// A producer/consumer pipe streaming requests into one consumer.
///
/// Any number of threads may [`add`](Self::add) requests. A single worker,
/// started with [`start`](Self::start), hands them to the consumer as one
/// [`ChannelComposite`] whose size is unknown until [`close`](Self::close).
/// Every request added shares the channel's cancellation flag.
pub struct CompositeRequestChannel {
    log: Mutex<Vec<SharedRequest>>,
    sender: Mutex<Option<Sender<SharedRequest>>>,
    pending: Mutex<Option<Pending>>,
    interrupt: Sender<()>,
    closed: AtomicBool,
    cancellation: CancellationFlag,
    completion: Mutex<Option<CompletionHandle>>,
}

impl CompositeRequestChannel {
    pub fn new() -> Self {
        let (sender, queue) = channel::unbounded();
        let (interrupt, interrupt_rx) = channel::bounded(1);
        Self {
            log: Mutex::new(Vec::new()),
            sender: Mutex::new(Some(sender)),
            pending: Mutex::new(Some(Pending {
                queue,
                interrupt: interrupt_rx,
            })),
            interrupt,
            closed: AtomicBool::new(false),
            cancellation: CancellationFlag::new(),
            completion: Mutex::new(None),
        }
    }

    /// Run the consumer on `executor`. May be called once.
    ///
    /// The returned handle completes when the consumer has drained the
    /// channel; consumer errors and panics surface as
    /// [`ChannelError::Execution`].
    pub fn start(
        &self,
        executor: &dyn Executor,
        consumer: ChannelConsumer,
        close_consumer_on_completion: bool,
    ) -> Result<CompletionHandle> {
        let Pending { queue, interrupt } =
            guard(&self.pending).take().ok_or(ChannelError::AlreadyStarted)?;

        let handle = CompletionHandle::new();
        if self.cancellation.is_cancelled() {
            handle.cancel();
        }
        *guard(&self.completion) = Some(handle.clone());

        let mut composite = ChannelComposite::new(queue, interrupt, self.cancellation.clone());
        let worker = handle.clone();
        let task: Task = Box::new(move || {
            let mut consumer = consumer;
            debug!(?consumer, "channel worker running");
            let consumed =
                panic::catch_unwind(AssertUnwindSafe(|| consumer.consume(&mut composite)));
            let closed = if close_consumer_on_completion {
                consumer.close()
            } else {
                Ok(())
            };
            let delivered = composite.delivered().len();
            let failure = match (consumed, closed) {
                (Ok(Ok(())), Ok(())) => None,
                (Ok(Err(error)), _) => Some(error.to_string()),
                (Err(payload), _) => Some(panic_message(payload.as_ref())),
                (Ok(Ok(())), Err(error)) => Some(format!("closing consumer: {error}")),
            };
            match failure {
                None => {
                    info!(delivered, "channel worker completed");
                    worker.complete();
                }
                Some(message) => {
                    warn!(delivered, error = %message, "channel worker failed");
                    worker.fail(message);
                }
            }
        });

        if let Err(error) = executor.execute(task) {
            handle.fail(error.to_string());
            return Err(error);
        }
        info!(close_consumer_on_completion, "channel started");
        Ok(handle)
    }

    /// Submit a request to the consumer.
    ///
    /// The request joins the channel's cancellation flag. Fails with
    /// [`ChannelError::Closed`] once the channel is closed.
    pub fn add(&self, request: impl Into<Request>) -> Result<SharedRequest> {
        let mut request = request.into();
        request.share_cancellation(&self.cancellation);
        self.enqueue(request)
    }

    /// Like [`add`](Self::add), registering `latch` to be counted down when
    /// the consumer freezes the request.
    pub fn add_with_latch(
        &self,
        request: impl Into<Request>,
        latch: CompletionLatch,
    ) -> Result<SharedRequest> {
        let mut request = request.into();
        request.set_completion_latch(latch)?;
        request.share_cancellation(&self.cancellation);
        self.enqueue(request)
    }

    /// Add a request and block until the consumer has frozen it.
    ///
    /// Fails if the worker finishes without processing the request, for
    /// example because the channel was cancelled with an interrupt.
    pub fn add_and_await(&self, request: impl Into<Request>) -> Result<SharedRequest> {
        let latch = CompletionLatch::new(1);
        let shared = self.add_with_latch(request, latch.clone())?;
        loop {
            if latch.wait_timeout(AWAIT_POLL) {
                return Ok(shared);
            }
            let Some(handle) = self.completion_handle() else {
                continue;
            };
            if handle.is_done() && !latch.wait_timeout(Duration::ZERO) {
                handle.wait()?;
                return Err(ChannelError::Execution(
                    "worker finished without processing the request".into(),
                ));
            }
        }
    }

    fn enqueue(&self, request: Request) -> Result<SharedRequest> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let sender = guard(&self.sender);
        let tx = sender.as_ref().ok_or(ChannelError::Closed)?;
        let request_type = request.request_type();
        let shared: SharedRequest = Arc::new(Mutex::new(request));
        tx.send(Arc::clone(&shared))
            .map_err(|_| ChannelError::Closed)?;
        let mut log = guard(&self.log);
        log.push(Arc::clone(&shared));
        debug!(%request_type, position = log.len(), "request added to channel");
        Ok(shared)
    }

    /// Signal that no more requests will be added. Requests already added
    /// are still delivered.
    ///
    /// Returns `false` if the channel was already closed.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        guard(&self.sender).take();
        info!(added = guard(&self.log).len(), "channel closed");
        true
    }

    /// Cancel every request in the channel, close it, and cancel the worker's
    /// completion handle.
    ///
    /// With `may_interrupt`, a consumer blocked waiting for input is released
    /// immediately and requests still queued are never delivered.
    pub fn cancel(&self, may_interrupt: bool) {
        self.cancellation.cancel();
        self.close();
        if may_interrupt {
            // A full slot means an interrupt is already pending.
            let _ = self.interrupt.try_send(());
        }
        let handle_cancelled = self
            .completion_handle()
            .map(|handle| handle.cancel())
            .unwrap_or(false);
        info!(may_interrupt, handle_cancelled, "channel cancelled");
    }

    /// Block until the worker is done.
    pub fn wait(&self) -> Result<()> {
        self.completion_handle()
            .ok_or(ChannelError::NotStarted)?
            .wait()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Every request ever added, in order, whether or not it was delivered.
    pub fn all_requests(&self) -> Vec<SharedRequest> {
        guard(&self.log).clone()
    }

    pub fn completion_handle(&self) -> Option<CompletionHandle> {
        guard(&self.completion).clone()
    }

    /// A builder whose finished requests are added to this channel.
    pub fn builder(self: &Arc<Self>) -> BatchRequestBuilder<ChannelSink> {
        BatchRequestBuilder::with_sink(ChannelSink::new(Arc::clone(self)))
    }
}

impl Default for CompositeRequestChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompositeRequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRequestChannel")
            .field("added", &guard(&self.log).len())
            .field("closed", &self.is_closed())
            .field("cancelled", &self.is_cancelled())
            .field("started", &guard(&self.pending).is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::lock;
    use crate::consumer::{drain_composite, Processor};
    use crate::error::ConsumerError;
    use crate::executor::ThreadExecutor;
    use crate::completion::Outcome;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use trellis_request::{
        GetWorkspacesRequest, HookResult, RequestError, RequestProcessor, RequestType,
        VerifyNodeExistsRequest,
    };
    use trellis_types::{Location, Path};

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Confirms every node under `/ok`; records the order it saw requests in.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicUsize>,
    }

    impl RequestProcessor for Recorder {
        fn source_name(&self) -> &str {
            "recorder"
        }

        fn verify_node_exists(&mut self, request: &mut VerifyNodeExistsRequest) -> HookResult {
            let at = request.at().clone();
            let path = at.path().map(ToString::to_string).unwrap_or_default();
            guard(&self.seen).push(path.clone());
            if path.starts_with("/ok") {
                request.set_actual_location(at)
            } else {
                request.set_error(RequestError::Connector(format!("no node at {path}")))
            }
        }
    }

    struct ClosingRecorder(Recorder);

    impl Processor for ClosingRecorder {
        fn process(&mut self, composite: &mut ChannelComposite) -> std::result::Result<(), ConsumerError> {
            drain_composite(&mut self.0, composite);
            Ok(())
        }

        fn close(&mut self) -> std::result::Result<(), ConsumerError> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn verify(path: &str) -> Request {
        VerifyNodeExistsRequest::new(Location::from_path(Path::parse(path).unwrap()), "default").into()
    }

    fn started(consumer: ChannelConsumer) -> (Arc<CompositeRequestChannel>, CompletionHandle) {
        let channel = Arc::new(CompositeRequestChannel::new());
        let handle = channel
            .start(&ThreadExecutor::new("test-channel"), consumer, true)
            .unwrap();
        (channel, handle)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[test]
    fn add_after_close_is_rejected() {
        let channel = CompositeRequestChannel::new();
        assert!(channel.close());
        assert!(!channel.close());
        assert_eq!(channel.add(verify("/ok")).unwrap_err(), ChannelError::Closed);
        assert!(channel.all_requests().is_empty());
    }

    #[test]
    fn start_twice_is_rejected() {
        let (channel, _) = started(ChannelConsumer::processor(Recorder::default()));
        let again = channel.start(
            &ThreadExecutor::default(),
            ChannelConsumer::processor(Recorder::default()),
            true,
        );
        assert_eq!(again.unwrap_err(), ChannelError::AlreadyStarted);
        channel.close();
        channel.wait().unwrap();
    }

    #[test]
    fn wait_before_start_is_rejected() {
        let channel = CompositeRequestChannel::new();
        assert_eq!(channel.wait(), Err(ChannelError::NotStarted));
    }

    #[test]
    fn requests_stream_in_order_and_consumer_is_closed() {
        let recorder = Recorder::default();
        let closes = Arc::clone(&recorder.closes);
        let (channel, handle) =
            started(ChannelConsumer::Processor(Box::new(ClosingRecorder(recorder.clone()))));

        for i in 0..10 {
            channel.add(verify(&format!("/ok/{i}"))).unwrap();
        }
        channel.close();
        handle.wait().unwrap();

        let seen = guard(&recorder.seen).clone();
        let expected: Vec<String> = (0..10).map(|i| format!("/ok/{i}")).collect();
        assert_eq!(seen, expected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(channel.all_requests().len(), 10);
        assert!(channel
            .all_requests()
            .iter()
            .all(|shared| lock(shared).is_frozen()));
    }

    #[test]
    fn requests_added_before_start_are_delivered() {
        let recorder = Recorder::default();
        let channel = CompositeRequestChannel::new();
        channel.add(verify("/ok/early")).unwrap();
        channel.close();
        channel
            .start(
                &ThreadExecutor::default(),
                ChannelConsumer::processor(recorder.clone()),
                false,
            )
            .unwrap();
        channel.wait().unwrap();
        assert_eq!(*guard(&recorder.seen), vec!["/ok/early".to_string()]);
    }

    #[test]
    fn concurrent_producers_deliver_everything() {
        let recorder = Recorder::default();
        let (channel, handle) = started(ChannelConsumer::processor(recorder.clone()));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for i in 0..25 {
                        channel.add(verify(&format!("/ok/{p}/{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer should finish");
        }
        channel.close();
        handle.wait().unwrap();
        assert_eq!(guard(&recorder.seen).len(), 100);
    }

    // =========================================================================
    // Per-request completion
    // =========================================================================

    #[test]
    fn add_and_await_returns_processed_request() {
        let (channel, _) = started(ChannelConsumer::processor(Recorder::default()));
        let shared = channel.add_and_await(verify("/ok/one")).unwrap();
        {
            let request = lock(&shared);
            assert!(request.is_frozen());
            assert!(!request.has_error());
        }
        let failed = channel.add_and_await(verify("/missing")).unwrap();
        assert!(matches!(lock(&failed).error(), Some(RequestError::Connector(_))));
        channel.close();
        channel.wait().unwrap();
    }

    #[test]
    fn add_with_latch_releases_shared_latch() {
        let (channel, _) = started(ChannelConsumer::processor(Recorder::default()));
        let latch = CompletionLatch::new(3);
        for i in 0..3 {
            channel
                .add_with_latch(verify(&format!("/ok/{i}")), latch.clone())
                .unwrap();
        }
        assert!(latch.wait_timeout(Duration::from_secs(5)));
        channel.close();
        channel.wait().unwrap();
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn cancel_with_interrupt_releases_blocked_consumer() {
        let (channel, handle) = started(ChannelConsumer::processor(Recorder::default()));
        let first = channel.add_and_await(verify("/ok/first")).unwrap();
        assert!(!lock(&first).has_error());

        channel.cancel(true);
        assert!(channel.is_cancelled());
        assert!(channel.is_closed());
        assert_eq!(channel.wait(), Err(ChannelError::Cancelled));
        assert_eq!(handle.outcome(), Outcome::Cancelled);
        assert_eq!(channel.add(verify("/ok/late")).unwrap_err(), ChannelError::Closed);
    }

    #[test]
    fn cancel_marks_every_request() {
        let channel = CompositeRequestChannel::new();
        let a = channel.add(verify("/ok/a")).unwrap();
        let b = channel.add(GetWorkspacesRequest::new()).unwrap();
        channel.cancel(false);
        assert!(lock(&a).is_cancelled());
        assert!(lock(&b).is_cancelled());

        // Started after the cancel: the worker still freezes what was queued
        // but the handle reports the cancellation.
        let recorder = Recorder::default();
        channel
            .start(
                &ThreadExecutor::default(),
                ChannelConsumer::processor(recorder.clone()),
                true,
            )
            .unwrap();
        assert_eq!(channel.wait(), Err(ChannelError::Cancelled));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    struct Failing;

    impl Processor for Failing {
        fn process(&mut self, composite: &mut ChannelComposite) -> std::result::Result<(), ConsumerError> {
            composite.by_ref().for_each(drop);
            Err(ConsumerError::Failed("backend unavailable".into()))
        }
    }

    struct Panicking;

    impl Processor for Panicking {
        fn process(&mut self, _composite: &mut ChannelComposite) -> std::result::Result<(), ConsumerError> {
            panic!("consumer exploded");
        }
    }

    #[test]
    fn consumer_error_surfaces_on_wait() {
        let (channel, _) = started(ChannelConsumer::Processor(Box::new(Failing)));
        channel.add(verify("/ok")).unwrap();
        channel.close();
        assert_eq!(
            channel.wait(),
            Err(ChannelError::Execution("backend unavailable".into()))
        );
    }

    #[test]
    fn consumer_panic_surfaces_on_wait() {
        let (channel, _) = started(ChannelConsumer::Processor(Box::new(Panicking)));
        assert_eq!(
            channel.wait(),
            Err(ChannelError::Execution("consumer exploded".into()))
        );
    }

    #[test]
    fn add_and_await_fails_when_worker_dies() {
        let (channel, _) = started(ChannelConsumer::Processor(Box::new(Panicking)));
        // The worker may already be gone; either way nothing freezes the request.
        match channel.add_and_await(verify("/ok")) {
            Err(ChannelError::Execution(_)) | Err(ChannelError::Closed) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn multiple_failures_fold_with_unknown_total() {
        struct Checking(Arc<Mutex<Option<RequestError>>>);

        impl Processor for Checking {
            fn process(&mut self, composite: &mut ChannelComposite) -> std::result::Result<(), ConsumerError> {
                drain_composite(&mut Recorder::default(), composite);
                *guard(&self.0) = composite.error().cloned();
                Ok(())
            }
        }

        let folded = Arc::new(Mutex::new(None));
        let (channel, _) = started(ChannelConsumer::Processor(Box::new(Checking(Arc::clone(&folded)))));
        channel.add(verify("/bad/1")).unwrap();
        channel.add(verify("/ok")).unwrap();
        channel.add(verify("/bad/2")).unwrap();
        channel.close();
        channel.wait().unwrap();

        match guard(&folded).clone() {
            Some(RequestError::MultipleFailures { failures, total }) => {
                assert_eq!(total, None);
                let indexes: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indexes, vec![0, 2]);
                assert!(failures.iter().all(|f| f.request_type == RequestType::VerifyNode));
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    // =========================================================================
    // Builder sink
    // =========================================================================

    #[test]
    fn builder_feeds_channel() {
        let recorder = Recorder::default();
        let (channel, _) = started(ChannelConsumer::processor(recorder.clone()));
        let mut builder = channel.builder();
        builder
            .verify_node_exists(Location::from_path(Path::parse("/ok/a").unwrap()), "default")
            .verify_node_exists(Location::from_path(Path::parse("/ok/b").unwrap()), "default");
        builder.flush().unwrap();
        channel.close();
        channel.wait().unwrap();
        assert_eq!(guard(&recorder.seen).len(), 2);

        builder.get_workspaces();
        assert_eq!(builder.flush(), Err(ChannelError::Closed));
    }
}
