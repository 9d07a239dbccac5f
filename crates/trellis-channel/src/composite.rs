use std::sync::{MutexGuard, PoisonError};

use crossbeam::channel::{Receiver, RecvError, TryRecvError};
use tracing::{debug, trace};
use trellis_request::{
    fold_failures, CancellationFlag, FailedRequest, Request, RequestError, RequestKind,
};

use crate::SharedRequest;

/// The streaming composite a channel hands to its consumer.
///
/// Iterating blocks until the producer adds a request or closes the channel.
/// Requests queued before the close are always delivered. The number of
/// members is unknown until the stream ends.
pub struct ChannelComposite {
    queue: Receiver<SharedRequest>,
    interrupt: Receiver<()>,
    cancellation: CancellationFlag,
    delivered: Vec<SharedRequest>,
    read_only: bool,
    interruptible: bool,
    exhausted: bool,
    error: Option<RequestError>,
}

pub(crate) fn lock(request: &SharedRequest) -> MutexGuard<'_, Request> {
    request.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelComposite {
    pub(crate) fn new(
        queue: Receiver<SharedRequest>,
        interrupt: Receiver<()>,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            queue,
            interrupt,
            cancellation,
            delivered: Vec::new(),
            read_only: true,
            interruptible: true,
            exhausted: false,
            error: None,
        }
    }

    /// Always `None`: the number of requests is not known while streaming.
    pub fn size(&self) -> Option<usize> {
        None
    }

    /// Requests handed out so far, in order.
    pub fn delivered(&self) -> &[SharedRequest] {
        &self.delivered
    }

    /// True while every request delivered so far is read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    /// Fold the errors of the delivered requests into this composite's error.
    ///
    /// Several failures are reported with an unknown total, as for any
    /// composite that was streamed.
    pub fn check_for_errors(&mut self) -> Option<&RequestError> {
        let failures: Vec<FailedRequest> = self
            .delivered
            .iter()
            .enumerate()
            .filter_map(|(index, shared)| {
                let request = lock(shared);
                request.error().map(|error| FailedRequest {
                    index,
                    request_type: request.request_type(),
                    error: error.clone(),
                })
            })
            .collect();
        self.error = fold_failures(failures, None);
        self.error.as_ref()
    }

    fn take(&mut self, message: Result<SharedRequest, RecvError>) -> Option<SharedRequest> {
        match message {
            Ok(request) => {
                trace!(index = self.delivered.len(), "request taken from channel");
                self.read_only &= lock(&request).is_read_only();
                self.delivered.push(SharedRequest::clone(&request));
                Some(request)
            }
            Err(RecvError) => {
                debug!(delivered = self.delivered.len(), "channel drained");
                self.exhausted = true;
                None
            }
        }
    }

    fn interrupted(&mut self) -> Option<SharedRequest> {
        debug!(delivered = self.delivered.len(), "channel interrupted; ending stream");
        self.exhausted = true;
        None
    }
}

impl Iterator for ChannelComposite {
    type Item = SharedRequest;

    fn next(&mut self) -> Option<SharedRequest> {
        if self.exhausted {
            return None;
        }
        // A pending interrupt wins over queued requests.
        if self.interruptible {
            match self.interrupt.try_recv() {
                Ok(()) => return self.interrupted(),
                Err(TryRecvError::Disconnected) => self.interruptible = false,
                Err(TryRecvError::Empty) => {}
            }
        }
        if !self.interruptible {
            let message = self.queue.recv();
            return self.take(message);
        }
        crossbeam::select! {
            recv(self.queue) -> message => self.take(message),
            recv(self.interrupt) -> signal => match signal {
                // An interrupt ends the stream exactly like a close. The
                // consumer cannot tell a forced stop from normal exhaustion.
                Ok(()) => self.interrupted(),
                Err(RecvError) => {
                    self.interruptible = false;
                    let message = self.queue.recv();
                    self.take(message)
                }
            },
        }
    }
}

impl std::fmt::Debug for ChannelComposite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelComposite")
            .field("delivered", &self.delivered.len())
            .field("read_only", &self.read_only)
            .field("exhausted", &self.exhausted)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
