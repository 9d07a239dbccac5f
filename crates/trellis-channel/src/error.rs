use trellis_request::UsageError;

/// Errors produced by a [`CompositeRequestChannel`](crate::CompositeRequestChannel).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    /// `start` was called on a channel that already has a worker.
    #[error("channel has already been started")]
    AlreadyStarted,

    /// The operation needs a worker, but `start` was never called.
    #[error("channel has not been started")]
    NotStarted,

    /// A request was added after the channel was closed.
    #[error("channel is closed")]
    Closed,

    /// The channel was cancelled before its worker finished.
    #[error("channel was cancelled")]
    Cancelled,

    /// The worker failed (consumer error or panic).
    #[error("channel worker failed: {0}")]
    Execution(String),

    /// The executor would not run the worker task.
    #[error("executor rejected the task: {0}")]
    Rejected(String),

    /// A request was misused while being added.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Failure reported by a channel consumer.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// The consumer could not process the stream.
    #[error("{0}")]
    Failed(String),

    /// The consumer misused a request.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Convenience alias used throughout the channel crate.
pub type Result<T> = std::result::Result<T, ChannelError>;
