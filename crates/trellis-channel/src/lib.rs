//! Streaming request channel for the Trellis graph repository.
//!
//! A [`CompositeRequestChannel`] lets producers keep adding requests while a
//! single background worker streams them, as one open-ended composite, into a
//! consumer. The consumer is either a [`Processor`] (any
//! [`RequestProcessor`](trellis_request::RequestProcessor) qualifies through
//! [`ChannelConsumer::processor`]) or a [`Connection`] bound to an
//! execution context.
//!
//! The channel never blocks producers. The consumer blocks while the channel
//! is open and empty; closing the channel lets it drain what is queued and
//! finish. Cancelling marks every added request cancelled and, when asked to
//! interrupt, releases a consumer that is waiting for input.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_channel::{ChannelConsumer, CompositeRequestChannel, ThreadExecutor};
//! use trellis_request::{GetWorkspacesRequest, RequestProcessor};
//!
//! struct Nothing;
//!
//! impl RequestProcessor for Nothing {
//!     fn source_name(&self) -> &str {
//!         "nothing"
//!     }
//! }
//!
//! let channel = Arc::new(CompositeRequestChannel::new());
//! channel
//!     .start(&ThreadExecutor::default(), ChannelConsumer::processor(Nothing), true)
//!     .unwrap();
//! channel.add(GetWorkspacesRequest::new()).unwrap();
//! channel.close();
//! channel.wait().unwrap();
//! assert_eq!(channel.all_requests().len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use trellis_request::Request;

pub mod channel;
pub mod completion;
pub mod composite;
pub mod config;
pub mod consumer;
pub mod error;
pub mod executor;
pub mod sink;

pub use channel::CompositeRequestChannel;
pub use completion::{CompletionHandle, Outcome};
pub use composite::ChannelComposite;
pub use config::ChannelConfig;
pub use consumer::{drain_composite, ChannelConsumer, Connection, Processor};
pub use error::{ChannelError, ConsumerError, Result};
pub use executor::{executor_for, Executor, Task, ThreadExecutor, WorkerPool};
pub use sink::ChannelSink;

/// A request as it travels through a channel: the producer keeps a handle
/// while the consumer fills it in.
pub type SharedRequest = Arc<Mutex<Request>>;
