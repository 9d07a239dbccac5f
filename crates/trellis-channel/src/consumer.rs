//! What a channel's worker feeds its requests into.

use tracing::debug;
use trellis_request::RequestProcessor;
use trellis_types::ExecutionContext;

use crate::composite::{lock, ChannelComposite};
use crate::error::ConsumerError;

/// Consumes a streaming composite.
///
/// `process` must drain the composite before returning.
pub trait Processor: Send {
    fn process(&mut self, composite: &mut ChannelComposite) -> Result<(), ConsumerError>;

    fn close(&mut self) -> Result<(), ConsumerError> {
        Ok(())
    }
}

/// A connection to a source, executing a streaming composite on behalf of
/// the caller described by the context.
///
/// `execute` must drain the composite before returning.
pub trait Connection: Send {
    fn execute(
        &mut self,
        context: &ExecutionContext,
        composite: &mut ChannelComposite,
    ) -> Result<(), ConsumerError>;

    fn close(&mut self) -> Result<(), ConsumerError> {
        Ok(())
    }
}

/// The consumer a channel is started with.
pub enum ChannelConsumer {
    Processor(Box<dyn Processor>),
    Connection {
        connection: Box<dyn Connection>,
        context: ExecutionContext,
    },
}

impl ChannelConsumer {
    /// Consume with any [`RequestProcessor`], one request at a time.
    pub fn processor<P>(processor: P) -> Self
    where
        P: RequestProcessor + Send + 'static,
    {
        Self::Processor(Box::new(Draining(processor)))
    }

    pub fn connection(connection: impl Connection + 'static, context: ExecutionContext) -> Self {
        Self::Connection {
            connection: Box::new(connection),
            context,
        }
    }

    pub(crate) fn consume(&mut self, composite: &mut ChannelComposite) -> Result<(), ConsumerError> {
        match self {
            Self::Processor(processor) => processor.process(composite),
            Self::Connection {
                connection,
                context,
            } => connection.execute(context, composite),
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), ConsumerError> {
        match self {
            Self::Processor(processor) => processor.close(),
            Self::Connection { connection, .. } => connection.close(),
        }
    }
}

impl std::fmt::Debug for ChannelConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processor(_) => f.write_str("ChannelConsumer::Processor"),
            Self::Connection { context, .. } => f
                .debug_struct("ChannelConsumer::Connection")
                .field("context", &context.id)
                .finish(),
        }
    }
}

/// Run every request of a streaming composite through `processor`, then fold
/// the errors.
pub fn drain_composite<P>(processor: &mut P, composite: &mut ChannelComposite)
where
    P: RequestProcessor + ?Sized,
{
    let mut processed = 0usize;
    for shared in composite.by_ref() {
        let mut request = lock(&shared);
        processor.process(&mut request);
        processed += 1;
    }
    let failed = composite.check_for_errors().is_some();
    debug!(
        source = processor.source_name(),
        processed, failed, "streaming composite drained"
    );
}

/// Adapts a [`RequestProcessor`] to the channel's [`Processor`] trait.
struct Draining<P>(P);

impl<P> Processor for Draining<P>
where
    P: RequestProcessor + Send,
{
    fn process(&mut self, composite: &mut ChannelComposite) -> Result<(), ConsumerError> {
        drain_composite(&mut self.0, composite);
        Ok(())
    }
}
