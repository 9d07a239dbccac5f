use std::sync::Arc;

use trellis_request::{Request, RequestSink};

use crate::channel::CompositeRequestChannel;
use crate::error::ChannelError;

/// Submits each finished builder request into a channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    channel: Arc<CompositeRequestChannel>,
}

impl ChannelSink {
    pub fn new(channel: Arc<CompositeRequestChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<CompositeRequestChannel> {
        &self.channel
    }
}

impl RequestSink for ChannelSink {
    type Error = ChannelError;

    fn submit(&mut self, request: Request) -> Result<(), ChannelError> {
        self.channel.add(request).map(drop)
    }
}
