use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use trellis_channel::{drain_composite, ChannelComposite, Connection, ConsumerError};
use trellis_request::{CacheableRequest, HookResult, Request, RequestKind, RequestProcessor};
use trellis_types::ExecutionContext;

use crate::config::MemoryConfig;
use crate::error::MemoryResult;
use crate::repository::InMemoryRepository;

/// Executes requests against an [`InMemoryRepository`].
///
/// Connections are cheap: any number may share one repository. A connection
/// works both in bulk, through [`RequestProcessor::process`], and as a
/// channel consumer through [`Connection`].
#[derive(Clone, Debug)]
pub struct InMemoryConnection {
    repository: Arc<InMemoryRepository>,
}

impl InMemoryConnection {
    pub fn new(repository: Arc<InMemoryRepository>) -> Self {
        Self { repository }
    }

    /// A connection to a fresh repository.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self::new(Arc::new(InMemoryRepository::new(config)))
    }

    pub fn repository(&self) -> &Arc<InMemoryRepository> {
        &self.repository
    }

    /// Process one request (or composite) and return it, frozen.
    pub fn run(&mut self, mut request: Request) -> Request {
        self.process(&mut request);
        request
    }

    /// Record a successful read's cache metadata.
    pub(crate) fn stamp<R: CacheableRequest>(&self, request: &mut R) -> HookResult {
        if let Some(policy) = self.repository.config().default_cache_policy {
            request.set_cache_policy(policy)?;
        }
        request.set_time_loaded(Utc::now())
    }

    /// Apply the outcome of a repository call to `request`: on success hand
    /// the value to `apply`, on failure record the error.
    pub(crate) fn finish<R, T>(
        &self,
        request: &mut R,
        outcome: MemoryResult<T>,
        apply: impl FnOnce(&mut R, T) -> HookResult,
    ) -> HookResult
    where
        R: RequestKind,
    {
        match outcome {
            Ok(value) => {
                apply(request, value)?;
                debug!(request_type = %request.request_type(), "request executed");
                Ok(())
            }
            Err(error) => {
                debug!(request_type = %request.request_type(), %error, "request failed");
                request.set_error(error.into_request_error(self.repository.source_name()))
            }
        }
    }

    /// Like [`finish`](Self::finish) for cacheable reads, stamping results.
    pub(crate) fn finish_read<R, T>(
        &self,
        request: &mut R,
        outcome: MemoryResult<T>,
        apply: impl FnOnce(&mut R, T) -> HookResult,
    ) -> HookResult
    where
        R: CacheableRequest,
    {
        self.finish(request, outcome, |request, value| {
            apply(request, value)?;
            self.stamp(request)
        })
    }
}

impl Connection for InMemoryConnection {
    fn execute(
        &mut self,
        context: &ExecutionContext,
        composite: &mut ChannelComposite,
    ) -> Result<(), ConsumerError> {
        info!(
            context = %context.id,
            user = context.user.as_deref().unwrap_or("anonymous"),
            source = self.repository.source_name(),
            "executing streamed requests"
        );
        drain_composite(self, composite);
        Ok(())
    }
}
