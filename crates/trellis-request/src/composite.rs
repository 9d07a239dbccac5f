//! Batching many requests into one.

use tracing::trace;

use crate::base::RequestKind;
use crate::error::{FailedRequest, RequestError, UsageError};
use crate::kind::RequestType;
use crate::request::Request;
use crate::state::{CancellationFlag, RequestState};

/// An ordered batch of requests processed as one unit.
///
/// All members share the composite's cancellation flag: cancelling the
/// composite, or any one member, cancels every member. Composites never
/// nest; building one from composites splices their members in.
#[derive(Debug)]
pub struct CompositeRequest {
    state: RequestState,
    requests: Vec<Request>,
    read_only: bool,
}

impl CompositeRequest {
    /// Combine requests into one.
    ///
    /// Composite inputs are flattened one level. A single resulting request
    /// is returned as-is rather than wrapped.
    pub fn with(requests: impl IntoIterator<Item = Request>) -> Result<Request, UsageError> {
        let mut flattened = Vec::new();
        for request in requests {
            match request {
                Request::Composite(inner) => flattened.extend(inner.requests),
                other => flattened.push(other),
            }
        }

        match flattened.len() {
            0 => Err(UsageError::EmptyComposite),
            1 => Ok(flattened.remove(0)),
            len => {
                trace!(members = len, "building composite request");
                let read_only = flattened.iter().all(RequestKind::is_read_only);
                let mut composite = Self {
                    state: RequestState::new(RequestType::Composite),
                    requests: flattened,
                    read_only,
                };
                let flag = CancellationFlag::new();
                composite.share_cancellation(&flag);
                Ok(Request::Composite(composite))
            }
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut [Request] {
        &mut self.requests
    }

    pub fn into_requests(self) -> Vec<Request> {
        self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of members; always known for a built composite.
    pub fn size(&self) -> Option<usize> {
        Some(self.requests.len())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Request> {
        self.requests.iter()
    }

    pub(crate) fn share_cancellation(&mut self, flag: &CancellationFlag) {
        self.state.share_cancellation(flag);
        for request in &mut self.requests {
            request.state_mut().share_cancellation(flag);
        }
    }

    /// Fold the members' errors into the composite's own error.
    ///
    /// No failures clears the error, one failure is adopted verbatim, and
    /// several become [`RequestError::MultipleFailures`].
    pub fn check_for_errors(&mut self) -> Result<(), UsageError> {
        let failures = collect_failures(self.requests.iter());
        let error = fold_failures(failures, Some(self.requests.len()));
        self.state.set_error(error)
    }
}

impl RequestKind for CompositeRequest {
    fn state(&self) -> &RequestState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RequestState {
        &mut self.state
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl<'a> IntoIterator for &'a CompositeRequest {
    type Item = &'a Request;
    type IntoIter = std::slice::Iter<'a, Request>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.iter()
    }
}

/// Index, type and error of every failed request, in order.
pub fn collect_failures<'a, R>(requests: impl IntoIterator<Item = &'a R>) -> Vec<FailedRequest>
where
    R: RequestKind + 'a,
{
    requests
        .into_iter()
        .enumerate()
        .filter_map(|(index, request)| {
            request.error().map(|error| FailedRequest {
                index,
                request_type: request.request_type(),
                error: error.clone(),
            })
        })
        .collect()
}

/// The single error that summarises a batch's failures.
///
/// `total` is the number of requests in the batch, or `None` if it is not
/// known (a batch that was still streaming).
pub fn fold_failures(mut failures: Vec<FailedRequest>, total: Option<usize>) -> Option<RequestError> {
    match failures.len() {
        0 => None,
        1 => failures.pop().map(|failed| failed.error),
        _ => Some(RequestError::MultipleFailures { failures, total }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SetPropertyRequest;
    use crate::read::{ReadNodeRequest, VerifyNodeExistsRequest};
    use trellis_types::{Location, Name, Path, Property};

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    fn read(s: &str) -> Request {
        ReadNodeRequest::new(loc(s), "ws").into()
    }

    fn write(s: &str) -> Request {
        SetPropertyRequest::new(loc(s), "ws", Property::single(Name::new("p").unwrap(), "v")).into()
    }

    fn composite(requests: Vec<Request>) -> CompositeRequest {
        match CompositeRequest::with(requests).unwrap() {
            Request::Composite(c) => c,
            other => panic!("expected composite, got {other:?}"),
        }
    }

    fn missing(s: &str) -> RequestError {
        RequestError::PathNotFound {
            location: loc(s),
            workspace: "ws".into(),
            lowest_existing: Some(Path::root()),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn empty_is_rejected() {
        assert_eq!(
            CompositeRequest::with(Vec::new()).unwrap_err(),
            UsageError::EmptyComposite
        );
    }

    #[test]
    fn single_request_is_not_wrapped() {
        let only = VerifyNodeExistsRequest::new(loc("/a"), "ws");
        let flag = only.state().cancellation_flag().clone();
        let result = CompositeRequest::with(vec![only.into()]).unwrap();
        match &result {
            Request::VerifyNode(r) => {
                assert!(r.state().cancellation_flag().is_shared_with(&flag));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_composites_are_flattened() {
        let inner = CompositeRequest::with(vec![read("/a"), read("/b")]).unwrap();
        let outer = composite(vec![inner, read("/c")]);
        assert_eq!(outer.len(), 3);
        assert!(outer.iter().all(|r| !r.is_composite()));
    }

    #[test]
    fn read_only_is_conjunction() {
        assert!(composite(vec![read("/a"), read("/b")]).is_read_only());
        assert!(!composite(vec![read("/a"), write("/b")]).is_read_only());
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn cancelling_composite_cancels_members() {
        let c = composite(vec![read("/a"), read("/b"), write("/c")]);
        c.cancel().unwrap();
        assert!(c.is_cancelled());
        assert!(c.iter().all(RequestKind::is_cancelled));
    }

    #[test]
    fn cancelling_one_member_cancels_all() {
        let c = composite(vec![read("/a"), read("/b")]);
        c.requests()[1].cancel().unwrap();
        assert!(c.is_cancelled());
        assert!(c.requests()[0].is_cancelled());
    }

    // -----------------------------------------------------------------------
    // Error folding
    // -----------------------------------------------------------------------

    #[test]
    fn no_failures_clears_error() {
        let mut c = composite(vec![read("/a"), read("/b")]);
        c.state_mut().set_error(Some(missing("/stale"))).unwrap();
        c.check_for_errors().unwrap();
        assert!(!c.has_error());
    }

    #[test]
    fn one_failure_is_adopted_verbatim() {
        let mut c = composite(vec![read("/a"), read("/b")]);
        c.requests_mut()[1].set_error(missing("/b")).unwrap();
        c.check_for_errors().unwrap();
        assert_eq!(c.error(), Some(&missing("/b")));
    }

    #[test]
    fn several_failures_are_bundled_in_order() {
        let mut c = composite(vec![read("/a"), read("/b"), write("/c"), read("/d")]);
        c.requests_mut()[0].set_error(missing("/a")).unwrap();
        c.requests_mut()[2].set_error(missing("/c")).unwrap();
        c.check_for_errors().unwrap();

        match c.error() {
            Some(RequestError::MultipleFailures { failures, total }) => {
                assert_eq!(*total, Some(4));
                let indexes: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indexes, vec![0, 2]);
                assert_eq!(failures[1].request_type, RequestType::SetProperty);
                assert_eq!(failures[1].error, missing("/c"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn frozen_composite_cannot_fold() {
        let mut c = composite(vec![read("/a"), read("/b")]);
        c.freeze();
        assert!(c.check_for_errors().is_err());
    }
}
