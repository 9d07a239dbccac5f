use thiserror::Error;
use trellis_types::{Location, Path};

use crate::kind::RequestType;

/// Programmer errors: misuse of the request API.
///
/// These are returned immediately and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// A frozen request was asked to change.
    #[error("{request_type} request is frozen and can no longer be modified")]
    Frozen { request_type: RequestType },

    /// An argument was missing or invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A composite was requested over no requests at all.
    #[error("a composite request needs at least one request")]
    EmptyComposite,
}

impl UsageError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// One failing member of a composite, as reported by
/// [`RequestError::MultipleFailures`].
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRequest {
    /// Position of the member within the composite.
    pub index: usize,
    /// Kind of the failing member.
    pub request_type: RequestType,
    /// The member's own error.
    pub error: RequestError,
}

/// A domain failure attached to a single request.
///
/// These are recorded on the request (never thrown while processing) so that
/// sibling requests in the same batch are unaffected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("no node at {location} in workspace '{workspace}'")]
    PathNotFound {
        location: Location,
        workspace: String,
        /// The deepest ancestor that does exist, when known.
        lowest_existing: Option<Path>,
    },

    #[error("workspace '{0}' does not exist")]
    InvalidWorkspace(String),

    #[error("workspace '{0}' already exists")]
    WorkspaceExists(String),

    #[error("{location} in workspace '{workspace}' is locked")]
    Locked { location: Location, workspace: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("source '{0}' does not allow updates")]
    ReadOnly(String),

    #[error("source '{source_name}' does not support {request_type} requests")]
    Unsupported {
        request_type: RequestType,
        source_name: String,
    },

    #[error("connector error: {0}")]
    Connector(String),

    #[error("{} of {} requests failed", .failures.len(), total_label(.total))]
    MultipleFailures {
        failures: Vec<FailedRequest>,
        /// Number of requests submitted, or `None` while still streaming.
        total: Option<usize>,
    },
}

fn total_label(total: &Option<usize>) -> String {
    total.map_or_else(|| "an unknown number of".to_string(), |t| t.to_string())
}

impl RequestError {
    /// Returns `true` for an aggregated error over several members.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::MultipleFailures { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_failures_message() {
        let err = RequestError::MultipleFailures {
            failures: vec![
                FailedRequest {
                    index: 0,
                    request_type: RequestType::ReadNode,
                    error: RequestError::InvalidWorkspace("w".into()),
                },
                FailedRequest {
                    index: 2,
                    request_type: RequestType::SetProperty,
                    error: RequestError::Conflict("x".into()),
                },
            ],
            total: Some(5),
        };
        assert_eq!(err.to_string(), "2 of 5 requests failed");
        assert!(err.is_multiple());
    }

    #[test]
    fn unknown_total_message() {
        let err = RequestError::MultipleFailures {
            failures: Vec::new(),
            total: None,
        };
        assert_eq!(err.to_string(), "0 of an unknown number of requests failed");
    }

    #[test]
    fn frozen_message_names_the_kind() {
        let err = UsageError::Frozen {
            request_type: RequestType::CreateNode,
        };
        assert!(err.to_string().starts_with("create node request is frozen"));
    }
}
