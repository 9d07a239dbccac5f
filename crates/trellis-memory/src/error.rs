use thiserror::Error;
use trellis_request::RequestError;
use trellis_types::{Location, Path, TypeError};
use uuid::Uuid;

/// Failures of the in-memory graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryError {
    #[error("no node at {location} in workspace '{workspace}'")]
    PathNotFound {
        location: Location,
        workspace: String,
        lowest_existing: Option<Path>,
    },

    #[error("workspace '{0}' does not exist")]
    NoSuchWorkspace(String),

    #[error("workspace '{0}' already exists")]
    WorkspaceExists(String),

    #[error("{location} in workspace '{workspace}' is locked")]
    Locked { location: Location, workspace: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("updates are not allowed")]
    ReadOnly,

    /// A node id is referenced but not stored: the graph is corrupt.
    #[error("node {0} is referenced but missing")]
    MissingNode(Uuid),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl MemoryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// The error to record on a request processed by the named source.
    pub fn into_request_error(self, source_name: &str) -> RequestError {
        match self {
            Self::PathNotFound {
                location,
                workspace,
                lowest_existing,
            } => RequestError::PathNotFound {
                location,
                workspace,
                lowest_existing,
            },
            Self::NoSuchWorkspace(name) => RequestError::InvalidWorkspace(name),
            Self::WorkspaceExists(name) => RequestError::WorkspaceExists(name),
            Self::Locked {
                location,
                workspace,
            } => RequestError::Locked {
                location,
                workspace,
            },
            Self::Conflict(message) => RequestError::Conflict(message),
            Self::Invalid(message) => RequestError::InvalidRequest(message),
            Self::ReadOnly => RequestError::ReadOnly(source_name.to_string()),
            other @ (Self::MissingNode(_) | Self::Type(_)) => {
                RequestError::Connector(other.to_string())
            }
        }
    }
}

/// Result alias for in-memory graph operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_names_the_source() {
        assert_eq!(
            MemoryError::ReadOnly.into_request_error("scratch"),
            RequestError::ReadOnly("scratch".into())
        );
    }

    #[test]
    fn missing_workspace_maps_to_invalid_workspace() {
        assert_eq!(
            MemoryError::NoSuchWorkspace("w".into()).into_request_error("memory"),
            RequestError::InvalidWorkspace("w".into())
        );
    }

    #[test]
    fn internal_faults_become_connector_errors() {
        let err = MemoryError::MissingNode(Uuid::nil()).into_request_error("memory");
        assert!(matches!(err, RequestError::Connector(m) if m.contains("missing")));
    }
}
