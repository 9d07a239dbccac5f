use std::fmt;

use trellis_types::Location;

use crate::error::{RequestError, UsageError};
use crate::kind::RequestType;
use crate::state::RequestState;

/// Behaviour common to every request.
///
/// Implementors only expose their embedded [`RequestState`] and whether they
/// are read-only; the lifecycle operations are provided.
pub trait RequestKind: fmt::Debug + Send {
    fn state(&self) -> &RequestState;

    fn state_mut(&mut self) -> &mut RequestState;

    /// Fixed per kind: `true` for reads and searches.
    fn is_read_only(&self) -> bool;

    fn request_type(&self) -> RequestType {
        self.state().request_type()
    }

    fn error(&self) -> Option<&RequestError> {
        self.state().error()
    }

    fn has_error(&self) -> bool {
        self.state().has_error()
    }

    fn set_error(&mut self, error: RequestError) -> Result<(), UsageError> {
        self.state_mut().set_error(Some(error))
    }

    fn clear_error(&mut self) -> Result<(), UsageError> {
        self.state_mut().set_error(None)
    }

    /// Advisory cancel; processors may still complete the request.
    fn cancel(&self) -> Result<(), UsageError> {
        self.state().cancel()
    }

    fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    fn is_frozen(&self) -> bool {
        self.state().is_frozen()
    }

    /// Seal the request. Returns `false` if it was already frozen.
    fn freeze(&mut self) -> bool {
        self.state_mut().freeze()
    }
}

macro_rules! impl_request_kind {
    ($ty:ty, read_only = $read_only:expr) => {
        impl $crate::base::RequestKind for $ty {
            fn state(&self) -> &$crate::state::RequestState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut $crate::state::RequestState {
                &mut self.state
            }

            fn is_read_only(&self) -> bool {
                $read_only
            }
        }
    };
}

pub(crate) use impl_request_kind;

/// Actual locations reported by connectors must carry a path.
pub(crate) fn require_path(location: &Location, what: &str) -> Result<(), UsageError> {
    if !location.has_path() {
        return Err(UsageError::invalid(format!("{what} must have a path: {location}")));
    }
    Ok(())
}
