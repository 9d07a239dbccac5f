//! Request model for the Trellis graph repository.
//!
//! Every read or mutation against the graph is a typed request object. A
//! request is filled in by a processor and then frozen, after which it is
//! immutable. Requests can be batched into a [`CompositeRequest`], which
//! shares one cancellation flag among its members and folds their errors
//! into one outcome.
//!
//! # Key Types
//!
//! - [`Request`]: sum type over every concrete request kind
//! - [`RequestType`]: stable numeric tag per kind
//! - [`RequestKind`]: lifecycle (error, cancel, freeze) common to all requests
//! - [`ChangeRequest`] / [`CacheableRequest`]: mutation and read contracts
//! - [`CompositeRequest`]: a batch processed as one unit
//! - [`BatchRequestBuilder`]: merges adjacent property edits and feeds a [`RequestSink`]
//! - [`RequestProcessor`]: one hook per kind, with a provided `process`
//!
//! # Example
//!
//! ```
//! use trellis_request::{BatchRequestBuilder, Request, RequestKind, RequestType};
//! use trellis_types::{Location, Name, Path, Property};
//!
//! let at = Location::from_path(Path::parse("/docs/readme").unwrap());
//! let mut builder = BatchRequestBuilder::new();
//! builder
//!     .set_property(at.clone(), "default", Property::single(Name::new("title").unwrap(), "Read me"))
//!     .set_property(at, "default", Property::single(Name::new("lang").unwrap(), "en"));
//!
//! let request = builder.pop().unwrap();
//! assert_eq!(request.request_type(), RequestType::UpdateProperties);
//! assert!(matches!(request, Request::UpdateProperties(_)));
//! ```

pub mod base;
pub mod branch;
pub mod builder;
pub mod cache;
pub mod change;
pub mod composite;
pub mod error;
pub mod kind;
pub mod node;
pub mod processor;
pub mod read;
pub mod request;
pub mod search;
pub mod state;
pub mod workspace;

pub use base::RequestKind;
pub use branch::{
    CloneBranchRequest, CopyBranchRequest, DeleteBranchRequest, DeleteChildrenRequest,
    LockBranchRequest, MoveBranchRequest, MoveTarget, UnlockBranchRequest,
};
pub use builder::{BatchRequestBuilder, RequestSink};
pub use cache::{CacheState, CacheableRequest};
pub use change::ChangeRequest;
pub use composite::{collect_failures, fold_failures, CompositeRequest};
pub use error::{FailedRequest, RequestError, UsageError};
pub use kind::RequestType;
pub use node::{
    CreateNodeRequest, RemovePropertyRequest, RenameNodeRequest, SetPropertyRequest,
    UpdatePropertiesRequest, UpdateValuesRequest,
};
pub use processor::{unsupported, HookResult, RequestProcessor};
pub use read::{
    BranchNode, GetWorkspacesRequest, ReadAllChildrenRequest, ReadAllPropertiesRequest,
    ReadBlockOfChildrenRequest, ReadBranchRequest, ReadNextBlockOfChildrenRequest, ReadNodeRequest,
    ReadPropertyRequest, VerifyNodeExistsRequest, VerifyWorkspaceRequest,
};
pub use request::Request;
pub use search::{AccessQueryRequest, FullTextSearchRequest, SearchResults};
pub use state::{CancellationFlag, CompletionLatch, RequestState};
pub use workspace::{CloneWorkspaceRequest, CreateWorkspaceRequest, DestroyWorkspaceRequest};
