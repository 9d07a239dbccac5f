//! The [`Request`] sum type over every concrete kind.

use crate::base::RequestKind;
use crate::branch::{
    CloneBranchRequest, CopyBranchRequest, DeleteBranchRequest, DeleteChildrenRequest,
    LockBranchRequest, MoveBranchRequest, UnlockBranchRequest,
};
use crate::cache::CacheableRequest;
use crate::change::ChangeRequest;
use crate::composite::CompositeRequest;
use crate::error::UsageError;
use crate::node::{
    CreateNodeRequest, RemovePropertyRequest, RenameNodeRequest, SetPropertyRequest,
    UpdatePropertiesRequest, UpdateValuesRequest,
};
use crate::read::{
    GetWorkspacesRequest, ReadAllChildrenRequest, ReadAllPropertiesRequest, ReadBlockOfChildrenRequest,
    ReadBranchRequest, ReadNextBlockOfChildrenRequest, ReadNodeRequest, ReadPropertyRequest,
    VerifyNodeExistsRequest, VerifyWorkspaceRequest,
};
use crate::search::{AccessQueryRequest, FullTextSearchRequest};
use crate::state::{CancellationFlag, CompletionLatch, RequestState};
use crate::workspace::{CloneWorkspaceRequest, CreateWorkspaceRequest, DestroyWorkspaceRequest};

/// Any request.
///
/// The variant is the dispatch key; [`RequestKind::request_type`] gives the
/// stable numeric tag for each variant.
#[derive(Debug)]
pub enum Request {
    AccessQuery(AccessQueryRequest),
    CloneBranch(CloneBranchRequest),
    CloneWorkspace(CloneWorkspaceRequest),
    Composite(CompositeRequest),
    CopyBranch(CopyBranchRequest),
    CreateNode(CreateNodeRequest),
    CreateWorkspace(CreateWorkspaceRequest),
    DeleteBranch(DeleteBranchRequest),
    DeleteChildren(DeleteChildrenRequest),
    DestroyWorkspace(DestroyWorkspaceRequest),
    FullTextSearch(FullTextSearchRequest),
    GetWorkspaces(GetWorkspacesRequest),
    LockBranch(LockBranchRequest),
    MoveBranch(MoveBranchRequest),
    ReadAllChildren(ReadAllChildrenRequest),
    ReadAllProperties(ReadAllPropertiesRequest),
    ReadBlockOfChildren(ReadBlockOfChildrenRequest),
    ReadBranch(ReadBranchRequest),
    ReadNextBlockOfChildren(ReadNextBlockOfChildrenRequest),
    ReadNode(ReadNodeRequest),
    ReadProperty(ReadPropertyRequest),
    RemoveProperty(RemovePropertyRequest),
    RenameNode(RenameNodeRequest),
    SetProperty(SetPropertyRequest),
    UnlockBranch(UnlockBranchRequest),
    UpdateProperties(UpdatePropertiesRequest),
    UpdateValues(UpdateValuesRequest),
    VerifyNode(VerifyNodeExistsRequest),
    VerifyWorkspace(VerifyWorkspaceRequest),
}

/// Apply `$body` to the inner request of whatever variant `$request` is.
macro_rules! dispatch {
    ($request:expr, $inner:ident => $body:expr) => {
        match $request {
            Request::AccessQuery($inner) => $body,
            Request::CloneBranch($inner) => $body,
            Request::CloneWorkspace($inner) => $body,
            Request::Composite($inner) => $body,
            Request::CopyBranch($inner) => $body,
            Request::CreateNode($inner) => $body,
            Request::CreateWorkspace($inner) => $body,
            Request::DeleteBranch($inner) => $body,
            Request::DeleteChildren($inner) => $body,
            Request::DestroyWorkspace($inner) => $body,
            Request::FullTextSearch($inner) => $body,
            Request::GetWorkspaces($inner) => $body,
            Request::LockBranch($inner) => $body,
            Request::MoveBranch($inner) => $body,
            Request::ReadAllChildren($inner) => $body,
            Request::ReadAllProperties($inner) => $body,
            Request::ReadBlockOfChildren($inner) => $body,
            Request::ReadBranch($inner) => $body,
            Request::ReadNextBlockOfChildren($inner) => $body,
            Request::ReadNode($inner) => $body,
            Request::ReadProperty($inner) => $body,
            Request::RemoveProperty($inner) => $body,
            Request::RenameNode($inner) => $body,
            Request::SetProperty($inner) => $body,
            Request::UnlockBranch($inner) => $body,
            Request::UpdateProperties($inner) => $body,
            Request::UpdateValues($inner) => $body,
            Request::VerifyNode($inner) => $body,
            Request::VerifyWorkspace($inner) => $body,
        }
    };
}

/// Apply `$body` to change requests; evaluate `$otherwise` for the rest.
macro_rules! dispatch_change {
    ($request:expr, $inner:ident => $body:expr, _ => $otherwise:expr) => {
        match $request {
            Request::CloneBranch($inner) => $body,
            Request::CloneWorkspace($inner) => $body,
            Request::CopyBranch($inner) => $body,
            Request::CreateNode($inner) => $body,
            Request::CreateWorkspace($inner) => $body,
            Request::DeleteBranch($inner) => $body,
            Request::DeleteChildren($inner) => $body,
            Request::DestroyWorkspace($inner) => $body,
            Request::LockBranch($inner) => $body,
            Request::MoveBranch($inner) => $body,
            Request::RemoveProperty($inner) => $body,
            Request::RenameNode($inner) => $body,
            Request::SetProperty($inner) => $body,
            Request::UnlockBranch($inner) => $body,
            Request::UpdateProperties($inner) => $body,
            Request::UpdateValues($inner) => $body,
            _ => $otherwise,
        }
    };
}

/// Apply `$body` to cacheable requests; evaluate `$otherwise` for the rest.
macro_rules! dispatch_cacheable {
    ($request:expr, $inner:ident => $body:expr, _ => $otherwise:expr) => {
        match $request {
            Request::AccessQuery($inner) => $body,
            Request::FullTextSearch($inner) => $body,
            Request::GetWorkspaces($inner) => $body,
            Request::ReadAllChildren($inner) => $body,
            Request::ReadAllProperties($inner) => $body,
            Request::ReadBlockOfChildren($inner) => $body,
            Request::ReadBranch($inner) => $body,
            Request::ReadNextBlockOfChildren($inner) => $body,
            Request::ReadNode($inner) => $body,
            Request::ReadProperty($inner) => $body,
            Request::VerifyNode($inner) => $body,
            Request::VerifyWorkspace($inner) => $body,
            _ => $otherwise,
        }
    };
}

impl Request {
    /// The mutation contract, for change requests.
    pub fn as_change(&self) -> Option<&dyn ChangeRequest> {
        dispatch_change!(self, r => Some(r as &dyn ChangeRequest), _ => None)
    }

    /// The cache contract, for reads and searches.
    pub fn as_cacheable(&self) -> Option<&dyn CacheableRequest> {
        dispatch_cacheable!(self, r => Some(r as &dyn CacheableRequest), _ => None)
    }

    pub fn as_cacheable_mut(&mut self) -> Option<&mut dyn CacheableRequest> {
        dispatch_cacheable!(self, r => Some(r as &mut dyn CacheableRequest), _ => None)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Request::Composite(_))
    }

    pub fn as_composite(&self) -> Option<&CompositeRequest> {
        match self {
            Request::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// A fresh, unprocessed copy of a change request.
    ///
    /// Composites are copied member by member and only when every member is
    /// a change request.
    pub fn clone_unprocessed(&self) -> Option<Request> {
        match self {
            Request::Composite(c) => {
                let members = c
                    .requests()
                    .iter()
                    .map(Request::clone_unprocessed)
                    .collect::<Option<Vec<_>>>()?;
                CompositeRequest::with(members).ok()
            }
            other => other.as_change().map(|change| change.clone_unprocessed()),
        }
    }

    /// Rebind this request (and any composite members) to `flag`.
    pub fn share_cancellation(&mut self, flag: &CancellationFlag) {
        match self {
            Request::Composite(c) => c.share_cancellation(flag),
            other => other.state_mut().share_cancellation(flag),
        }
    }

    /// Register a latch counted down when this request is frozen.
    pub fn set_completion_latch(&mut self, latch: CompletionLatch) -> Result<(), UsageError> {
        self.state_mut().set_completion_latch(latch)
    }
}

impl RequestKind for Request {
    fn state(&self) -> &RequestState {
        dispatch!(self, r => r.state())
    }

    fn state_mut(&mut self) -> &mut RequestState {
        dispatch!(self, r => r.state_mut())
    }

    fn is_read_only(&self) -> bool {
        dispatch!(self, r => r.is_read_only())
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Request {
                fn from(request: $ty) -> Self {
                    Request::$variant(request)
                }
            }
        )*
    };
}

impl_from_kind! {
    AccessQuery(AccessQueryRequest),
    CloneBranch(CloneBranchRequest),
    CloneWorkspace(CloneWorkspaceRequest),
    CopyBranch(CopyBranchRequest),
    CreateNode(CreateNodeRequest),
    CreateWorkspace(CreateWorkspaceRequest),
    DeleteBranch(DeleteBranchRequest),
    DeleteChildren(DeleteChildrenRequest),
    DestroyWorkspace(DestroyWorkspaceRequest),
    FullTextSearch(FullTextSearchRequest),
    GetWorkspaces(GetWorkspacesRequest),
    LockBranch(LockBranchRequest),
    MoveBranch(MoveBranchRequest),
    ReadAllChildren(ReadAllChildrenRequest),
    ReadAllProperties(ReadAllPropertiesRequest),
    ReadBlockOfChildren(ReadBlockOfChildrenRequest),
    ReadBranch(ReadBranchRequest),
    ReadNextBlockOfChildren(ReadNextBlockOfChildrenRequest),
    ReadNode(ReadNodeRequest),
    ReadProperty(ReadPropertyRequest),
    RemoveProperty(RemovePropertyRequest),
    RenameNode(RenameNodeRequest),
    SetProperty(SetPropertyRequest),
    UnlockBranch(UnlockBranchRequest),
    UpdateProperties(UpdatePropertiesRequest),
    UpdateValues(UpdateValuesRequest),
    VerifyNode(VerifyNodeExistsRequest),
    VerifyWorkspace(VerifyWorkspaceRequest),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::RequestType;
    use trellis_types::{Location, Name, Path, Property};

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    #[test]
    fn variant_matches_request_type() {
        let r: Request = ReadNodeRequest::new(loc("/a"), "ws").into();
        assert_eq!(r.request_type(), RequestType::ReadNode);
        assert!(r.is_read_only());
        assert!(r.as_cacheable().is_some());
        assert!(r.as_change().is_none());

        let w: Request = DeleteBranchRequest::new(loc("/a"), "ws").into();
        assert_eq!(w.request_type(), RequestType::DeleteBranch);
        assert!(!w.is_read_only());
        assert!(w.as_change().is_some());
        assert!(w.as_cacheable().is_none());
    }

    #[test]
    fn lifecycle_through_the_sum_type() {
        let mut r: Request = GetWorkspacesRequest::new().into();
        let latch = CompletionLatch::new(1);
        r.set_completion_latch(latch.clone()).unwrap();
        r.cancel().unwrap();
        assert!(r.is_cancelled());
        assert!(r.freeze());
        assert_eq!(latch.count(), 0);
        assert!(r.set_error(crate::error::RequestError::Connector("x".into())).is_err());
    }

    #[test]
    fn clone_unprocessed_composite() {
        let name = Name::new("p").unwrap();
        let composite = CompositeRequest::with(vec![
            SetPropertyRequest::new(loc("/a"), "ws", Property::single(name.clone(), "v")).into(),
            RemovePropertyRequest::new(loc("/b"), "ws", name).into(),
        ])
        .unwrap();
        let copy = composite.clone_unprocessed().unwrap();
        assert_eq!(copy.request_type(), RequestType::Composite);
        assert_eq!(copy.as_composite().map(CompositeRequest::len), Some(2));

        let reads = CompositeRequest::with(vec![
            ReadNodeRequest::new(loc("/a"), "ws").into(),
            DeleteBranchRequest::new(loc("/b"), "ws").into(),
        ])
        .unwrap();
        assert!(reads.clone_unprocessed().is_none());
    }
}
