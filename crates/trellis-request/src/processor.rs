//! Executing requests against a source.

use tracing::{debug, warn};

use crate::base::RequestKind;
use crate::branch::{
    CloneBranchRequest, CopyBranchRequest, DeleteBranchRequest, DeleteChildrenRequest,
    LockBranchRequest, MoveBranchRequest, UnlockBranchRequest,
};
use crate::error::{RequestError, UsageError};
use crate::node::{
    CreateNodeRequest, RemovePropertyRequest, RenameNodeRequest, SetPropertyRequest,
    UpdatePropertiesRequest, UpdateValuesRequest,
};
use crate::read::{
    GetWorkspacesRequest, ReadAllChildrenRequest, ReadAllPropertiesRequest, ReadBlockOfChildrenRequest,
    ReadBranchRequest, ReadNextBlockOfChildrenRequest, ReadNodeRequest, ReadPropertyRequest,
    VerifyNodeExistsRequest, VerifyWorkspaceRequest,
};
use crate::request::Request;
use crate::search::{AccessQueryRequest, FullTextSearchRequest};
use crate::workspace::{CloneWorkspaceRequest, CreateWorkspaceRequest, DestroyWorkspaceRequest};

/// Outcome of a processing hook.
///
/// Domain failures are recorded on the request itself; an `Err` here means
/// the processor misused the request API.
pub type HookResult = Result<(), UsageError>;

/// Mark `request` as unsupported by `source_name`.
pub fn unsupported<R: RequestKind + ?Sized>(source_name: &str, request: &mut R) -> HookResult {
    let error = RequestError::Unsupported {
        request_type: request.request_type(),
        source_name: source_name.to_string(),
    };
    request.set_error(error)
}

macro_rules! hooks {
    ($($(#[$meta:meta])* $hook:ident($ty:ty);)*) => {
        $(
            $(#[$meta])*
            fn $hook(&mut self, request: &mut $ty) -> HookResult {
                unsupported(self.source_name(), request)
            }
        )*
    };
}

/// A source that can execute requests.
///
/// Implementors override the hooks for the kinds they support; every other
/// kind is answered with [`RequestError::Unsupported`]. Hooks fill in
/// results or record an error on the request. They do not freeze it;
/// [`process`](Self::process) does that once the hook returns.
pub trait RequestProcessor {
    /// Name of the source, used in error messages.
    fn source_name(&self) -> &str;

    hooks! {
        access_query(AccessQueryRequest);
        full_text_search(FullTextSearchRequest);
        read_node(ReadNodeRequest);
        read_all_children(ReadAllChildrenRequest);
        read_block_of_children(ReadBlockOfChildrenRequest);
        read_next_block_of_children(ReadNextBlockOfChildrenRequest);
        read_all_properties(ReadAllPropertiesRequest);
        read_property(ReadPropertyRequest);
        read_branch(ReadBranchRequest);
        verify_node_exists(VerifyNodeExistsRequest);
        verify_workspace(VerifyWorkspaceRequest);
        get_workspaces(GetWorkspacesRequest);
        create_node(CreateNodeRequest);
        update_properties(UpdatePropertiesRequest);
        set_property(SetPropertyRequest);
        remove_property(RemovePropertyRequest);
        update_values(UpdateValuesRequest);
        rename_node(RenameNodeRequest);
        move_branch(MoveBranchRequest);
        copy_branch(CopyBranchRequest);
        clone_branch(CloneBranchRequest);
        delete_branch(DeleteBranchRequest);
        delete_children(DeleteChildrenRequest);
        lock_branch(LockBranchRequest);
        unlock_branch(UnlockBranchRequest);
        create_workspace(CreateWorkspaceRequest);
        clone_workspace(CloneWorkspaceRequest);
        destroy_workspace(DestroyWorkspaceRequest);
    }

    /// Execute one request (recursively for composites) and freeze it.
    ///
    /// Cancelled requests are frozen without being executed. Frozen requests
    /// are left alone.
    fn process(&mut self, request: &mut Request) {
        if request.is_frozen() {
            return;
        }
        if request.is_cancelled() {
            debug!(request_type = %request.request_type(), "skipping cancelled request");
            if let Request::Composite(composite) = request {
                for member in composite.requests_mut() {
                    member.freeze();
                }
            }
            request.freeze();
            return;
        }

        let outcome = match request {
            Request::Composite(composite) => {
                for member in composite.requests_mut() {
                    self.process(member);
                }
                composite.check_for_errors()
            }
            Request::AccessQuery(r) => self.access_query(r),
            Request::FullTextSearch(r) => self.full_text_search(r),
            Request::ReadNode(r) => self.read_node(r),
            Request::ReadAllChildren(r) => self.read_all_children(r),
            Request::ReadBlockOfChildren(r) => self.read_block_of_children(r),
            Request::ReadNextBlockOfChildren(r) => self.read_next_block_of_children(r),
            Request::ReadAllProperties(r) => self.read_all_properties(r),
            Request::ReadProperty(r) => self.read_property(r),
            Request::ReadBranch(r) => self.read_branch(r),
            Request::VerifyNode(r) => self.verify_node_exists(r),
            Request::VerifyWorkspace(r) => self.verify_workspace(r),
            Request::GetWorkspaces(r) => self.get_workspaces(r),
            Request::CreateNode(r) => self.create_node(r),
            Request::UpdateProperties(r) => self.update_properties(r),
            Request::SetProperty(r) => self.set_property(r),
            Request::RemoveProperty(r) => self.remove_property(r),
            Request::UpdateValues(r) => self.update_values(r),
            Request::RenameNode(r) => self.rename_node(r),
            Request::MoveBranch(r) => self.move_branch(r),
            Request::CopyBranch(r) => self.copy_branch(r),
            Request::CloneBranch(r) => self.clone_branch(r),
            Request::DeleteBranch(r) => self.delete_branch(r),
            Request::DeleteChildren(r) => self.delete_children(r),
            Request::LockBranch(r) => self.lock_branch(r),
            Request::UnlockBranch(r) => self.unlock_branch(r),
            Request::CreateWorkspace(r) => self.create_workspace(r),
            Request::CloneWorkspace(r) => self.clone_workspace(r),
            Request::DestroyWorkspace(r) => self.destroy_workspace(r),
        };

        if let Err(misuse) = outcome {
            warn!(
                source = self.source_name(),
                request_type = %request.request_type(),
                error = %misuse,
                "processor misused request"
            );
            let recorded = request.set_error(RequestError::Connector(misuse.to_string()));
            if recorded.is_err() {
                warn!("request was frozen by its processor before completion");
            }
        }

        if let Some(error) = request.error() {
            debug!(request_type = %request.request_type(), %error, "request failed");
        }
        request.freeze();
    }
}
