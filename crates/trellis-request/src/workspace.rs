//! Workspace lifecycle requests.
//!
//! These change every path of the workspace they touch, so `changes`
//! only compares workspace names.

use trellis_types::{CloneConflictBehavior, CreateConflictBehavior, Location, Path};

use crate::base::{impl_request_kind, require_path};
use crate::change::{most_specific, ChangeRequest};
use crate::error::UsageError;
use crate::kind::RequestType;
use crate::request::Request;
use crate::state::RequestState;

// ---------------------------------------------------------------------------
// CreateWorkspaceRequest
// ---------------------------------------------------------------------------

/// Create a new, empty workspace.
#[derive(Debug)]
pub struct CreateWorkspaceRequest {
    state: RequestState,
    desired_name: String,
    conflict_behavior: CreateConflictBehavior,
    root: Location,
    actual_name: Option<String>,
    actual_root: Option<Location>,
}

impl CreateWorkspaceRequest {
    pub fn new(desired_name: impl Into<String>, conflict_behavior: CreateConflictBehavior) -> Self {
        Self {
            state: RequestState::new(RequestType::CreateWorkspace),
            desired_name: desired_name.into(),
            conflict_behavior,
            root: Location::root(),
            actual_name: None,
            actual_root: None,
        }
    }

    pub fn desired_name(&self) -> &str {
        &self.desired_name
    }

    pub fn conflict_behavior(&self) -> CreateConflictBehavior {
        self.conflict_behavior
    }

    /// Name actually given to the workspace, which may differ from the
    /// desired one under [`CreateConflictBehavior::CreateWithAdjustedName`].
    pub fn actual_workspace_name(&self) -> Option<&str> {
        self.actual_name.as_deref()
    }

    pub fn actual_root_location(&self) -> Option<&Location> {
        self.actual_root.as_ref()
    }

    pub fn set_actual_workspace(
        &mut self,
        name: impl Into<String>,
        root: Location,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&root, "root location")?;
        self.actual_name = Some(name.into());
        self.actual_root = Some(root);
        Ok(())
    }
}

impl_request_kind!(CreateWorkspaceRequest, read_only = false);

impl ChangeRequest for CreateWorkspaceRequest {
    fn changes(&self, workspace: &str, _path: &Path) -> bool {
        self.changed_workspace() == workspace
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.root, self.actual_root.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        self.actual_name.as_deref().unwrap_or(&self.desired_name)
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(self.desired_name.clone(), self.conflict_behavior).into()
    }
}

// ---------------------------------------------------------------------------
// CloneWorkspaceRequest
// ---------------------------------------------------------------------------

/// Create a workspace holding a copy of an existing one.
#[derive(Debug)]
pub struct CloneWorkspaceRequest {
    state: RequestState,
    name_to_clone: String,
    desired_name: String,
    create_conflict: CreateConflictBehavior,
    clone_conflict: CloneConflictBehavior,
    root: Location,
    actual_name: Option<String>,
    actual_root: Option<Location>,
}

impl CloneWorkspaceRequest {
    pub fn new(
        name_to_clone: impl Into<String>,
        desired_name: impl Into<String>,
        create_conflict: CreateConflictBehavior,
        clone_conflict: CloneConflictBehavior,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::CloneWorkspace),
            name_to_clone: name_to_clone.into(),
            desired_name: desired_name.into(),
            create_conflict,
            clone_conflict,
            root: Location::root(),
            actual_name: None,
            actual_root: None,
        }
    }

    pub fn name_of_workspace_to_be_cloned(&self) -> &str {
        &self.name_to_clone
    }

    pub fn desired_name_of_target_workspace(&self) -> &str {
        &self.desired_name
    }

    pub fn target_conflict_behavior(&self) -> CreateConflictBehavior {
        self.create_conflict
    }

    pub fn clone_conflict_behavior(&self) -> CloneConflictBehavior {
        self.clone_conflict
    }

    pub fn actual_workspace_name(&self) -> Option<&str> {
        self.actual_name.as_deref()
    }

    pub fn actual_root_location(&self) -> Option<&Location> {
        self.actual_root.as_ref()
    }

    pub fn set_actual_workspace(
        &mut self,
        name: impl Into<String>,
        root: Location,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&root, "root location")?;
        self.actual_name = Some(name.into());
        self.actual_root = Some(root);
        Ok(())
    }
}

impl_request_kind!(CloneWorkspaceRequest, read_only = false);

impl ChangeRequest for CloneWorkspaceRequest {
    fn changes(&self, workspace: &str, _path: &Path) -> bool {
        self.changed_workspace() == workspace
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.root, self.actual_root.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        self.actual_name.as_deref().unwrap_or(&self.desired_name)
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(
            self.name_to_clone.clone(),
            self.desired_name.clone(),
            self.create_conflict,
            self.clone_conflict,
        )
        .into()
    }
}

// ---------------------------------------------------------------------------
// DestroyWorkspaceRequest
// ---------------------------------------------------------------------------

/// Remove a workspace and all of its content.
#[derive(Debug)]
pub struct DestroyWorkspaceRequest {
    state: RequestState,
    name: String,
    root: Location,
    actual_root: Option<Location>,
}

impl DestroyWorkspaceRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::DestroyWorkspace),
            name: name.into(),
            root: Location::root(),
            actual_root: None,
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.name
    }

    pub fn actual_root_location(&self) -> Option<&Location> {
        self.actual_root.as_ref()
    }

    pub fn set_actual_root_location(&mut self, root: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&root, "root location")?;
        self.actual_root = Some(root);
        Ok(())
    }
}

impl_request_kind!(DestroyWorkspaceRequest, read_only = false);

impl ChangeRequest for DestroyWorkspaceRequest {
    fn changes(&self, workspace: &str, _path: &Path) -> bool {
        self.name == workspace
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.root, self.actual_root.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.name
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(self.name.clone()).into()
    }
}
