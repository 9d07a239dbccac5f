//! Read requests.
//!
//! All reads are read-only and cacheable. Inputs are fixed at construction;
//! results are filled in by the processor and become immutable once the
//! request is frozen.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use trellis_types::{Location, Name, Property};

use crate::base::{impl_request_kind, require_path};
use crate::cache::{impl_cacheable, CacheState};
use crate::error::UsageError;
use crate::kind::RequestType;
use crate::state::RequestState;

// ---------------------------------------------------------------------------
// ReadNodeRequest
// ---------------------------------------------------------------------------

/// Read a node's properties and the locations of its children.
#[derive(Debug)]
pub struct ReadNodeRequest {
    state: RequestState,
    cache: CacheState,
    at: Location,
    workspace: String,
    properties: BTreeMap<Name, Property>,
    children: Vec<Location>,
    actual_location: Option<Location>,
}

impl ReadNodeRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadNode),
            cache: CacheState::default(),
            at,
            workspace: workspace.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
            actual_location: None,
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn properties(&self) -> &BTreeMap<Name, Property> {
        &self.properties
    }

    pub fn property(&self, name: &Name) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Record a property, replacing any previous one with the same name.
    pub fn add_property(&mut self, property: Property) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.properties.insert(property.name().clone(), property);
        Ok(())
    }

    pub fn add_properties(
        &mut self,
        properties: impl IntoIterator<Item = Property>,
    ) -> Result<(), UsageError> {
        for property in properties {
            self.add_property(property)?;
        }
        Ok(())
    }

    pub fn children(&self) -> &[Location] {
        &self.children
    }

    pub fn add_child(&mut self, child: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.children.push(child);
        Ok(())
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadNodeRequest, read_only = true);
impl_cacheable!(ReadNodeRequest);

// ---------------------------------------------------------------------------
// ReadAllChildrenRequest
// ---------------------------------------------------------------------------

/// Read the locations of every child of a node, in order.
#[derive(Debug)]
pub struct ReadAllChildrenRequest {
    state: RequestState,
    cache: CacheState,
    of: Location,
    workspace: String,
    children: Vec<Location>,
    actual_location: Option<Location>,
}

impl ReadAllChildrenRequest {
    pub fn new(of: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadAllChildren),
            cache: CacheState::default(),
            of,
            workspace: workspace.into(),
            children: Vec::new(),
            actual_location: None,
        }
    }

    pub fn of(&self) -> &Location {
        &self.of
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn children(&self) -> &[Location] {
        &self.children
    }

    pub fn add_child(&mut self, child: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.children.push(child);
        Ok(())
    }

    pub fn actual_location_of_node(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location_of_node(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadAllChildrenRequest, read_only = true);
impl_cacheable!(ReadAllChildrenRequest);

// ---------------------------------------------------------------------------
// ReadBlockOfChildrenRequest
// ---------------------------------------------------------------------------

/// Read a contiguous block of a node's children by position.
#[derive(Debug)]
pub struct ReadBlockOfChildrenRequest {
    state: RequestState,
    cache: CacheState,
    of: Location,
    workspace: String,
    starting_index: usize,
    count: NonZeroUsize,
    children: Vec<Location>,
    actual_location: Option<Location>,
}

impl ReadBlockOfChildrenRequest {
    /// Read up to `count` children starting at the 0-based `starting_index`.
    pub fn new(
        of: Location,
        workspace: impl Into<String>,
        starting_index: usize,
        count: NonZeroUsize,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadBlockOfChildren),
            cache: CacheState::default(),
            of,
            workspace: workspace.into(),
            starting_index,
            count,
            children: Vec::new(),
            actual_location: None,
        }
    }

    pub fn of(&self) -> &Location {
        &self.of
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn starting_index(&self) -> usize {
        self.starting_index
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// One past the last index covered by the block.
    pub fn ending_index(&self) -> usize {
        self.starting_index.saturating_add(self.count.get())
    }

    pub fn children(&self) -> &[Location] {
        &self.children
    }

    /// Add a child; rejected once the block is full.
    pub fn add_child(&mut self, child: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        if self.children.len() >= self.count.get() {
            return Err(UsageError::invalid(format!(
                "block already holds the requested {} children",
                self.count
            )));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn actual_location_of_node(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location_of_node(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadBlockOfChildrenRequest, read_only = true);
impl_cacheable!(ReadBlockOfChildrenRequest);

// ---------------------------------------------------------------------------
// ReadNextBlockOfChildrenRequest
// ---------------------------------------------------------------------------

/// Read the siblings that follow a given child, for paging through children.
#[derive(Debug)]
pub struct ReadNextBlockOfChildrenRequest {
    state: RequestState,
    cache: CacheState,
    starting_after: Location,
    workspace: String,
    count: NonZeroUsize,
    children: Vec<Location>,
    actual_starting_after: Option<Location>,
}

impl ReadNextBlockOfChildrenRequest {
    pub fn new(starting_after: Location, workspace: impl Into<String>, count: NonZeroUsize) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadNextBlockOfChildren),
            cache: CacheState::default(),
            starting_after,
            workspace: workspace.into(),
            count,
            children: Vec::new(),
            actual_starting_after: None,
        }
    }

    pub fn starting_after(&self) -> &Location {
        &self.starting_after
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    pub fn children(&self) -> &[Location] {
        &self.children
    }

    pub fn add_child(&mut self, child: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        if self.children.len() >= self.count.get() {
            return Err(UsageError::invalid(format!(
                "block already holds the requested {} children",
                self.count
            )));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn actual_location_of_starting_after(&self) -> Option<&Location> {
        self.actual_starting_after.as_ref()
    }

    pub fn set_actual_location_of_starting_after(
        &mut self,
        actual: Location,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_starting_after = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadNextBlockOfChildrenRequest, read_only = true);
impl_cacheable!(ReadNextBlockOfChildrenRequest);

// ---------------------------------------------------------------------------
// ReadAllPropertiesRequest
// ---------------------------------------------------------------------------

/// Read every property of a node (and how many children it has).
#[derive(Debug)]
pub struct ReadAllPropertiesRequest {
    state: RequestState,
    cache: CacheState,
    at: Location,
    workspace: String,
    properties: BTreeMap<Name, Property>,
    number_of_children: Option<usize>,
    actual_location: Option<Location>,
}

impl ReadAllPropertiesRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadAllProperties),
            cache: CacheState::default(),
            at,
            workspace: workspace.into(),
            properties: BTreeMap::new(),
            number_of_children: None,
            actual_location: None,
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn properties(&self) -> &BTreeMap<Name, Property> {
        &self.properties
    }

    pub fn add_property(&mut self, property: Property) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.properties.insert(property.name().clone(), property);
        Ok(())
    }

    pub fn number_of_children(&self) -> Option<usize> {
        self.number_of_children
    }

    pub fn set_number_of_children(&mut self, count: usize) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.number_of_children = Some(count);
        Ok(())
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadAllPropertiesRequest, read_only = true);
impl_cacheable!(ReadAllPropertiesRequest);

// ---------------------------------------------------------------------------
// ReadPropertyRequest
// ---------------------------------------------------------------------------

/// Read a single named property of a node.
#[derive(Debug)]
pub struct ReadPropertyRequest {
    state: RequestState,
    cache: CacheState,
    on: Location,
    workspace: String,
    property_name: Name,
    property: Option<Property>,
    actual_location: Option<Location>,
}

impl ReadPropertyRequest {
    pub fn new(on: Location, workspace: impl Into<String>, property_name: Name) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadProperty),
            cache: CacheState::default(),
            on,
            workspace: workspace.into(),
            property_name,
            property: None,
            actual_location: None,
        }
    }

    pub fn on(&self) -> &Location {
        &self.on
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn property_name(&self) -> &Name {
        &self.property_name
    }

    /// The property read, or `None` if the node does not have it.
    pub fn property(&self) -> Option<&Property> {
        self.property.as_ref()
    }

    pub fn set_property(&mut self, property: Property) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        if property.name() != &self.property_name {
            return Err(UsageError::invalid(format!(
                "expected property '{}', got '{}'",
                self.property_name,
                property.name()
            )));
        }
        self.property = Some(property);
        Ok(())
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadPropertyRequest, read_only = true);
impl_cacheable!(ReadPropertyRequest);

// ---------------------------------------------------------------------------
// ReadBranchRequest
// ---------------------------------------------------------------------------

/// One node returned by a [`ReadBranchRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub location: Location,
    pub properties: BTreeMap<Name, Property>,
    pub children: Vec<Location>,
}

/// Read a node and its descendants down to a maximum depth.
#[derive(Debug)]
pub struct ReadBranchRequest {
    state: RequestState,
    cache: CacheState,
    at: Location,
    workspace: String,
    max_depth: NonZeroUsize,
    nodes: Vec<BranchNode>,
    actual_location: Option<Location>,
}

impl ReadBranchRequest {
    /// Default depth used when the caller does not pick one.
    pub const DEFAULT_MAXIMUM_DEPTH: usize = 2;

    pub fn new(at: Location, workspace: impl Into<String>, max_depth: NonZeroUsize) -> Self {
        Self {
            state: RequestState::new(RequestType::ReadBranch),
            cache: CacheState::default(),
            at,
            workspace: workspace.into(),
            max_depth,
            nodes: Vec::new(),
            actual_location: None,
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    /// Depth 1 reads only the branch root.
    pub fn max_depth(&self) -> usize {
        self.max_depth.get()
    }

    /// Nodes in pre-order, branch root first.
    pub fn nodes(&self) -> &[BranchNode] {
        &self.nodes
    }

    pub fn node(&self, location: &Location) -> Option<&BranchNode> {
        self.nodes.iter().find(|n| n.location.is_same(location))
    }

    pub fn add_node(&mut self, node: BranchNode) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&node.location, "branch node location")?;
        self.nodes.push(node);
        Ok(())
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(ReadBranchRequest, read_only = true);
impl_cacheable!(ReadBranchRequest);

// ---------------------------------------------------------------------------
// VerifyNodeExistsRequest
// ---------------------------------------------------------------------------

/// Check that a node exists and resolve its full location.
#[derive(Debug)]
pub struct VerifyNodeExistsRequest {
    state: RequestState,
    cache: CacheState,
    at: Location,
    workspace: String,
    actual_location: Option<Location>,
}

impl VerifyNodeExistsRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::VerifyNode),
            cache: CacheState::default(),
            at,
            workspace: workspace.into(),
            actual_location: None,
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, actual: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        Ok(())
    }
}

impl_request_kind!(VerifyNodeExistsRequest, read_only = true);
impl_cacheable!(VerifyNodeExistsRequest);

// ---------------------------------------------------------------------------
// VerifyWorkspaceRequest
// ---------------------------------------------------------------------------

/// Check that a workspace exists; `None` asks for the source's default.
#[derive(Debug)]
pub struct VerifyWorkspaceRequest {
    state: RequestState,
    cache: CacheState,
    workspace: Option<String>,
    actual_workspace: Option<String>,
    actual_root: Option<Location>,
}

impl VerifyWorkspaceRequest {
    pub fn new(workspace: Option<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::VerifyWorkspace),
            cache: CacheState::default(),
            workspace,
            actual_workspace: None,
            actual_root: None,
        }
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    pub fn actual_workspace_name(&self) -> Option<&str> {
        self.actual_workspace.as_deref()
    }

    pub fn set_actual_workspace_name(&mut self, name: impl Into<String>) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.actual_workspace = Some(name.into());
        Ok(())
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

impl_request_kind!(VerifyWorkspaceRequest, read_only = true);
impl_cacheable!(VerifyWorkspaceRequest);

// ---------------------------------------------------------------------------
// GetWorkspacesRequest
// ---------------------------------------------------------------------------

/// List the names of every workspace the source offers.
#[derive(Debug)]
pub struct GetWorkspacesRequest {
    state: RequestState,
    cache: CacheState,
    available: BTreeSet<String>,
}

impl GetWorkspacesRequest {
    pub fn new() -> Self {
        Self {
            state: RequestState::new(RequestType::GetWorkspaces),
            cache: CacheState::default(),
            available: BTreeSet::new(),
        }
    }

    pub fn available_workspace_names(&self) -> &BTreeSet<String> {
        &self.available
    }

    pub fn set_available_workspace_names(
        &mut self,
        names: impl IntoIterator<Item = String>,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.available = names.into_iter().collect();
        Ok(())
    }
}

impl Default for GetWorkspacesRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl_request_kind!(GetWorkspacesRequest, read_only = true);
impl_cacheable!(GetWorkspacesRequest);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::RequestKind;
    use crate::cache::CacheableRequest;
    use chrono::Utc;
    use trellis_types::{CachePolicy, Path};

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn frozen() -> UsageError {
        UsageError::Frozen {
            request_type: RequestType::ReadNode,
        }
    }

    #[test]
    fn read_node_collects_results() {
        let mut r = ReadNodeRequest::new(loc("/a"), "default");
        r.add_property(Property::single(name("b"), "2")).unwrap();
        r.add_property(Property::single(name("a"), "1")).unwrap();
        r.add_child(loc("/a/x")).unwrap();
        r.set_actual_location(loc("/a")).unwrap();

        let names: Vec<&str> = r.properties().keys().map(Name::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(r.children(), &[loc("/a/x")]);
        assert!(r.is_read_only());
        assert_eq!(r.request_type(), RequestType::ReadNode);
    }

    #[test]
    fn frozen_read_rejects_every_setter() {
        let mut r = ReadNodeRequest::new(loc("/a"), "default");
        assert!(r.freeze());
        assert_eq!(r.add_property(Property::single(name("p"), "v")), Err(frozen()));
        assert_eq!(r.add_child(loc("/a/b")), Err(frozen()));
        assert_eq!(r.set_actual_location(loc("/a")), Err(frozen()));
        assert_eq!(r.set_cache_policy(CachePolicy::new(10)), Err(frozen()));
        assert!(r.cancel().is_err());
        assert!(!r.freeze());
    }

    #[test]
    fn actual_location_requires_path() {
        let mut r = ReadNodeRequest::new(loc("/a"), "default");
        let err = r
            .set_actual_location(Location::from_uuid(uuid::Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, UsageError::InvalidArgument(_)));
    }

    #[test]
    fn block_of_children_is_bounded() {
        let count = NonZeroUsize::new(2).unwrap();
        let mut r = ReadBlockOfChildrenRequest::new(loc("/a"), "default", 3, count);
        assert_eq!(r.ending_index(), 5);
        r.add_child(loc("/a/c3")).unwrap();
        r.add_child(loc("/a/c4")).unwrap();
        assert!(r.add_child(loc("/a/c5")).is_err());
    }

    #[test]
    fn read_property_checks_name() {
        let mut r = ReadPropertyRequest::new(loc("/a"), "default", name("title"));
        assert!(r.set_property(Property::single(name("other"), "x")).is_err());
        r.set_property(Property::single(name("title"), "x")).unwrap();
        assert_eq!(r.property().unwrap().name().as_str(), "title");
    }

    #[test]
    fn cache_expiry() {
        let mut r = GetWorkspacesRequest::new();
        assert!(!r.is_expired_at(Utc::now()));
        let loaded = Utc::now();
        r.set_cache_policy(CachePolicy::new(1_000)).unwrap();
        r.set_time_loaded(loaded).unwrap();
        assert!(!r.is_expired_at(loaded));
        assert!(r.is_expired_at(loaded + chrono::Duration::seconds(2)));
    }

    #[test]
    fn branch_node_lookup_uses_same_location() {
        let mut r = ReadBranchRequest::new(loc("/a"), "default", NonZeroUsize::new(2).unwrap());
        r.add_node(BranchNode {
            location: loc("/a/b").with_uuid(uuid::Uuid::new_v4()),
            properties: BTreeMap::new(),
            children: Vec::new(),
        })
        .unwrap();
        assert!(r.node(&loc("/a/b")).is_some());
        assert!(r.node(&loc("/a/c")).is_none());
    }
}
