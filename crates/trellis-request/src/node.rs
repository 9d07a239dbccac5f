//! Change requests that act on a single node: creation, property edits and
//! renaming.

use std::collections::{BTreeMap, BTreeSet};

use trellis_types::{Location, Name, NodeConflictBehavior, Path, Property, Value};

use crate::base::{impl_request_kind, require_path};
use crate::change::{affects, most_specific, ChangeRequest};
use crate::error::UsageError;
use crate::kind::RequestType;
use crate::request::Request;
use crate::state::RequestState;

// ---------------------------------------------------------------------------
// CreateNodeRequest
// ---------------------------------------------------------------------------

/// Create a child node under an existing parent.
#[derive(Debug)]
pub struct CreateNodeRequest {
    state: RequestState,
    under: Location,
    workspace: String,
    child_name: Name,
    properties: Vec<Property>,
    conflict_behavior: NodeConflictBehavior,
    actual_location: Option<Location>,
}

impl CreateNodeRequest {
    pub fn new(
        under: Location,
        workspace: impl Into<String>,
        child_name: Name,
        properties: Vec<Property>,
        conflict_behavior: NodeConflictBehavior,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::CreateNode),
            under,
            workspace: workspace.into(),
            child_name,
            properties,
            conflict_behavior,
            actual_location: None,
        }
    }

    pub fn under(&self) -> &Location {
        &self.under
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn named(&self) -> &Name {
        &self.child_name
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn conflict_behavior(&self) -> NodeConflictBehavior {
        self.conflict_behavior
    }

    /// Location of the node that was created (or updated, depending on the
    /// conflict behaviour).
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

impl_request_kind!(CreateNodeRequest, read_only = false);

impl ChangeRequest for CreateNodeRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace
            && (affects(&self.under, None, path)
                || self
                    .actual_location
                    .as_ref()
                    .and_then(Location::path)
                    .is_some_and(|p| p.is_at_or_below(path)))
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.under, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        CreateNodeRequest::new(
            self.under.clone(),
            self.workspace.clone(),
            self.child_name.clone(),
            self.properties.clone(),
            self.conflict_behavior,
        )
        .into()
    }
}

// ---------------------------------------------------------------------------
// UpdatePropertiesRequest
// ---------------------------------------------------------------------------

/// Set and remove several properties on one node at once.
///
/// A `None` entry removes the property with that name.
#[derive(Debug)]
pub struct UpdatePropertiesRequest {
    state: RequestState,
    on: Location,
    workspace: String,
    properties: BTreeMap<Name, Option<Property>>,
    actual_location: Option<Location>,
    created_properties: BTreeSet<Name>,
    node_created: bool,
}

impl UpdatePropertiesRequest {
    pub fn new(
        on: Location,
        workspace: impl Into<String>,
        properties: BTreeMap<Name, Option<Property>>,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::UpdateProperties),
            on,
            workspace: workspace.into(),
            properties,
            actual_location: None,
            created_properties: BTreeSet::new(),
            node_created: false,
        }
    }

    pub fn on(&self) -> &Location {
        &self.on
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn properties(&self) -> &BTreeMap<Name, Option<Property>> {
        &self.properties
    }

    /// Names of the properties that are set (not removed).
    pub fn set_names(&self) -> impl Iterator<Item = &Name> {
        self.properties
            .iter()
            .filter_map(|(name, p)| p.as_ref().map(|_| name))
    }

    /// Names of the properties that are removed.
    pub fn removed_names(&self) -> impl Iterator<Item = &Name> {
        self.properties
            .iter()
            .filter_map(|(name, p)| p.is_none().then_some(name))
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

    /// Properties that did not exist before this request.
    pub fn created_properties(&self) -> &BTreeSet<Name> {
        &self.created_properties
    }

    pub fn set_created_properties(
        &mut self,
        names: impl IntoIterator<Item = Name>,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.created_properties = names.into_iter().collect();
        Ok(())
    }

    /// Whether the connector had to create the node itself.
    pub fn is_new_node(&self) -> bool {
        self.node_created
    }

    pub fn set_new_node(&mut self, created: bool) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.node_created = created;
        Ok(())
    }
}

impl_request_kind!(UpdatePropertiesRequest, read_only = false);

impl ChangeRequest for UpdatePropertiesRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.on, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.on, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        UpdatePropertiesRequest::new(
            self.on.clone(),
            self.workspace.clone(),
            self.properties.clone(),
        )
        .into()
    }
}

// ---------------------------------------------------------------------------
// SetPropertyRequest
// ---------------------------------------------------------------------------

/// Set (create or replace) a single property.
#[derive(Debug)]
pub struct SetPropertyRequest {
    state: RequestState,
    on: Location,
    workspace: String,
    property: Property,
    actual_location: Option<Location>,
    property_created: bool,
}

impl SetPropertyRequest {
    pub fn new(on: Location, workspace: impl Into<String>, property: Property) -> Self {
        Self {
            state: RequestState::new(RequestType::SetProperty),
            on,
            workspace: workspace.into(),
            property,
            actual_location: None,
            property_created: false,
        }
    }

    pub fn on(&self) -> &Location {
        &self.on
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn property(&self) -> &Property {
        &self.property
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

    pub fn is_new_property(&self) -> bool {
        self.property_created
    }

    pub fn set_new_property(&mut self, created: bool) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.property_created = created;
        Ok(())
    }
}

impl_request_kind!(SetPropertyRequest, read_only = false);

impl ChangeRequest for SetPropertyRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.on, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.on, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        SetPropertyRequest::new(self.on.clone(), self.workspace.clone(), self.property.clone()).into()
    }
}

// ---------------------------------------------------------------------------
// RemovePropertyRequest
// ---------------------------------------------------------------------------

/// Remove a single property. Removing an absent property is not an error.
#[derive(Debug)]
pub struct RemovePropertyRequest {
    state: RequestState,
    from: Location,
    workspace: String,
    property_name: Name,
    actual_location: Option<Location>,
}

impl RemovePropertyRequest {
    pub fn new(from: Location, workspace: impl Into<String>, property_name: Name) -> Self {
        Self {
            state: RequestState::new(RequestType::RemoveProperty),
            from,
            workspace: workspace.into(),
            property_name,
            actual_location: None,
        }
    }

    pub fn from(&self) -> &Location {
        &self.from
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn property_name(&self) -> &Name {
        &self.property_name
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

impl_request_kind!(RemovePropertyRequest, read_only = false);

impl ChangeRequest for RemovePropertyRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.from, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.from, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        RemovePropertyRequest::new(
            self.from.clone(),
            self.workspace.clone(),
            self.property_name.clone(),
        )
        .into()
    }
}

// ---------------------------------------------------------------------------
// UpdateValuesRequest
// ---------------------------------------------------------------------------

/// Add and remove individual values of a multi-valued property.
///
/// Values already present are not added twice; removing a value that is
/// not present is a no-op. The actual lists report what really changed.
#[derive(Debug)]
pub struct UpdateValuesRequest {
    state: RequestState,
    on: Location,
    workspace: String,
    property_name: Name,
    added: Vec<Value>,
    removed: Vec<Value>,
    actual_location: Option<Location>,
    actual_added: Vec<Value>,
    actual_removed: Vec<Value>,
}

impl UpdateValuesRequest {
    pub fn new(
        on: Location,
        workspace: impl Into<String>,
        property_name: Name,
        added: Vec<Value>,
        removed: Vec<Value>,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::UpdateValues),
            on,
            workspace: workspace.into(),
            property_name,
            added,
            removed,
            actual_location: None,
            actual_added: Vec::new(),
            actual_removed: Vec::new(),
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

    pub fn added_values(&self) -> &[Value] {
        &self.added
    }

    pub fn removed_values(&self) -> &[Value] {
        &self.removed
    }

    pub fn actual_location_of_node(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn actual_added_values(&self) -> &[Value] {
        &self.actual_added
    }

    pub fn actual_removed_values(&self) -> &[Value] {
        &self.actual_removed
    }

    pub fn set_actual_location(
        &mut self,
        actual: Location,
        actual_added: Vec<Value>,
        actual_removed: Vec<Value>,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&actual, "actual location")?;
        self.actual_location = Some(actual);
        self.actual_added = actual_added;
        self.actual_removed = actual_removed;
        Ok(())
    }
}

impl_request_kind!(UpdateValuesRequest, read_only = false);

impl ChangeRequest for UpdateValuesRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.on, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.on, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        UpdateValuesRequest::new(
            self.on.clone(),
            self.workspace.clone(),
            self.property_name.clone(),
            self.added.clone(),
            self.removed.clone(),
        )
        .into()
    }
}

// ---------------------------------------------------------------------------
// RenameNodeRequest
// ---------------------------------------------------------------------------

/// Give a node a new name under the same parent.
#[derive(Debug)]
pub struct RenameNodeRequest {
    state: RequestState,
    at: Location,
    workspace: String,
    new_name: Name,
    actual_old: Option<Location>,
    actual_new: Option<Location>,
}

impl RenameNodeRequest {
    pub fn new(at: Location, workspace: impl Into<String>, new_name: Name) -> Self {
        Self {
            state: RequestState::new(RequestType::RenameNode),
            at,
            workspace: workspace.into(),
            new_name,
            actual_old: None,
            actual_new: None,
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn to_name(&self) -> &Name {
        &self.new_name
    }

    pub fn actual_location_before(&self) -> Option<&Location> {
        self.actual_old.as_ref()
    }

    pub fn actual_location_after(&self) -> Option<&Location> {
        self.actual_new.as_ref()
    }

    /// Record where the node was and where it is now; both must have paths.
    pub fn set_actual_locations(&mut self, old: Location, new: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&old, "old location")?;
        require_path(&new, "new location")?;
        self.actual_old = Some(old);
        self.actual_new = Some(new);
        Ok(())
    }
}

impl_request_kind!(RenameNodeRequest, read_only = false);

impl ChangeRequest for RenameNodeRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace
            && (affects(&self.at, self.actual_old.as_ref(), path)
                || affects(&self.at, self.actual_new.as_ref(), path))
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.at, self.actual_new.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        RenameNodeRequest::new(self.at.clone(), self.workspace.clone(), self.new_name.clone()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::RequestKind;

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // changes()
    // -----------------------------------------------------------------------

    #[test]
    fn set_property_changes_its_subtree_only() {
        let r = SetPropertyRequest::new(loc("/a/b"), "ws", Property::single(name("p"), "v"));
        assert!(r.changes("ws", &path("/a")));
        assert!(r.changes("ws", &path("/a/b")));
        assert!(!r.changes("ws", &path("/a/b/c")));
        assert!(!r.changes("other", &path("/a")));
    }

    #[test]
    fn actual_location_takes_precedence() {
        let id = uuid::Uuid::new_v4();
        let mut r = RemovePropertyRequest::new(Location::from_uuid(id), "ws", name("p"));
        assert!(!r.changes("ws", &Path::root()));
        r.set_actual_location_of_node(loc("/x/y").with_uuid(id)).unwrap();
        assert!(r.changes("ws", &path("/x")));
        assert_eq!(r.changed_location().path(), Some(&path("/x/y")));
    }

    #[test]
    fn rename_changes_old_and_new_locations() {
        let mut r = RenameNodeRequest::new(loc("/a/b"), "ws", name("c"));
        r.set_actual_locations(loc("/a/b"), loc("/a/c")).unwrap();
        assert!(r.changes("ws", &path("/a/b")));
        assert!(r.changes("ws", &path("/a/c")));
        assert_eq!(r.changed_location(), &loc("/a/c"));
    }

    #[test]
    fn create_node_changes_parent_subtree() {
        let mut r = CreateNodeRequest::new(
            loc("/a"),
            "ws",
            name("b"),
            vec![],
            NodeConflictBehavior::Append,
        );
        assert!(r.changes("ws", &path("/a")));
        assert!(!r.changes("ws", &path("/a/b")));
        r.set_actual_location_of_node(loc("/a/b")).unwrap();
        assert!(r.changes("ws", &path("/a/b")));
    }

    // -----------------------------------------------------------------------
    // clone_unprocessed()
    // -----------------------------------------------------------------------

    #[test]
    fn clone_drops_results_and_state() {
        let mut r = SetPropertyRequest::new(loc("/a"), "ws", Property::single(name("p"), 1i64));
        r.set_actual_location_of_node(loc("/a")).unwrap();
        r.set_new_property(true).unwrap();
        r.freeze();

        let copy = r.clone_unprocessed();
        assert!(!copy.is_frozen());
        assert_eq!(copy.request_type(), RequestType::SetProperty);
        match copy {
            Request::SetProperty(c) => {
                assert_eq!(c.on(), r.on());
                assert_eq!(c.property(), r.property());
                assert!(c.actual_location_of_node().is_none());
                assert!(!c.is_new_property());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clone_does_not_share_cancellation() {
        let r = RenameNodeRequest::new(loc("/a"), "ws", name("b"));
        let copy = r.clone_unprocessed();
        r.cancel().unwrap();
        assert!(!copy.is_cancelled());
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    #[test]
    fn update_properties_partitions_names() {
        let mut map = BTreeMap::new();
        map.insert(name("a"), Some(Property::single(name("a"), "1")));
        map.insert(name("b"), None);
        let r = UpdatePropertiesRequest::new(loc("/n"), "ws", map);
        assert_eq!(r.set_names().collect::<Vec<_>>(), vec![&name("a")]);
        assert_eq!(r.removed_names().collect::<Vec<_>>(), vec![&name("b")]);
    }

    #[test]
    fn update_values_records_actual_changes() {
        let mut r = UpdateValuesRequest::new(
            loc("/n"),
            "ws",
            name("tags"),
            vec![Value::from("x"), Value::from("y")],
            vec![Value::from("z")],
        );
        r.set_actual_location(loc("/n"), vec![Value::from("y")], vec![])
            .unwrap();
        assert_eq!(r.actual_added_values(), &[Value::from("y")]);
        assert!(r.actual_removed_values().is_empty());
        r.freeze();
        assert!(r.set_actual_location(loc("/n"), vec![], vec![]).is_err());
    }

    #[test]
    fn rename_requires_paths() {
        let mut r = RenameNodeRequest::new(loc("/a"), "ws", name("b"));
        let no_path = Location::from_uuid(uuid::Uuid::new_v4());
        assert!(r.set_actual_locations(no_path, loc("/b")).is_err());
        assert!(r.actual_location_before().is_none());
    }
}
