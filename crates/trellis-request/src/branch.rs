//! Change requests that act on a whole branch (a node and its descendants).

use trellis_types::{Location, LockScope, Name, NodeConflictBehavior, Path, Segment};

use crate::base::{impl_request_kind, require_path};
use crate::change::{affects, most_specific, ChangeRequest};
use crate::error::UsageError;
use crate::kind::RequestType;
use crate::request::Request;
use crate::state::RequestState;

/// Where a moved branch should end up.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveTarget {
    /// Append as the last child of this parent.
    Into(Location),
    /// Insert immediately before this sibling, under the sibling's parent.
    Before(Location),
}

// ---------------------------------------------------------------------------
// MoveBranchRequest
// ---------------------------------------------------------------------------

/// Move a branch to a new parent, or reorder it among its siblings.
#[derive(Debug)]
pub struct MoveBranchRequest {
    state: RequestState,
    from: Location,
    target: MoveTarget,
    workspace: String,
    desired_name: Option<Name>,
    conflict_behavior: NodeConflictBehavior,
    actual_old: Option<Location>,
    actual_new: Option<Location>,
}

impl MoveBranchRequest {
    /// Move `from` to be the last child of `into`.
    pub fn new(from: Location, into: Location, workspace: impl Into<String>) -> Self {
        Self::with_target(from, MoveTarget::Into(into), workspace)
    }

    /// Move `from` to sit just before `before`.
    pub fn before(from: Location, before: Location, workspace: impl Into<String>) -> Self {
        Self::with_target(from, MoveTarget::Before(before), workspace)
    }

    fn with_target(from: Location, target: MoveTarget, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::MoveBranch),
            from,
            target,
            workspace: workspace.into(),
            desired_name: None,
            conflict_behavior: NodeConflictBehavior::default(),
            actual_old: None,
            actual_new: None,
        }
    }

    /// Rename the branch root as part of the move.
    pub fn with_desired_name(mut self, name: Name) -> Self {
        self.desired_name = Some(name);
        self
    }

    pub fn with_conflict_behavior(mut self, behavior: NodeConflictBehavior) -> Self {
        self.conflict_behavior = behavior;
        self
    }

    pub fn from(&self) -> &Location {
        &self.from
    }

    pub fn target(&self) -> &MoveTarget {
        &self.target
    }

    pub fn destination(&self) -> Option<&Location> {
        match &self.target {
            MoveTarget::Into(l) => Some(l),
            MoveTarget::Before(_) => None,
        }
    }

    pub fn before_location(&self) -> Option<&Location> {
        match &self.target {
            MoveTarget::Before(l) => Some(l),
            MoveTarget::Into(_) => None,
        }
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn desired_name(&self) -> Option<&Name> {
        self.desired_name.as_ref()
    }

    pub fn conflict_behavior(&self) -> NodeConflictBehavior {
        self.conflict_behavior
    }

    /// Returns `true` for a move of a node to just before itself.
    pub fn has_no_effect(&self) -> bool {
        match &self.target {
            MoveTarget::Before(before) => self.desired_name.is_none() && before.is_same(&self.from),
            MoveTarget::Into(_) => false,
        }
    }

    pub fn actual_location_before(&self) -> Option<&Location> {
        self.actual_old.as_ref()
    }

    pub fn actual_location_after(&self) -> Option<&Location> {
        self.actual_new.as_ref()
    }

    pub fn set_actual_locations(&mut self, old: Location, new: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&old, "old location")?;
        require_path(&new, "new location")?;
        self.actual_old = Some(old);
        self.actual_new = Some(new);
        Ok(())
    }
}

impl_request_kind!(MoveBranchRequest, read_only = false);

impl MoveBranchRequest {
    /// Whether the parent the branch lands under lies at or below `path`.
    /// That parent is the `into` target, or the parent of the `before` sibling.
    fn nominal_destination_affects(&self, path: &Path) -> bool {
        match &self.target {
            MoveTarget::Into(into) => affects(into, None, path),
            MoveTarget::Before(before) => before
                .path()
                .and_then(Path::parent)
                .is_some_and(|parent| parent.is_at_or_below(path)),
        }
    }
}

impl ChangeRequest for MoveBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace
            && (affects(&self.from, self.actual_old.as_ref(), path)
                || self.nominal_destination_affects(path)
                || self
                    .actual_new
                    .as_ref()
                    .and_then(Location::path)
                    .is_some_and(|p| p.is_at_or_below(path)))
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.from, self.actual_new.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        let mut copy = Self::with_target(self.from.clone(), self.target.clone(), self.workspace.clone())
            .with_conflict_behavior(self.conflict_behavior);
        copy.desired_name = self.desired_name.clone();
        copy.into()
    }
}

// ---------------------------------------------------------------------------
// CopyBranchRequest
// ---------------------------------------------------------------------------

/// Copy a branch, possibly across workspaces, giving the copies new identities.
#[derive(Debug)]
pub struct CopyBranchRequest {
    state: RequestState,
    from: Location,
    from_workspace: String,
    into: Location,
    into_workspace: String,
    desired_name: Option<Name>,
    conflict_behavior: NodeConflictBehavior,
    actual_from: Option<Location>,
    actual_into: Option<Location>,
}

impl CopyBranchRequest {
    pub fn new(
        from: Location,
        from_workspace: impl Into<String>,
        into: Location,
        into_workspace: impl Into<String>,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::CopyBranch),
            from,
            from_workspace: from_workspace.into(),
            into,
            into_workspace: into_workspace.into(),
            desired_name: None,
            conflict_behavior: NodeConflictBehavior::default(),
            actual_from: None,
            actual_into: None,
        }
    }

    pub fn with_desired_name(mut self, name: Name) -> Self {
        self.desired_name = Some(name);
        self
    }

    pub fn with_conflict_behavior(mut self, behavior: NodeConflictBehavior) -> Self {
        self.conflict_behavior = behavior;
        self
    }

    pub fn from(&self) -> &Location {
        &self.from
    }

    pub fn from_workspace(&self) -> &str {
        &self.from_workspace
    }

    pub fn destination(&self) -> &Location {
        &self.into
    }

    pub fn destination_workspace(&self) -> &str {
        &self.into_workspace
    }

    pub fn desired_name(&self) -> Option<&Name> {
        self.desired_name.as_ref()
    }

    pub fn conflict_behavior(&self) -> NodeConflictBehavior {
        self.conflict_behavior
    }

    pub fn actual_location_before(&self) -> Option<&Location> {
        self.actual_from.as_ref()
    }

    /// Location of the root of the new copy.
    pub fn actual_location_after(&self) -> Option<&Location> {
        self.actual_into.as_ref()
    }

    pub fn set_actual_locations(&mut self, from: Location, into: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&from, "source location")?;
        require_path(&into, "copy location")?;
        self.actual_from = Some(from);
        self.actual_into = Some(into);
        Ok(())
    }
}

impl_request_kind!(CopyBranchRequest, read_only = false);

impl ChangeRequest for CopyBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.into_workspace == workspace
            && (affects(&self.into, None, path)
                || self
                    .actual_into
                    .as_ref()
                    .and_then(Location::path)
                    .is_some_and(|p| p.is_at_or_below(path)))
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.into, self.actual_into.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.into_workspace
    }

    fn clone_unprocessed(&self) -> Request {
        let mut copy = Self::new(
            self.from.clone(),
            self.from_workspace.clone(),
            self.into.clone(),
            self.into_workspace.clone(),
        )
        .with_conflict_behavior(self.conflict_behavior);
        copy.desired_name = self.desired_name.clone();
        copy.into()
    }
}

// ---------------------------------------------------------------------------
// CloneBranchRequest
// ---------------------------------------------------------------------------

/// Copy a branch while preserving node identities (UUIDs).
///
/// Nodes elsewhere in the target workspace that carry one of the cloned
/// identities are removed when `remove_existing` is set; otherwise such a
/// collision fails the request.
#[derive(Debug)]
pub struct CloneBranchRequest {
    state: RequestState,
    from: Location,
    from_workspace: String,
    into: Location,
    into_workspace: String,
    desired_name: Option<Name>,
    desired_segment: Option<Segment>,
    remove_existing: bool,
    actual_from: Option<Location>,
    actual_into: Option<Location>,
    removed_existing: Vec<Location>,
}

impl CloneBranchRequest {
    pub fn new(
        from: Location,
        from_workspace: impl Into<String>,
        into: Location,
        into_workspace: impl Into<String>,
        remove_existing: bool,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::CloneBranch),
            from,
            from_workspace: from_workspace.into(),
            into,
            into_workspace: into_workspace.into(),
            desired_name: None,
            desired_segment: None,
            remove_existing,
            actual_from: None,
            actual_into: None,
            removed_existing: Vec::new(),
        }
    }

    /// Name the clone's root; it is appended as a new sibling.
    pub fn with_desired_name(mut self, name: Name) -> Self {
        self.desired_name = Some(name);
        self.desired_segment = None;
        self
    }

    /// Replace exactly the node at this segment under the target parent.
    pub fn with_desired_segment(mut self, segment: Segment) -> Self {
        self.desired_segment = Some(segment);
        self.desired_name = None;
        self
    }

    pub fn from(&self) -> &Location {
        &self.from
    }

    pub fn from_workspace(&self) -> &str {
        &self.from_workspace
    }

    pub fn destination(&self) -> &Location {
        &self.into
    }

    pub fn destination_workspace(&self) -> &str {
        &self.into_workspace
    }

    pub fn desired_name(&self) -> Option<&Name> {
        self.desired_name.as_ref()
    }

    pub fn desired_segment(&self) -> Option<&Segment> {
        self.desired_segment.as_ref()
    }

    pub fn remove_existing(&self) -> bool {
        self.remove_existing
    }

    pub fn actual_location_before(&self) -> Option<&Location> {
        self.actual_from.as_ref()
    }

    pub fn actual_location_after(&self) -> Option<&Location> {
        self.actual_into.as_ref()
    }

    pub fn set_actual_locations(&mut self, from: Location, into: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&from, "source location")?;
        require_path(&into, "clone location")?;
        self.actual_from = Some(from);
        self.actual_into = Some(into);
        Ok(())
    }

    /// Nodes removed from the target workspace because of identity clashes.
    pub fn removed_existing_nodes(&self) -> &[Location] {
        &self.removed_existing
    }

    pub fn set_removed_existing_nodes(&mut self, removed: Vec<Location>) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.removed_existing = removed;
        Ok(())
    }
}

impl_request_kind!(CloneBranchRequest, read_only = false);

impl ChangeRequest for CloneBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.into_workspace == workspace
            && (affects(&self.into, None, path)
                || self
                    .actual_into
                    .as_ref()
                    .and_then(Location::path)
                    .is_some_and(|p| p.is_at_or_below(path))
                || self
                    .removed_existing
                    .iter()
                    .filter_map(Location::path)
                    .any(|p| p.is_at_or_below(path)))
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.into, self.actual_into.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.into_workspace
    }

    fn clone_unprocessed(&self) -> Request {
        let mut copy = Self::new(
            self.from.clone(),
            self.from_workspace.clone(),
            self.into.clone(),
            self.into_workspace.clone(),
            self.remove_existing,
        );
        copy.desired_name = self.desired_name.clone();
        copy.desired_segment = self.desired_segment.clone();
        copy.into()
    }
}

// ---------------------------------------------------------------------------
// DeleteBranchRequest
// ---------------------------------------------------------------------------

/// Delete a node and everything below it.
#[derive(Debug)]
pub struct DeleteBranchRequest {
    state: RequestState,
    at: Location,
    workspace: String,
    actual_location: Option<Location>,
}

impl DeleteBranchRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::DeleteBranch),
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

impl_request_kind!(DeleteBranchRequest, read_only = false);

impl ChangeRequest for DeleteBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.at, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.at, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(self.at.clone(), self.workspace.clone()).into()
    }
}

// ---------------------------------------------------------------------------
// DeleteChildrenRequest
// ---------------------------------------------------------------------------

/// Delete every child branch of a node, keeping the node itself.
#[derive(Debug)]
pub struct DeleteChildrenRequest {
    state: RequestState,
    at: Location,
    workspace: String,
    actual_location: Option<Location>,
    deleted_children: Vec<Location>,
}

impl DeleteChildrenRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::DeleteChildren),
            at,
            workspace: workspace.into(),
            actual_location: None,
            deleted_children: Vec::new(),
        }
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
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

    pub fn actual_children_deleted(&self) -> &[Location] {
        &self.deleted_children
    }

    pub fn add_deleted_child(&mut self, child: Location) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        require_path(&child, "deleted child")?;
        self.deleted_children.push(child);
        Ok(())
    }
}

impl_request_kind!(DeleteChildrenRequest, read_only = false);

impl ChangeRequest for DeleteChildrenRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.at, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.at, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(self.at.clone(), self.workspace.clone()).into()
    }
}

// ---------------------------------------------------------------------------
// LockBranchRequest
// ---------------------------------------------------------------------------

/// Lock a node (or its whole branch) against modification.
#[derive(Debug)]
pub struct LockBranchRequest {
    state: RequestState,
    at: Location,
    workspace: String,
    scope: LockScope,
    timeout_ms: Option<u64>,
    actual_location: Option<Location>,
}

impl LockBranchRequest {
    pub fn new(at: Location, workspace: impl Into<String>, scope: LockScope) -> Self {
        Self {
            state: RequestState::new(RequestType::LockBranch),
            at,
            workspace: workspace.into(),
            scope,
            timeout_ms: None,
            actual_location: None,
        }
    }

    /// Ask the connector to release the lock after this many milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn in_workspace(&self) -> &str {
        &self.workspace
    }

    pub fn lock_scope(&self) -> LockScope {
        self.scope
    }

    pub fn lock_timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
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

impl_request_kind!(LockBranchRequest, read_only = false);

impl ChangeRequest for LockBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.at, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.at, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        let mut copy = Self::new(self.at.clone(), self.workspace.clone(), self.scope);
        copy.timeout_ms = self.timeout_ms;
        copy.into()
    }
}

// ---------------------------------------------------------------------------
// UnlockBranchRequest
// ---------------------------------------------------------------------------

/// Release a lock previously taken with [`LockBranchRequest`].
#[derive(Debug)]
pub struct UnlockBranchRequest {
    state: RequestState,
    at: Location,
    workspace: String,
    actual_location: Option<Location>,
}

impl UnlockBranchRequest {
    pub fn new(at: Location, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::UnlockBranch),
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

impl_request_kind!(UnlockBranchRequest, read_only = false);

impl ChangeRequest for UnlockBranchRequest {
    fn changes(&self, workspace: &str, path: &Path) -> bool {
        self.workspace == workspace && affects(&self.at, self.actual_location.as_ref(), path)
    }

    fn changed_location(&self) -> &Location {
        most_specific(&self.at, self.actual_location.as_ref())
    }

    fn changed_workspace(&self) -> &str {
        &self.workspace
    }

    fn clone_unprocessed(&self) -> Request {
        Self::new(self.at.clone(), self.workspace.clone()).into()
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

    #[test]
    fn move_targets_are_exclusive() {
        let into = MoveBranchRequest::new(loc("/a"), loc("/b"), "ws");
        assert_eq!(into.destination(), Some(&loc("/b")));
        assert!(into.before_location().is_none());

        let before = MoveBranchRequest::before(loc("/a"), loc("/c"), "ws");
        assert!(before.destination().is_none());
        assert_eq!(before.before_location(), Some(&loc("/c")));
    }

    #[test]
    fn move_before_itself_has_no_effect() {
        let r = MoveBranchRequest::before(loc("/a/b"), loc("/a/b"), "ws");
        assert!(r.has_no_effect());
        assert!(!MoveBranchRequest::new(loc("/a/b"), loc("/x"), "ws").has_no_effect());
    }

    #[test]
    fn move_changes_old_and_new_subtrees() {
        let mut r = MoveBranchRequest::new(loc("/a/b"), loc("/x"), "ws");
        assert!(r.changes("ws", &path("/a")));
        assert!(r.changes("ws", &path("/x")));
        assert!(!r.changes("ws", &path("/y")));
        r.set_actual_locations(loc("/a/b"), loc("/x/b")).unwrap();
        assert!(r.changes("ws", &path("/x")));
        assert!(r.changes("ws", &path("/a/b")));
        assert!(!r.changes("ws", &path("/y")));
        assert_eq!(r.changed_location(), &loc("/x/b"));
    }

    #[test]
    fn unprocessed_move_before_changes_sibling_parent() {
        let r = MoveBranchRequest::before(loc("/a/b"), loc("/y/z"), "ws");
        assert!(r.changes("ws", &path("/y")));
        assert!(r.changes("ws", &path("/a")));
        assert!(!r.changes("ws", &path("/y/z")));
        assert!(!r.changes("other", &path("/y")));
    }

    #[test]
    fn copy_changes_target_workspace_only() {
        let r = CopyBranchRequest::new(loc("/a"), "source", loc("/b"), "target");
        assert!(r.changes("target", &path("/b")));
        assert!(!r.changes("source", &path("/a")));
        assert_eq!(r.changed_workspace(), "target");
    }

    #[test]
    fn clone_branch_reports_removed_nodes() {
        let mut r = CloneBranchRequest::new(loc("/a"), "source", loc("/b"), "target", true);
        r.set_removed_existing_nodes(vec![loc("/elsewhere/n")]).unwrap();
        assert!(r.changes("target", &path("/elsewhere")));
    }

    #[test]
    fn desired_name_and_segment_are_exclusive() {
        let seg = Segment::new(Name::new("s").unwrap());
        let r = CloneBranchRequest::new(loc("/a"), "s", loc("/b"), "t", false)
            .with_desired_name(Name::new("n").unwrap())
            .with_desired_segment(seg.clone());
        assert!(r.desired_name().is_none());
        assert_eq!(r.desired_segment(), Some(&seg));
    }

    #[test]
    fn delete_children_records_deleted() {
        let mut r = DeleteChildrenRequest::new(loc("/a"), "ws");
        r.add_deleted_child(loc("/a/x")).unwrap();
        r.freeze();
        assert_eq!(r.actual_children_deleted(), &[loc("/a/x")]);
        assert!(r.add_deleted_child(loc("/a/y")).is_err());
    }

    #[test]
    fn lock_clone_keeps_timeout() {
        let r = LockBranchRequest::new(loc("/a"), "ws", LockScope::SelfAndDescendants)
            .with_timeout_ms(500);
        match r.clone_unprocessed() {
            Request::LockBranch(copy) => {
                assert_eq!(copy.lock_timeout_ms(), Some(500));
                assert_eq!(copy.lock_scope(), LockScope::SelfAndDescendants);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
