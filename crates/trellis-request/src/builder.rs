//! Turning a stream of caller intents into a minimal set of requests.
//!
//! [`BatchRequestBuilder`] offers one method per request kind. Property
//! edits on the same node that arrive back to back are merged into a single
//! request; everything else is passed through in call order. Finished
//! requests go to a [`RequestSink`], which decides what submission means
//! (collect for a later [`BatchRequestBuilder::pop`], push into a channel,
//! and so on).

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::num::NonZeroUsize;

use tracing::trace;
use trellis_types::{
    CloneConflictBehavior, CreateConflictBehavior, Location, LockScope, Name, NodeConflictBehavior,
    Property, Segment, Value,
};

use crate::branch::{
    CloneBranchRequest, CopyBranchRequest, DeleteBranchRequest, DeleteChildrenRequest,
    LockBranchRequest, MoveBranchRequest, UnlockBranchRequest,
};
use crate::composite::CompositeRequest;
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

/// Where a builder sends the requests it finishes.
pub trait RequestSink {
    type Error;

    fn submit(&mut self, request: Request) -> Result<(), Self::Error>;
}

impl RequestSink for Vec<Request> {
    type Error = Infallible;

    fn submit(&mut self, request: Request) -> Result<(), Self::Error> {
        self.push(request);
        Ok(())
    }
}

/// Pending property edits for one node. `None` marks a removal.
#[derive(Debug)]
struct NodeChange {
    location: Location,
    workspace: String,
    properties: BTreeMap<Name, Option<Property>>,
}

impl NodeChange {
    fn targets(&self, location: &Location, workspace: &str) -> bool {
        self.workspace == workspace && self.location.is_same(location)
    }

    fn into_request(mut self) -> Option<Request> {
        if self.properties.len() > 1 {
            return Some(
                UpdatePropertiesRequest::new(self.location, self.workspace, self.properties).into(),
            );
        }
        let (name, property) = self.properties.pop_first()?;
        Some(match property {
            Some(property) => SetPropertyRequest::new(self.location, self.workspace, property).into(),
            None => RemovePropertyRequest::new(self.location, self.workspace, name).into(),
        })
    }
}

/// Builds requests and hands them to a [`RequestSink`].
///
/// Every method returns the builder for chaining. The first sink failure is
/// kept; later calls are ignored until [`flush`](Self::flush) reports it.
pub struct BatchRequestBuilder<S: RequestSink = Vec<Request>> {
    sink: S,
    pending: Option<NodeChange>,
    failure: Option<S::Error>,
}

impl BatchRequestBuilder<Vec<Request>> {
    /// A builder that collects requests until [`pop`](Self::pop) is called.
    pub fn new() -> Self {
        Self::with_sink(Vec::new())
    }

    /// Everything built since the last call, as one request.
    ///
    /// Returns `None` if nothing was built, the request itself if exactly one
    /// was, and a composite otherwise.
    pub fn pop(&mut self) -> Option<Request> {
        self.finish_pending();
        let requests = std::mem::take(&mut self.sink);
        CompositeRequest::with(requests).ok()
    }

    /// Whether any request (or pending property edit) is waiting.
    pub fn has_requests(&self) -> bool {
        self.pending.is_some() || !self.sink.is_empty()
    }
}

impl Default for BatchRequestBuilder<Vec<Request>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RequestSink> BatchRequestBuilder<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            pending: None,
            failure: None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Submit any pending property edits and report the first sink failure.
    pub fn flush(&mut self) -> Result<(), S::Error> {
        self.finish_pending();
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Flush and give back the sink.
    pub fn finish(mut self) -> Result<S, S::Error> {
        self.flush()?;
        Ok(self.sink)
    }

    /// Submit an already built request.
    pub fn submit(&mut self, request: impl Into<Request>) -> &mut Self {
        self.finish_pending();
        self.send(request.into());
        self
    }

    fn send(&mut self, request: Request) {
        if self.failure.is_some() {
            return;
        }
        if let Err(error) = self.sink.submit(request) {
            self.failure = Some(error);
        }
    }

    fn finish_pending(&mut self) {
        if let Some(change) = self.pending.take() {
            trace!(
                location = %change.location,
                properties = change.properties.len(),
                "flushing pending property edits"
            );
            if let Some(request) = change.into_request() {
                self.send(request);
            }
        }
    }

    /// Record property edits, merging with the pending edits for the same node.
    fn edit(
        &mut self,
        location: Location,
        workspace: String,
        edits: impl IntoIterator<Item = (Name, Option<Property>)>,
    ) -> &mut Self {
        let mut edits = edits.into_iter().peekable();
        if edits.peek().is_none() {
            return self;
        }
        let same = self
            .pending
            .as_ref()
            .is_some_and(|change| change.targets(&location, &workspace));
        if !same {
            self.finish_pending();
            self.pending = Some(NodeChange {
                location,
                workspace,
                properties: BTreeMap::new(),
            });
        }
        if let Some(change) = self.pending.as_mut() {
            change.properties.extend(edits);
        }
        self
    }

    // -----------------------------------------------------------------------
    // Property edits (merged)
    // -----------------------------------------------------------------------

    pub fn set_property(
        &mut self,
        on: Location,
        workspace: impl Into<String>,
        property: Property,
    ) -> &mut Self {
        let name = property.name().clone();
        self.edit(on, workspace.into(), [(name, Some(property))])
    }

    pub fn set_properties(
        &mut self,
        on: Location,
        workspace: impl Into<String>,
        properties: impl IntoIterator<Item = Property>,
    ) -> &mut Self {
        let edits = properties
            .into_iter()
            .map(|p| (p.name().clone(), Some(p)));
        self.edit(on, workspace.into(), edits)
    }

    pub fn remove_property(
        &mut self,
        from: Location,
        workspace: impl Into<String>,
        name: Name,
    ) -> &mut Self {
        self.edit(from, workspace.into(), [(name, None)])
    }

    pub fn remove_properties(
        &mut self,
        from: Location,
        workspace: impl Into<String>,
        names: impl IntoIterator<Item = Name>,
    ) -> &mut Self {
        let edits = names.into_iter().map(|n| (n, None));
        self.edit(from, workspace.into(), edits)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn read_node(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(ReadNodeRequest::new(at, workspace))
    }

    pub fn read_all_children(&mut self, of: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(ReadAllChildrenRequest::new(of, workspace))
    }

    pub fn read_block_of_children(
        &mut self,
        of: Location,
        workspace: impl Into<String>,
        starting_index: usize,
        count: NonZeroUsize,
    ) -> &mut Self {
        self.submit(ReadBlockOfChildrenRequest::new(of, workspace, starting_index, count))
    }

    pub fn read_next_block_of_children(
        &mut self,
        starting_after: Location,
        workspace: impl Into<String>,
        count: NonZeroUsize,
    ) -> &mut Self {
        self.submit(ReadNextBlockOfChildrenRequest::new(starting_after, workspace, count))
    }

    pub fn read_all_properties(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(ReadAllPropertiesRequest::new(at, workspace))
    }

    pub fn read_property(
        &mut self,
        on: Location,
        workspace: impl Into<String>,
        name: Name,
    ) -> &mut Self {
        self.submit(ReadPropertyRequest::new(on, workspace, name))
    }

    pub fn read_branch(
        &mut self,
        at: Location,
        workspace: impl Into<String>,
        max_depth: NonZeroUsize,
    ) -> &mut Self {
        self.submit(ReadBranchRequest::new(at, workspace, max_depth))
    }

    pub fn verify_node_exists(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(VerifyNodeExistsRequest::new(at, workspace))
    }

    pub fn verify_workspace(&mut self, workspace: Option<String>) -> &mut Self {
        self.submit(VerifyWorkspaceRequest::new(workspace))
    }

    pub fn get_workspaces(&mut self) -> &mut Self {
        self.submit(GetWorkspacesRequest::new())
    }

    // -----------------------------------------------------------------------
    // Searches
    // -----------------------------------------------------------------------

    pub fn access_query(
        &mut self,
        workspace: impl Into<String>,
        selector_name: Name,
        columns: Vec<Name>,
        constraints: Vec<String>,
        limit: Option<usize>,
        offset: usize,
    ) -> &mut Self {
        let mut query = AccessQueryRequest::new(workspace, selector_name, columns, constraints)
            .with_offset(offset);
        if let Some(limit) = limit {
            query = query.with_limit(limit);
        }
        self.submit(query)
    }

    pub fn search(
        &mut self,
        expression: impl Into<String>,
        workspace: impl Into<String>,
        max_results: Option<usize>,
        offset: usize,
    ) -> &mut Self {
        let mut search = FullTextSearchRequest::new(expression, workspace).with_offset(offset);
        if let Some(max) = max_results {
            search = search.with_max_results(max);
        }
        self.submit(search)
    }

    // -----------------------------------------------------------------------
    // Node changes
    // -----------------------------------------------------------------------

    pub fn create_node(
        &mut self,
        under: Location,
        workspace: impl Into<String>,
        name: Name,
        properties: Vec<Property>,
        conflict_behavior: NodeConflictBehavior,
    ) -> &mut Self {
        self.submit(CreateNodeRequest::new(
            under,
            workspace,
            name,
            properties,
            conflict_behavior,
        ))
    }

    pub fn update_values(
        &mut self,
        on: Location,
        workspace: impl Into<String>,
        property_name: Name,
        added: Vec<Value>,
        removed: Vec<Value>,
    ) -> &mut Self {
        self.submit(UpdateValuesRequest::new(on, workspace, property_name, added, removed))
    }

    pub fn rename_node(
        &mut self,
        at: Location,
        workspace: impl Into<String>,
        new_name: Name,
    ) -> &mut Self {
        self.submit(RenameNodeRequest::new(at, workspace, new_name))
    }

    // -----------------------------------------------------------------------
    // Branch changes
    // -----------------------------------------------------------------------

    pub fn move_branch(
        &mut self,
        from: Location,
        into: Location,
        workspace: impl Into<String>,
        desired_name: Option<Name>,
        conflict_behavior: NodeConflictBehavior,
    ) -> &mut Self {
        let mut request =
            MoveBranchRequest::new(from, into, workspace).with_conflict_behavior(conflict_behavior);
        if let Some(name) = desired_name {
            request = request.with_desired_name(name);
        }
        self.submit(request)
    }

    pub fn move_branch_before(
        &mut self,
        from: Location,
        before: Location,
        workspace: impl Into<String>,
        conflict_behavior: NodeConflictBehavior,
    ) -> &mut Self {
        self.submit(
            MoveBranchRequest::before(from, before, workspace)
                .with_conflict_behavior(conflict_behavior),
        )
    }

    pub fn copy_branch(
        &mut self,
        from: Location,
        from_workspace: impl Into<String>,
        into: Location,
        into_workspace: impl Into<String>,
        desired_name: Option<Name>,
        conflict_behavior: NodeConflictBehavior,
    ) -> &mut Self {
        let mut request = CopyBranchRequest::new(from, from_workspace, into, into_workspace)
            .with_conflict_behavior(conflict_behavior);
        if let Some(name) = desired_name {
            request = request.with_desired_name(name);
        }
        self.submit(request)
    }

    pub fn clone_branch(
        &mut self,
        from: Location,
        from_workspace: impl Into<String>,
        into: Location,
        into_workspace: impl Into<String>,
        desired_segment: Option<Segment>,
        remove_existing: bool,
    ) -> &mut Self {
        let mut request =
            CloneBranchRequest::new(from, from_workspace, into, into_workspace, remove_existing);
        if let Some(segment) = desired_segment {
            request = request.with_desired_segment(segment);
        }
        self.submit(request)
    }

    pub fn delete_branch(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(DeleteBranchRequest::new(at, workspace))
    }

    pub fn delete_children(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(DeleteChildrenRequest::new(at, workspace))
    }

    pub fn lock_branch(
        &mut self,
        at: Location,
        workspace: impl Into<String>,
        scope: LockScope,
        timeout_ms: Option<u64>,
    ) -> &mut Self {
        let mut request = LockBranchRequest::new(at, workspace, scope);
        if let Some(timeout) = timeout_ms {
            request = request.with_timeout_ms(timeout);
        }
        self.submit(request)
    }

    pub fn unlock_branch(&mut self, at: Location, workspace: impl Into<String>) -> &mut Self {
        self.submit(UnlockBranchRequest::new(at, workspace))
    }

    // -----------------------------------------------------------------------
    // Workspaces
    // -----------------------------------------------------------------------

    pub fn create_workspace(
        &mut self,
        desired_name: impl Into<String>,
        conflict_behavior: CreateConflictBehavior,
    ) -> &mut Self {
        self.submit(CreateWorkspaceRequest::new(desired_name, conflict_behavior))
    }

    pub fn clone_workspace(
        &mut self,
        name_to_clone: impl Into<String>,
        desired_name: impl Into<String>,
        create_conflict: CreateConflictBehavior,
        clone_conflict: CloneConflictBehavior,
    ) -> &mut Self {
        self.submit(CloneWorkspaceRequest::new(
            name_to_clone,
            desired_name,
            create_conflict,
            clone_conflict,
        ))
    }

    pub fn destroy_workspace(&mut self, name: impl Into<String>) -> &mut Self {
        self.submit(DestroyWorkspaceRequest::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::RequestKind;
    use crate::kind::RequestType;
    use proptest::prelude::*;
    use trellis_types::Path;

    fn loc(s: &str) -> Location {
        Location::from_path(Path::parse(s).unwrap())
    }

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn prop(n: &str, v: &str) -> Property {
        Property::single(name(n), v)
    }

    fn members(request: Request) -> Vec<Request> {
        match request {
            Request::Composite(c) => c.into_requests(),
            other => vec![other],
        }
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    #[test]
    fn same_location_edits_merge() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "ws", prop("p1", "x"))
            .set_property(loc("/a"), "ws", prop("p2", "y"));

        match b.pop() {
            Some(Request::UpdateProperties(r)) => {
                let names: Vec<&str> = r.properties().keys().map(Name::as_str).collect();
                assert_eq!(names, vec!["p1", "p2"]);
                assert_eq!(r.on(), &loc("/a"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn different_locations_do_not_merge() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "ws", prop("p1", "x"))
            .set_property(loc("/b"), "ws", prop("p2", "y"));

        let request = b.pop().unwrap();
        assert_eq!(request.request_type(), RequestType::Composite);
        let requests = members(request);
        assert_eq!(requests.len(), 2);
        match (&requests[0], &requests[1]) {
            (Request::SetProperty(first), Request::SetProperty(second)) => {
                assert_eq!(first.on(), &loc("/a"));
                assert_eq!(second.on(), &loc("/b"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_edit_is_not_wrapped() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "ws", prop("p", "x"));
        assert!(matches!(b.pop(), Some(Request::SetProperty(_))));
        assert!(b.pop().is_none());
    }

    #[test]
    fn single_removal_becomes_remove_request() {
        let mut b = BatchRequestBuilder::new();
        b.remove_property(loc("/a"), "ws", name("p"));
        match b.pop() {
            Some(Request::RemoveProperty(r)) => assert_eq!(r.property_name(), &name("p")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_write_wins() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "ws", prop("p", "x"))
            .remove_property(loc("/a"), "ws", name("p"));
        assert!(matches!(b.pop(), Some(Request::RemoveProperty(_))));

        b.remove_property(loc("/a"), "ws", name("p"))
            .set_property(loc("/a"), "ws", prop("p", "z"));
        match b.pop() {
            Some(Request::SetProperty(r)) => assert_eq!(r.property(), &prop("p", "z")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn same_path_in_other_workspace_does_not_merge() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "one", prop("p", "x"))
            .set_property(loc("/a"), "two", prop("q", "y"));
        assert_eq!(members(b.pop().unwrap()).len(), 2);
    }

    #[test]
    fn other_requests_flush_pending_edits() {
        let mut b = BatchRequestBuilder::new();
        b.set_property(loc("/a"), "ws", prop("p", "x"))
            .delete_branch(loc("/b"), "ws")
            .set_property(loc("/a"), "ws", prop("q", "y"));

        let types: Vec<RequestType> = members(b.pop().unwrap())
            .iter()
            .map(RequestKind::request_type)
            .collect();
        assert_eq!(
            types,
            vec![
                RequestType::SetProperty,
                RequestType::DeleteBranch,
                RequestType::SetProperty
            ]
        );
    }

    #[test]
    fn empty_edit_lists_are_ignored() {
        let mut b = BatchRequestBuilder::new();
        b.remove_properties(loc("/a"), "ws", Vec::new());
        assert!(!b.has_requests());
        assert!(b.pop().is_none());
    }

    // -----------------------------------------------------------------------
    // Sinks
    // -----------------------------------------------------------------------

    struct FailingSink {
        accepted: usize,
        limit: usize,
    }

    impl RequestSink for FailingSink {
        type Error = String;

        fn submit(&mut self, _request: Request) -> Result<(), String> {
            if self.accepted == self.limit {
                return Err(format!("full after {}", self.limit));
            }
            self.accepted += 1;
            Ok(())
        }
    }

    #[test]
    fn sink_failure_is_sticky() {
        let mut b = BatchRequestBuilder::with_sink(FailingSink { accepted: 0, limit: 1 });
        b.get_workspaces().get_workspaces().get_workspaces();
        assert_eq!(b.flush(), Err("full after 1".to_string()));
        assert_eq!(b.sink().accepted, 1);
        assert_eq!(b.flush(), Ok(()));
    }

    #[test]
    fn finish_returns_sink_with_pending_flushed() {
        let mut b = BatchRequestBuilder::with_sink(Vec::new());
        b.set_property(loc("/a"), "ws", prop("p", "x"));
        let requests = b.finish().unwrap();
        assert_eq!(requests.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn adjacent_edits_collapse_into_runs(
            edits in proptest::collection::vec((0usize..3, 0usize..3, any::<bool>()), 1..40),
        ) {
            let paths = ["/a", "/b", "/c"];
            let names = ["p", "q", "r"];

            let mut b = BatchRequestBuilder::new();
            let mut runs: Vec<(usize, BTreeMap<usize, bool>)> = Vec::new();
            for (l, n, remove) in &edits {
                if *remove {
                    b.remove_property(loc(paths[*l]), "ws", name(names[*n]));
                } else {
                    b.set_property(loc(paths[*l]), "ws", prop(names[*n], "v"));
                }
                match runs.last_mut() {
                    Some((last, map)) if *last == *l => {
                        map.insert(*n, *remove);
                    }
                    _ => runs.push((*l, BTreeMap::from([(*n, *remove)]))),
                }
            }

            let requests = members(b.pop().unwrap());
            prop_assert_eq!(requests.len(), runs.len());
            for (request, (_, map)) in requests.iter().zip(&runs) {
                let expected = match (map.len(), map.values().next()) {
                    (1, Some(true)) => RequestType::RemoveProperty,
                    (1, _) => RequestType::SetProperty,
                    _ => RequestType::UpdateProperties,
                };
                prop_assert_eq!(request.request_type(), expected);
                if let Request::UpdateProperties(update) = request {
                    prop_assert_eq!(update.properties().len(), map.len());
                    let removed = update.removed_names().count();
                    prop_assert_eq!(removed, map.values().filter(|r| **r).count());
                }
            }
        }
    }
}
