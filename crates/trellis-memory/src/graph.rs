//! One workspace's node tree.
//!
//! Nodes are keyed by UUID and hold an ordered list of child ids. Paths are
//! never stored: a node's segment is derived from its name and its position
//! among same-named siblings, so reordering or removing a sibling renumbers
//! the others.

use std::collections::{BTreeMap, HashMap};

use trellis_types::{
    Location, LockScope, Name, NodeConflictBehavior, Path, Property, Segment, Value,
};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};

#[derive(Clone, Debug)]
struct Node {
    /// `None` only for the root.
    name: Option<Name>,
    parent: Option<Uuid>,
    children: Vec<Uuid>,
    properties: BTreeMap<Name, Property>,
    lock: Option<LockScope>,
}

impl Node {
    fn new(name: Option<Name>, parent: Option<Uuid>, properties: BTreeMap<Name, Property>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            properties,
            lock: None,
        }
    }
}

/// A detached copy of a subtree, used to copy or clone across workspaces.
#[derive(Clone, Debug)]
pub struct Branch {
    pub id: Uuid,
    pub name: Option<Name>,
    pub properties: BTreeMap<Name, Property>,
    pub children: Vec<Branch>,
}

impl Branch {
    /// Every id in the branch, root first.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.id];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Where a new child goes once a name conflict has been resolved.
enum Placement {
    /// Keep this existing child instead of adding one.
    Existing(Uuid),
    /// Insert at this index, or append when `None`.
    Insert(Option<usize>),
}

fn by_name(properties: Vec<Property>) -> BTreeMap<Name, Property> {
    properties
        .into_iter()
        .map(|p| (p.name().clone(), p))
        .collect()
}

/// A named tree of nodes rooted at a node without a name.
#[derive(Clone, Debug)]
pub struct Workspace {
    name: String,
    root: Uuid,
    nodes: HashMap<Uuid, Node>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        let root = Uuid::new_v4();
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(None, None, BTreeMap::new()));
        Self {
            name: name.into(),
            root,
            nodes,
        }
    }

    /// A copy of this workspace under another name, keeping node ids.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_id(&self) -> Uuid {
        self.root
    }

    pub fn root_location(&self) -> Location {
        Location::root().with_uuid(self.root)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node(&self, id: Uuid) -> MemoryResult<&Node> {
        self.nodes.get(&id).ok_or(MemoryError::MissingNode(id))
    }

    fn node_mut(&mut self, id: Uuid) -> MemoryResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(MemoryError::MissingNode(id))
    }

    // -----------------------------------------------------------------------
    // Addressing
    // -----------------------------------------------------------------------

    /// The segment naming `id` under its parent; `None` for the root.
    pub fn segment_of(&self, id: Uuid) -> MemoryResult<Option<Segment>> {
        let node = self.node(id)?;
        let (Some(name), Some(parent)) = (&node.name, node.parent) else {
            return Ok(None);
        };
        let mut index = 0u32;
        for &sibling in &self.node(parent)?.children {
            if self.node(sibling)?.name.as_ref() == Some(name) {
                index += 1;
            }
            if sibling == id {
                break;
            }
        }
        Ok(Some(Segment::with_index(name.clone(), index)?))
    }

    pub fn path_of(&self, id: Uuid) -> MemoryResult<Path> {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(segment) = self.segment_of(current)? {
            segments.push(segment);
            current = self
                .node(current)?
                .parent
                .ok_or(MemoryError::MissingNode(current))?;
        }
        segments.reverse();
        Ok(Path::from_segments(segments))
    }

    /// Path plus UUID: the form reported back as an actual location.
    pub fn location_of(&self, id: Uuid) -> MemoryResult<Location> {
        Ok(Location::from_path(self.path_of(id)?).with_uuid(id))
    }

    fn child_at(&self, parent: Uuid, segment: &Segment) -> MemoryResult<Option<Uuid>> {
        let mut seen = 0u32;
        for &child in &self.node(parent)?.children {
            if self.node(child)?.name.as_ref() == Some(segment.name()) {
                seen += 1;
                if seen == segment.index() {
                    return Ok(Some(child));
                }
            }
        }
        Ok(None)
    }

    fn first_child_named(&self, parent: Uuid, name: &Name) -> MemoryResult<Option<Uuid>> {
        for &child in &self.node(parent)?.children {
            if self.node(child)?.name.as_ref() == Some(name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn not_found(&self, location: &Location, lowest_existing: Option<Path>) -> MemoryError {
        MemoryError::PathNotFound {
            location: location.clone(),
            workspace: self.name.clone(),
            lowest_existing,
        }
    }

    /// Find the node a location names. Paths take precedence over ids.
    pub fn resolve(&self, location: &Location) -> MemoryResult<Uuid> {
        if let Some(path) = location.path() {
            let mut current = self.root;
            let mut walked = Path::root();
            for segment in path.segments() {
                match self.child_at(current, segment)? {
                    Some(child) => {
                        current = child;
                        walked = walked.child_segment(segment.clone());
                    }
                    None => return Err(self.not_found(location, Some(walked))),
                }
            }
            return Ok(current);
        }
        match location.uuid() {
            Some(id) if self.nodes.contains_key(&id) => Ok(id),
            Some(_) => Err(self.not_found(location, None)),
            None => Err(MemoryError::invalid(format!(
                "location {location} has neither a path nor a UUID"
            ))),
        }
    }

    pub fn parent_of(&self, id: Uuid) -> MemoryResult<Option<Uuid>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: Uuid) -> MemoryResult<&[Uuid]> {
        Ok(&self.node(id)?.children)
    }

    pub fn child_locations(&self, id: Uuid) -> MemoryResult<Vec<Location>> {
        self.node(id)?
            .children
            .iter()
            .map(|&child| self.location_of(child))
            .collect()
    }

    pub fn properties(&self, id: Uuid) -> MemoryResult<&BTreeMap<Name, Property>> {
        Ok(&self.node(id)?.properties)
    }

    /// `id` and everything below it, in pre-order.
    pub fn descendants(&self, id: Uuid) -> MemoryResult<Vec<Uuid>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next)?.children.iter().rev());
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------------

    fn locked(&self, id: Uuid) -> MemoryResult<MemoryError> {
        Ok(MemoryError::Locked {
            location: self.location_of(id)?,
            workspace: self.name.clone(),
        })
    }

    /// Fail if `id` is locked, directly or through a deep lock on an ancestor.
    pub fn ensure_unlocked(&self, id: Uuid) -> MemoryResult<()> {
        if self.node(id)?.lock.is_some() {
            return Err(self.locked(id)?);
        }
        let mut current = self.node(id)?.parent;
        while let Some(ancestor) = current {
            let node = self.node(ancestor)?;
            if node.lock == Some(LockScope::SelfAndDescendants) {
                return Err(self.locked(ancestor)?);
            }
            current = node.parent;
        }
        Ok(())
    }

    /// Like [`ensure_unlocked`](Self::ensure_unlocked), also checking every
    /// descendant.
    pub fn ensure_branch_unlocked(&self, id: Uuid) -> MemoryResult<()> {
        self.ensure_unlocked(id)?;
        for node in self.descendants(id)? {
            if self.node(node)?.lock.is_some() {
                return Err(self.locked(node)?);
            }
        }
        Ok(())
    }

    pub fn lock(&mut self, id: Uuid, scope: LockScope) -> MemoryResult<()> {
        match scope {
            LockScope::SelfOnly => self.ensure_unlocked(id)?,
            LockScope::SelfAndDescendants => self.ensure_branch_unlocked(id)?,
        }
        self.node_mut(id)?.lock = Some(scope);
        Ok(())
    }

    /// Returns `false` if the node was not locked.
    pub fn unlock(&mut self, id: Uuid) -> MemoryResult<bool> {
        Ok(self.node_mut(id)?.lock.take().is_some())
    }

    // -----------------------------------------------------------------------
    // Structure changes
    // -----------------------------------------------------------------------

    fn place(
        &mut self,
        parent: Uuid,
        name: &Name,
        conflict: NodeConflictBehavior,
        ignoring: Option<Uuid>,
    ) -> MemoryResult<Placement> {
        let existing = self
            .first_child_named(parent, name)?
            .filter(|&id| Some(id) != ignoring);
        match (existing, conflict) {
            (None, _) | (_, NodeConflictBehavior::Append) => Ok(Placement::Insert(None)),
            (Some(id), NodeConflictBehavior::Replace) => {
                Ok(Placement::Insert(Some(self.replace_slot(id)?)))
            }
            (Some(id), NodeConflictBehavior::Update | NodeConflictBehavior::DoNotReplace) => {
                Ok(Placement::Existing(id))
            }
        }
    }

    fn index_in_parent(&self, id: Uuid) -> MemoryResult<usize> {
        let parent = self.node(id)?.parent.ok_or(MemoryError::MissingNode(id))?;
        self.node(parent)?
            .children
            .iter()
            .position(|&c| c == id)
            .ok_or(MemoryError::MissingNode(id))
    }

    fn attach(&mut self, parent: Uuid, index: Option<usize>, id: Uuid) -> MemoryResult<()> {
        let children = &mut self.node_mut(parent)?.children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, id),
            _ => children.push(id),
        }
        Ok(())
    }

    fn detach(&mut self, id: Uuid) -> MemoryResult<usize> {
        let index = self.index_in_parent(id)?;
        let parent = self.node(id)?.parent.ok_or(MemoryError::MissingNode(id))?;
        self.node_mut(parent)?.children.remove(index);
        Ok(index)
    }

    /// Create a child of `parent`, resolving a clash on `name` per `conflict`.
    ///
    /// Returns the id of the new node, or of the existing node that was kept.
    pub fn create(
        &mut self,
        parent: Uuid,
        name: Name,
        properties: Vec<Property>,
        conflict: NodeConflictBehavior,
    ) -> MemoryResult<Uuid> {
        self.ensure_unlocked(parent)?;
        match self.place(parent, &name, conflict, None)? {
            Placement::Existing(id) => {
                if conflict == NodeConflictBehavior::Update {
                    self.ensure_unlocked(id)?;
                    self.node_mut(id)?.properties.extend(by_name(properties));
                }
                Ok(id)
            }
            Placement::Insert(index) => {
                let id = Uuid::new_v4();
                self.nodes
                    .insert(id, Node::new(Some(name), Some(parent), by_name(properties)));
                self.attach(parent, index, id)?;
                Ok(id)
            }
        }
    }

    /// Remove `id` and its subtree. The root cannot be removed.
    pub fn remove_branch(&mut self, id: Uuid) -> MemoryResult<()> {
        if id == self.root {
            return Err(MemoryError::invalid("the root node cannot be removed"));
        }
        let doomed = self.descendants(id)?;
        self.detach(id)?;
        for node in doomed {
            self.nodes.remove(&node);
        }
        Ok(())
    }

    pub fn rename(&mut self, id: Uuid, name: Name) -> MemoryResult<()> {
        if id == self.root {
            return Err(MemoryError::invalid("the root node cannot be renamed"));
        }
        self.ensure_unlocked(id)?;
        self.node_mut(id)?.name = Some(name);
        Ok(())
    }

    /// Move `id` under `parent`, before `before` when given, else last.
    ///
    /// A clash on the name under the new parent is resolved per `conflict`;
    /// keeping the existing node is reported as a conflict since the move
    /// cannot happen.
    pub fn move_node(
        &mut self,
        id: Uuid,
        parent: Uuid,
        before: Option<Uuid>,
        name: Option<Name>,
        conflict: NodeConflictBehavior,
    ) -> MemoryResult<()> {
        if id == self.root {
            return Err(MemoryError::invalid("the root node cannot be moved"));
        }
        if self.descendants(id)?.contains(&parent) {
            return Err(MemoryError::invalid(format!(
                "cannot move {} below itself",
                self.path_of(id)?
            )));
        }
        self.ensure_branch_unlocked(id)?;
        self.ensure_unlocked(parent)?;

        let name = match name {
            Some(name) => name,
            None => self
                .node(id)?
                .name
                .clone()
                .ok_or(MemoryError::MissingNode(id))?,
        };
        if let Placement::Existing(existing) = self.place(parent, &name, conflict, Some(id))? {
            return Err(MemoryError::Conflict(format!(
                "{} already exists",
                self.path_of(existing)?
            )));
        }
        let original = self.detach(id)?;
        let index = match before {
            Some(sibling) if sibling == id => Some(original),
            Some(sibling) => Some(self.index_in_parent(sibling)?),
            None => None,
        };
        self.attach(parent, index, id)?;
        let node = self.node_mut(id)?;
        node.parent = Some(parent);
        node.name = Some(name);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// Returns `true` if the property did not exist before.
    pub fn set_property(&mut self, id: Uuid, property: Property) -> MemoryResult<bool> {
        self.ensure_unlocked(id)?;
        let properties = &mut self.node_mut(id)?.properties;
        Ok(properties
            .insert(property.name().clone(), property)
            .is_none())
    }

    /// Returns `true` if the property existed.
    pub fn remove_property(&mut self, id: Uuid, name: &Name) -> MemoryResult<bool> {
        self.ensure_unlocked(id)?;
        Ok(self.node_mut(id)?.properties.remove(name).is_some())
    }

    /// Add and remove individual values of a multi-valued property.
    ///
    /// Values already present are not added again; values absent are not
    /// removed. Returns the values actually added and removed. A property
    /// left without values is removed.
    pub fn update_values(
        &mut self,
        id: Uuid,
        name: &Name,
        added: &[Value],
        removed: &[Value],
    ) -> MemoryResult<(Vec<Value>, Vec<Value>)> {
        self.ensure_unlocked(id)?;
        let properties = &mut self.node_mut(id)?.properties;
        let mut values = properties
            .remove(name)
            .map(Property::into_values)
            .unwrap_or_default();

        let mut actually_removed = Vec::new();
        for value in removed {
            if let Some(pos) = values.iter().position(|v| v == value) {
                actually_removed.push(values.remove(pos));
            }
        }
        let mut actually_added = Vec::new();
        for value in added {
            if !values.contains(value) {
                values.push(value.clone());
                actually_added.push(value.clone());
            }
        }
        if !values.is_empty() {
            properties.insert(name.clone(), Property::new(name.clone(), values));
        }
        Ok((actually_added, actually_removed))
    }

    // -----------------------------------------------------------------------
    // Branch transfer
    // -----------------------------------------------------------------------

    pub fn snapshot(&self, id: Uuid) -> MemoryResult<Branch> {
        let node = self.node(id)?;
        let children = node
            .children
            .iter()
            .map(|&child| self.snapshot(child))
            .collect::<MemoryResult<Vec<_>>>()?;
        Ok(Branch {
            id,
            name: node.name.clone(),
            properties: node.properties.clone(),
            children,
        })
    }

    /// Insert a copy of `branch` under `parent`, named `name`.
    ///
    /// With `keep_ids` the copy reuses the branch's ids, which must not be
    /// present in this workspace; otherwise every node gets a fresh id.
    pub fn graft(
        &mut self,
        parent: Uuid,
        index: Option<usize>,
        branch: &Branch,
        name: Name,
        keep_ids: bool,
    ) -> MemoryResult<Uuid> {
        if keep_ids {
            if let Some(&clash) = branch.ids().iter().find(|id| self.nodes.contains_key(id)) {
                return Err(MemoryError::Conflict(format!(
                    "node {clash} already exists in workspace '{}'",
                    self.name
                )));
            }
        }
        let id = self.graft_node(parent, branch, Some(name), keep_ids)?;
        self.attach(parent, index, id)?;
        Ok(id)
    }

    fn graft_node(
        &mut self,
        parent: Uuid,
        branch: &Branch,
        name: Option<Name>,
        keep_ids: bool,
    ) -> MemoryResult<Uuid> {
        let id = if keep_ids { branch.id } else { Uuid::new_v4() };
        let mut node = Node::new(name, Some(parent), branch.properties.clone());
        for child in &branch.children {
            node.children
                .push(self.graft_node(id, child, child.name.clone(), keep_ids)?);
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Resolve a name clash for a copy; see [`create`](Self::create).
    pub fn place_copy(
        &mut self,
        parent: Uuid,
        name: &Name,
        conflict: NodeConflictBehavior,
    ) -> MemoryResult<Result<Option<usize>, Uuid>> {
        self.ensure_unlocked(parent)?;
        Ok(match self.place(parent, name, conflict, None)? {
            Placement::Insert(index) => Ok(index),
            Placement::Existing(id) => Err(id),
        })
    }

    /// Merge properties into an existing node, as for an `Update` conflict.
    pub fn merge_properties(
        &mut self,
        id: Uuid,
        properties: &BTreeMap<Name, Property>,
    ) -> MemoryResult<()> {
        self.ensure_unlocked(id)?;
        self.node_mut(id)?
            .properties
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// Remove `id` to make room for a replacement, returning its index.
    pub fn replace_slot(&mut self, id: Uuid) -> MemoryResult<usize> {
        self.ensure_branch_unlocked(id)?;
        let index = self.index_in_parent(id)?;
        self.remove_branch(id)?;
        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Nodes with textual values containing `needle` (case-insensitive),
    /// scored by the number of matching values.
    pub fn search(&self, needle: &str) -> MemoryResult<Vec<(Path, i64)>> {
        let needle = needle.to_lowercase();
        let mut hits = Vec::new();
        for id in self.descendants(self.root)? {
            let score = self
                .node(id)?
                .properties
                .values()
                .flat_map(Property::values)
                .filter_map(Value::as_text)
                .filter(|text| text.to_lowercase().contains(&needle))
                .count();
            if score > 0 {
                hits.push((self.path_of(id)?, i64::try_from(score).unwrap_or(i64::MAX)));
            }
        }
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(hits)
    }
}
