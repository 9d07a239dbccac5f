use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use trellis_types::{
    CloneConflictBehavior, CreateConflictBehavior, Location, Name, NodeConflictBehavior, Segment,
};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::graph::Workspace;

/// Result of copying or cloning a branch.
#[derive(Clone, Debug, PartialEq)]
pub struct Transferred {
    /// The source branch root.
    pub from: Location,
    /// The new (or kept) branch root in the target workspace.
    pub into: Location,
    /// Nodes removed from the target because their ids were cloned in.
    pub removed: Vec<Location>,
}

/// An in-memory graph of named workspaces.
///
/// Intended for tests and embedding. Workspaces live behind one `RwLock`;
/// reads share it and every change takes it exclusively, so each request is
/// applied atomically with respect to other requests.
pub struct InMemoryRepository {
    config: MemoryConfig,
    workspaces: RwLock<BTreeMap<String, Workspace>>,
}

impl InMemoryRepository {
    /// A repository holding the default and predefined workspaces, all empty.
    pub fn new(config: MemoryConfig) -> Self {
        let mut workspaces = BTreeMap::new();
        for name in std::iter::once(&config.default_workspace).chain(&config.predefined_workspaces) {
            workspaces
                .entry(name.clone())
                .or_insert_with(|| Workspace::new(name.clone()));
        }
        info!(
            source = %config.source_name,
            workspaces = workspaces.len(),
            "in-memory repository created"
        );
        Self {
            config,
            workspaces: RwLock::new(workspaces),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        &self.config.source_name
    }

    fn shared(&self) -> RwLockReadGuard<'_, BTreeMap<String, Workspace>> {
        self.workspaces.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> MemoryResult<RwLockWriteGuard<'_, BTreeMap<String, Workspace>>> {
        if !self.config.updates_allowed {
            return Err(MemoryError::ReadOnly);
        }
        Ok(self.workspaces.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn workspace_names(&self) -> Vec<String> {
        self.shared().keys().cloned().collect()
    }

    pub fn has_workspace(&self, name: &str) -> bool {
        self.shared().contains_key(name)
    }

    /// Run `f` against a workspace without changing it.
    pub fn read<T>(
        &self,
        workspace: &str,
        f: impl FnOnce(&Workspace) -> MemoryResult<T>,
    ) -> MemoryResult<T> {
        let workspaces = self.shared();
        let ws = workspaces
            .get(workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(workspace.to_string()))?;
        f(ws)
    }

    /// Run `f` against a workspace it may change.
    ///
    /// Fails with [`MemoryError::ReadOnly`] when updates are disabled.
    pub fn write<T>(
        &self,
        workspace: &str,
        f: impl FnOnce(&mut Workspace) -> MemoryResult<T>,
    ) -> MemoryResult<T> {
        let mut workspaces = self.exclusive()?;
        let ws = workspaces
            .get_mut(workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(workspace.to_string()))?;
        f(ws)
    }

    // -----------------------------------------------------------------------
    // Workspaces
    // -----------------------------------------------------------------------

    /// Name and root location of a workspace; the default one when `None`.
    pub fn verify_workspace(&self, name: Option<&str>) -> MemoryResult<(String, Location)> {
        let name = name.unwrap_or(&self.config.default_workspace);
        self.read(name, |ws| Ok((ws.name().to_string(), ws.root_location())))
    }

    fn available_name(
        workspaces: &BTreeMap<String, Workspace>,
        desired: &str,
        conflict: CreateConflictBehavior,
    ) -> MemoryResult<String> {
        if !workspaces.contains_key(desired) {
            return Ok(desired.to_string());
        }
        match conflict {
            CreateConflictBehavior::DoNotCreate => {
                Err(MemoryError::WorkspaceExists(desired.to_string()))
            }
            CreateConflictBehavior::CreateWithAdjustedName => Ok((2..)
                .map(|n| format!("{desired}-{n}"))
                .find(|candidate| !workspaces.contains_key(candidate))
                .unwrap_or_else(|| format!("{desired}-{}", Uuid::new_v4()))),
        }
    }

    pub fn create_workspace(
        &self,
        desired: &str,
        conflict: CreateConflictBehavior,
    ) -> MemoryResult<(String, Location)> {
        let mut workspaces = self.exclusive()?;
        let name = Self::available_name(&workspaces, desired, conflict)?;
        let ws = Workspace::new(name.clone());
        let root = ws.root_location();
        workspaces.insert(name.clone(), ws);
        debug!(workspace = %name, "workspace created");
        Ok((name, root))
    }

    /// Copy a whole workspace, node ids included.
    ///
    /// A missing source fails unless `clone_conflict` allows creating an
    /// empty workspace instead.
    pub fn clone_workspace(
        &self,
        source: &str,
        desired: &str,
        create_conflict: CreateConflictBehavior,
        clone_conflict: CloneConflictBehavior,
    ) -> MemoryResult<(String, Location)> {
        let mut workspaces = self.exclusive()?;
        let name = Self::available_name(&workspaces, desired, create_conflict)?;
        let ws = match (workspaces.get(source), clone_conflict) {
            (Some(original), _) => original.renamed(name.clone()),
            (None, CloneConflictBehavior::SkipRoot) => Workspace::new(name.clone()),
            (None, CloneConflictBehavior::DoNotClone) => {
                return Err(MemoryError::NoSuchWorkspace(source.to_string()))
            }
        };
        let root = ws.root_location();
        workspaces.insert(name.clone(), ws);
        debug!(source, workspace = %name, "workspace cloned");
        Ok((name, root))
    }

    pub fn destroy_workspace(&self, name: &str) -> MemoryResult<Location> {
        let removed = self
            .exclusive()?
            .remove(name)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(name.to_string()))?;
        debug!(workspace = name, nodes = removed.len(), "workspace destroyed");
        Ok(removed.root_location())
    }

    // -----------------------------------------------------------------------
    // Branch transfer
    // -----------------------------------------------------------------------

    /// Copy a branch (fresh node ids) under `into`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_branch(
        &self,
        from_workspace: &str,
        from: &Location,
        into_workspace: &str,
        into: &Location,
        desired_name: Option<&Name>,
        conflict: NodeConflictBehavior,
    ) -> MemoryResult<Transferred> {
        let mut workspaces = self.exclusive()?;
        let source = workspaces
            .get(from_workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(from_workspace.to_string()))?;
        let source_id = source.resolve(from)?;
        let branch = source.snapshot(source_id)?;
        let from_location = source.location_of(source_id)?;
        let name = match desired_name.or(branch.name.as_ref()) {
            Some(name) => name.clone(),
            None => return Err(MemoryError::invalid("the root node cannot be copied")),
        };

        let target = workspaces
            .get_mut(into_workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(into_workspace.to_string()))?;
        let parent = target.resolve(into)?;
        let copied = match target.place_copy(parent, &name, conflict)? {
            Ok(index) => target.graft(parent, index, &branch, name, false)?,
            Err(existing) => {
                if conflict == NodeConflictBehavior::Update {
                    target.merge_properties(existing, &branch.properties)?;
                }
                existing
            }
        };
        Ok(Transferred {
            from: from_location,
            into: target.location_of(copied)?,
            removed: Vec::new(),
        })
    }

    /// Clone a branch into another workspace, keeping node ids.
    ///
    /// With a desired segment the node at that segment under `into` is
    /// replaced; otherwise the clone is appended under `desired_name` (or its
    /// own name). Nodes elsewhere in the target sharing an id with the clone
    /// are removed when `remove_existing` is set, and cause a conflict
    /// otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn clone_branch(
        &self,
        from_workspace: &str,
        from: &Location,
        into_workspace: &str,
        into: &Location,
        desired_name: Option<&Name>,
        desired_segment: Option<&Segment>,
        remove_existing: bool,
    ) -> MemoryResult<Transferred> {
        if from_workspace == into_workspace {
            return Err(MemoryError::invalid(
                "a branch can only be cloned into a different workspace",
            ));
        }
        let mut workspaces = self.exclusive()?;
        let source = workspaces
            .get(from_workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(from_workspace.to_string()))?;
        let source_id = source.resolve(from)?;
        let branch = source.snapshot(source_id)?;
        let from_location = source.location_of(source_id)?;

        let target = workspaces
            .get_mut(into_workspace)
            .ok_or_else(|| MemoryError::NoSuchWorkspace(into_workspace.to_string()))?;
        let parent = target.resolve(into)?;

        let (name, mut index) = match desired_segment {
            Some(segment) => {
                let at = Location::from_path(target.path_of(parent)?.child_segment(segment.clone()));
                let replaced = target.resolve(&at)?;
                (segment.name().clone(), Some(target.replace_slot(replaced)?))
            }
            None => match desired_name.or(branch.name.as_ref()) {
                Some(name) => (name.clone(), None),
                None => return Err(MemoryError::invalid("the root node cannot be cloned")),
            },
        };

        let mut removed = Vec::new();
        for id in branch.ids() {
            if !target.contains(id) {
                continue;
            }
            if !remove_existing {
                return Err(MemoryError::Conflict(format!(
                    "node {id} already exists in workspace '{into_workspace}'"
                )));
            }
            if target.descendants(id)?.contains(&parent) {
                return Err(MemoryError::Conflict(format!(
                    "node {id} contains the clone's parent in workspace '{into_workspace}'"
                )));
            }
            let location = target.location_of(id)?;
            let was_sibling = target.parent_of(id)? == Some(parent);
            let slot = target.replace_slot(id)?;
            if let (true, Some(i)) = (was_sibling, index) {
                if slot < i {
                    index = Some(i - 1);
                }
            }
            removed.push(location);
        }

        let cloned = target.graft(parent, index, &branch, name, true)?;
        Ok(Transferred {
            from: from_location,
            into: target.location_of(cloned)?,
            removed,
        })
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("source_name", &self.config.source_name)
            .field("workspaces", &self.workspace_names())
            .finish()
    }
}
