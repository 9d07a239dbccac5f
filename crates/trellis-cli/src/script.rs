//! JSON request scripts.
//!
//! A script is a JSON array of operations, each tagged by `op` and named after
//! the builder method it calls:
//!
//! ```json
//! [
//!   { "op": "create_node", "under": "/", "name": "docs" },
//!   { "op": "set_property", "on": "/docs", "name": "title", "value": "Docs" },
//!   { "op": "read_branch", "at": "/", "depth": 3 }
//! ]
//! ```
//!
//! Locations are either absolute paths or node UUIDs. A missing `workspace`
//! means the configured default workspace.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path as FsPath;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use trellis_request::{BatchRequestBuilder, RequestSink};
use trellis_types::{
    CloneConflictBehavior, CreateConflictBehavior, Location, LockScope, Name,
    NodeConflictBehavior, Path, Property, Segment, Value,
};
use uuid::Uuid;

/// A property value as written in a script.
///
/// Plain JSON scalars map to strings, longs, doubles and booleans; anything
/// else uses the tagged form, e.g. `{"type": "path", "value": "/a/b"}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Typed(Value),
    Boolean(bool),
    Long(i64),
    Double(f64),
    Text(String),
}

impl From<ScriptValue> for Value {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Typed(value) => value,
            ScriptValue::Boolean(b) => Value::Boolean(b),
            ScriptValue::Long(n) => Value::Long(n),
            ScriptValue::Double(d) => Value::Double(d),
            ScriptValue::Text(s) => Value::String(s),
        }
    }
}

/// One value or a list of them.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptValues {
    Many(Vec<ScriptValue>),
    One(ScriptValue),
}

impl ScriptValues {
    fn into_values(self) -> Vec<Value> {
        match self {
            ScriptValues::Many(values) => values.into_iter().map(Value::from).collect(),
            ScriptValues::One(value) => vec![value.into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    // Reads
    ReadNode {
        at: String,
        workspace: Option<String>,
    },
    ReadAllChildren {
        of: String,
        workspace: Option<String>,
    },
    ReadBlockOfChildren {
        of: String,
        workspace: Option<String>,
        #[serde(default)]
        start: usize,
        count: NonZeroUsize,
    },
    ReadNextBlockOfChildren {
        after: String,
        workspace: Option<String>,
        count: NonZeroUsize,
    },
    ReadAllProperties {
        at: String,
        workspace: Option<String>,
    },
    ReadProperty {
        on: String,
        workspace: Option<String>,
        name: Name,
    },
    ReadBranch {
        at: String,
        workspace: Option<String>,
        depth: NonZeroUsize,
    },
    VerifyNodeExists {
        at: String,
        workspace: Option<String>,
    },
    VerifyWorkspace {
        workspace: Option<String>,
    },
    GetWorkspaces,

    // Searches
    Search {
        expression: String,
        workspace: Option<String>,
        max_results: Option<usize>,
        #[serde(default)]
        offset: usize,
    },
    AccessQuery {
        workspace: Option<String>,
        selector: Name,
        #[serde(default)]
        columns: Vec<Name>,
        #[serde(default)]
        constraints: Vec<String>,
        limit: Option<usize>,
        #[serde(default)]
        offset: usize,
    },

    // Node changes
    CreateNode {
        under: String,
        workspace: Option<String>,
        name: Name,
        #[serde(default)]
        properties: BTreeMap<Name, ScriptValues>,
        #[serde(default)]
        conflict: NodeConflictBehavior,
    },
    SetProperty {
        on: String,
        workspace: Option<String>,
        name: Name,
        value: ScriptValues,
    },
    RemoveProperty {
        from: String,
        workspace: Option<String>,
        name: Name,
    },
    UpdateValues {
        on: String,
        workspace: Option<String>,
        name: Name,
        #[serde(default)]
        added: Vec<ScriptValue>,
        #[serde(default)]
        removed: Vec<ScriptValue>,
    },
    RenameNode {
        at: String,
        workspace: Option<String>,
        name: Name,
    },

    // Branch changes
    MoveBranch {
        from: String,
        workspace: Option<String>,
        into: Option<String>,
        before: Option<String>,
        name: Option<Name>,
        #[serde(default)]
        conflict: NodeConflictBehavior,
    },
    CopyBranch {
        from: String,
        from_workspace: Option<String>,
        into: String,
        into_workspace: Option<String>,
        name: Option<Name>,
        #[serde(default)]
        conflict: NodeConflictBehavior,
    },
    CloneBranch {
        from: String,
        from_workspace: Option<String>,
        into: String,
        into_workspace: Option<String>,
        /// Same-name-sibling slot to replace, e.g. `"page[2]"`.
        segment: Option<String>,
        #[serde(default)]
        remove_existing: bool,
    },
    DeleteBranch {
        at: String,
        workspace: Option<String>,
    },
    DeleteChildren {
        at: String,
        workspace: Option<String>,
    },
    LockBranch {
        at: String,
        workspace: Option<String>,
        #[serde(default)]
        scope: LockScope,
        timeout_ms: Option<u64>,
    },
    UnlockBranch {
        at: String,
        workspace: Option<String>,
    },

    // Workspaces
    CreateWorkspace {
        name: String,
        #[serde(default)]
        conflict: CreateConflictBehavior,
    },
    CloneWorkspace {
        source: String,
        name: String,
        #[serde(default)]
        create_conflict: CreateConflictBehavior,
        #[serde(default)]
        clone_conflict: CloneConflictBehavior,
    },
    DestroyWorkspace {
        name: String,
    },
}

/// Parse a script location: an absolute path or a node UUID.
pub fn locate(raw: &str) -> anyhow::Result<Location> {
    let raw = raw.trim();
    if raw.starts_with('/') {
        return Ok(Location::from_path(Path::parse(raw)?));
    }
    let uuid = Uuid::parse_str(raw)
        .map_err(|_| anyhow!("'{raw}' is neither an absolute path nor a node UUID"))?;
    Ok(Location::from_uuid(uuid))
}

fn segment(raw: &str) -> anyhow::Result<Segment> {
    Path::parse(&format!("/{raw}"))?
        .last_segment()
        .cloned()
        .ok_or_else(|| anyhow!("empty segment"))
}

impl Op {
    /// Add this operation to `builder`.
    pub fn apply<S: RequestSink>(
        self,
        builder: &mut BatchRequestBuilder<S>,
        default_workspace: &str,
    ) -> anyhow::Result<()> {
        let ws = |workspace: Option<String>| workspace.unwrap_or_else(|| default_workspace.to_string());
        match self {
            Op::ReadNode { at, workspace } => {
                builder.read_node(locate(&at)?, ws(workspace));
            }
            Op::ReadAllChildren { of, workspace } => {
                builder.read_all_children(locate(&of)?, ws(workspace));
            }
            Op::ReadBlockOfChildren { of, workspace, start, count } => {
                builder.read_block_of_children(locate(&of)?, ws(workspace), start, count);
            }
            Op::ReadNextBlockOfChildren { after, workspace, count } => {
                builder.read_next_block_of_children(locate(&after)?, ws(workspace), count);
            }
            Op::ReadAllProperties { at, workspace } => {
                builder.read_all_properties(locate(&at)?, ws(workspace));
            }
            Op::ReadProperty { on, workspace, name } => {
                builder.read_property(locate(&on)?, ws(workspace), name);
            }
            Op::ReadBranch { at, workspace, depth } => {
                builder.read_branch(locate(&at)?, ws(workspace), depth);
            }
            Op::VerifyNodeExists { at, workspace } => {
                builder.verify_node_exists(locate(&at)?, ws(workspace));
            }
            Op::VerifyWorkspace { workspace } => {
                builder.verify_workspace(workspace);
            }
            Op::GetWorkspaces => {
                builder.get_workspaces();
            }
            Op::Search { expression, workspace, max_results, offset } => {
                builder.search(expression, ws(workspace), max_results, offset);
            }
            Op::AccessQuery { workspace, selector, columns, constraints, limit, offset } => {
                builder.access_query(ws(workspace), selector, columns, constraints, limit, offset);
            }
            Op::CreateNode { under, workspace, name, properties, conflict } => {
                let properties = properties
                    .into_iter()
                    .map(|(name, values)| Property::new(name, values.into_values()))
                    .collect();
                builder.create_node(locate(&under)?, ws(workspace), name, properties, conflict);
            }
            Op::SetProperty { on, workspace, name, value } => {
                builder.set_property(
                    locate(&on)?,
                    ws(workspace),
                    Property::new(name, value.into_values()),
                );
            }
            Op::RemoveProperty { from, workspace, name } => {
                builder.remove_property(locate(&from)?, ws(workspace), name);
            }
            Op::UpdateValues { on, workspace, name, added, removed } => {
                builder.update_values(
                    locate(&on)?,
                    ws(workspace),
                    name,
                    added.into_iter().map(Value::from).collect(),
                    removed.into_iter().map(Value::from).collect(),
                );
            }
            Op::RenameNode { at, workspace, name } => {
                builder.rename_node(locate(&at)?, ws(workspace), name);
            }
            Op::MoveBranch { from, workspace, into, before, name, conflict } => {
                match (into, before) {
                    (Some(into), None) => {
                        builder.move_branch(locate(&from)?, locate(&into)?, ws(workspace), name, conflict);
                    }
                    (None, Some(before)) => {
                        if name.is_some() {
                            bail!("move_branch: 'name' cannot be combined with 'before'");
                        }
                        builder.move_branch_before(locate(&from)?, locate(&before)?, ws(workspace), conflict);
                    }
                    _ => bail!("move_branch needs exactly one of 'into' or 'before'"),
                }
            }
            Op::CopyBranch { from, from_workspace, into, into_workspace, name, conflict } => {
                builder.copy_branch(
                    locate(&from)?,
                    ws(from_workspace),
                    locate(&into)?,
                    ws(into_workspace),
                    name,
                    conflict,
                );
            }
            Op::CloneBranch { from, from_workspace, into, into_workspace, segment: slot, remove_existing } => {
                let slot = slot.as_deref().map(segment).transpose()?;
                builder.clone_branch(
                    locate(&from)?,
                    ws(from_workspace),
                    locate(&into)?,
                    ws(into_workspace),
                    slot,
                    remove_existing,
                );
            }
            Op::DeleteBranch { at, workspace } => {
                builder.delete_branch(locate(&at)?, ws(workspace));
            }
            Op::DeleteChildren { at, workspace } => {
                builder.delete_children(locate(&at)?, ws(workspace));
            }
            Op::LockBranch { at, workspace, scope, timeout_ms } => {
                builder.lock_branch(locate(&at)?, ws(workspace), scope, timeout_ms);
            }
            Op::UnlockBranch { at, workspace } => {
                builder.unlock_branch(locate(&at)?, ws(workspace));
            }
            Op::CreateWorkspace { name, conflict } => {
                builder.create_workspace(name, conflict);
            }
            Op::CloneWorkspace { source, name, create_conflict, clone_conflict } => {
                builder.clone_workspace(source, name, create_conflict, clone_conflict);
            }
            Op::DestroyWorkspace { name } => {
                builder.destroy_workspace(name);
            }
        }
        Ok(())
    }
}

/// An ordered list of operations.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub ops: Vec<Op>,
}

impl Script {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &FsPath) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid script {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Add every operation to `builder`, stopping at the first bad one.
    pub fn apply<S: RequestSink>(
        self,
        builder: &mut BatchRequestBuilder<S>,
        default_workspace: &str,
    ) -> anyhow::Result<()> {
        for (index, op) in self.ops.into_iter().enumerate() {
            op.apply(builder, default_workspace)
                .with_context(|| format!("operation {index}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_request::{Request, RequestKind, RequestType};

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn build(text: &str) -> Request {
        let mut builder = BatchRequestBuilder::new();
        Script::parse(text).unwrap().apply(&mut builder, "default").unwrap();
        builder.pop().unwrap()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parses_tagged_operations() {
        let script = Script::parse(
            r#"[
                {"op": "create_node", "under": "/", "name": "docs", "conflict": "replace"},
                {"op": "get_workspaces"},
                {"op": "read_branch", "at": "/docs", "workspace": "other", "depth": 2}
            ]"#,
        )
        .unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(
            script.ops[0],
            Op::CreateNode {
                under: "/".into(),
                workspace: None,
                name: name("docs"),
                properties: BTreeMap::new(),
                conflict: NodeConflictBehavior::Replace,
            }
        );
        assert_eq!(script.ops[1], Op::GetWorkspaces);
    }

    #[test]
    fn scalar_values_are_coerced() {
        let values: ScriptValues = serde_json::from_str(r#"["a", 3, 1.5, true]"#).unwrap();
        assert_eq!(
            values.into_values(),
            vec![
                Value::String("a".into()),
                Value::Long(3),
                Value::Double(1.5),
                Value::Boolean(true),
            ]
        );
        let typed: ScriptValues = serde_json::from_str(r#"{"type": "path", "value": "/a"}"#).unwrap();
        assert_eq!(typed.into_values(), vec![Value::Path(Path::parse("/a").unwrap())]);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert!(Script::parse(r#"[{"op": "teleport", "at": "/"}]"#).is_err());
        assert!(Script::parse(r#"[{"op": "read_branch", "at": "/", "depth": 0}]"#).is_err());
    }

    #[test]
    fn load_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.json");
        std::fs::write(&path, "not json").unwrap();
        let err = Script::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid script"));
    }

    // =========================================================================
    // Locations
    // =========================================================================

    #[test]
    fn locations_are_paths_or_uuids() {
        let by_path = locate("/a/b[2]").unwrap();
        assert_eq!(by_path.path().unwrap().to_string(), "/a/b[2]");

        let id = Uuid::new_v4();
        assert_eq!(locate(&id.to_string()).unwrap().uuid(), Some(id));

        assert!(locate("relative/path").is_err());
    }

    #[test]
    fn segments_keep_their_index() {
        let slot = segment("page[3]").unwrap();
        assert_eq!(slot.name().as_str(), "page");
        assert_eq!(slot.index(), 3);
    }

    // =========================================================================
    // Building
    // =========================================================================

    #[test]
    fn default_workspace_fills_gaps() {
        let request = build(r#"[{"op": "read_node", "at": "/"}]"#);
        let Request::ReadNode(read) = request else { panic!("unexpected {request:?}") };
        assert_eq!(read.in_workspace(), "default");
    }

    #[test]
    fn adjacent_property_edits_merge() {
        let request = build(
            r#"[
                {"op": "set_property", "on": "/a", "name": "x", "value": 1},
                {"op": "remove_property", "from": "/a", "name": "y"},
                {"op": "delete_branch", "at": "/b"}
            ]"#,
        );
        let composite = request.as_composite().unwrap();
        let types: Vec<RequestType> = composite.iter().map(RequestKind::request_type).collect();
        assert_eq!(types, vec![RequestType::UpdateProperties, RequestType::DeleteBranch]);
    }

    #[test]
    fn move_needs_one_target() {
        let script = Script::parse(r#"[{"op": "move_branch", "from": "/a"}]"#).unwrap();
        let mut builder = BatchRequestBuilder::new();
        let err = script.apply(&mut builder, "default").unwrap_err();
        assert!(format!("{err:#}").contains("exactly one of"));
    }
}
