//! Conflict and lock behaviours selected by callers of mutating requests.

use serde::{Deserialize, Serialize};

/// What to do when a node is created, moved or copied onto a name that is
/// already taken under the target parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeConflictBehavior {
    /// Add the node as another same-name sibling.
    #[default]
    Append,
    /// Replace the existing node.
    Replace,
    /// Keep the existing node and merge the new properties into it.
    Update,
    /// Keep the existing node untouched.
    DoNotReplace,
}

/// What to do when creating a workspace whose name is already taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateConflictBehavior {
    /// Fail the request.
    #[default]
    DoNotCreate,
    /// Create the workspace under an adjusted, unused name.
    CreateWithAdjustedName,
}

/// What to do when the source workspace of a clone does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneConflictBehavior {
    /// Fail the request.
    #[default]
    DoNotClone,
    /// Create an empty workspace instead of cloning.
    SkipRoot,
}

/// Extent of a branch lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// Lock only the addressed node.
    #[default]
    SelfOnly,
    /// Lock the addressed node and everything below it.
    SelfAndDescendants,
}
