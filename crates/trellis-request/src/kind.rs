//! The stable discriminant for every request kind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant identifying the kind of a request.
///
/// The numeric values are part of the public contract: they may be used as
/// compact tags by anything that records or transmits requests. Existing
/// values must never be renumbered or reused. New kinds get new numbers at
/// the end. Value 12 is retired (it was the end-of-stream marker of an
/// earlier channel design).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum RequestType {
    AccessQuery = 0,
    CloneBranch = 1,
    CloneWorkspace = 2,
    Composite = 3,
    CopyBranch = 4,
    CreateNode = 5,
    CreateWorkspace = 6,
    DeleteBranch = 7,
    DeleteChildren = 8,
    DestroyWorkspace = 9,
    FullTextSearch = 10,
    GetWorkspaces = 11,
    LockBranch = 13,
    MoveBranch = 14,
    ReadAllChildren = 15,
    ReadAllProperties = 16,
    ReadBlockOfChildren = 17,
    ReadBranch = 18,
    ReadNextBlockOfChildren = 19,
    ReadNode = 20,
    ReadProperty = 21,
    RemoveProperty = 22,
    RenameNode = 23,
    SetProperty = 24,
    UnlockBranch = 25,
    UpdateProperties = 26,
    UpdateValues = 27,
    VerifyNode = 28,
    VerifyWorkspace = 29,
}

impl RequestType {
    /// Every request type, in ordinal order.
    pub const ALL: [RequestType; 29] = [
        RequestType::AccessQuery,
        RequestType::CloneBranch,
        RequestType::CloneWorkspace,
        RequestType::Composite,
        RequestType::CopyBranch,
        RequestType::CreateNode,
        RequestType::CreateWorkspace,
        RequestType::DeleteBranch,
        RequestType::DeleteChildren,
        RequestType::DestroyWorkspace,
        RequestType::FullTextSearch,
        RequestType::GetWorkspaces,
        RequestType::LockBranch,
        RequestType::MoveBranch,
        RequestType::ReadAllChildren,
        RequestType::ReadAllProperties,
        RequestType::ReadBlockOfChildren,
        RequestType::ReadBranch,
        RequestType::ReadNextBlockOfChildren,
        RequestType::ReadNode,
        RequestType::ReadProperty,
        RequestType::RemoveProperty,
        RequestType::RenameNode,
        RequestType::SetProperty,
        RequestType::UnlockBranch,
        RequestType::UpdateProperties,
        RequestType::UpdateValues,
        RequestType::VerifyNode,
        RequestType::VerifyWorkspace,
    ];

    /// The pinned numeric value of this type.
    pub fn ordinal(self) -> u16 {
        self as u16
    }

    /// Look up a type by its pinned numeric value.
    pub fn from_ordinal(ordinal: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.ordinal() == ordinal)
    }

    /// Human-readable name (e.g. "read node").
    pub fn label(self) -> &'static str {
        match self {
            RequestType::AccessQuery => "access query",
            RequestType::CloneBranch => "clone branch",
            RequestType::CloneWorkspace => "clone workspace",
            RequestType::Composite => "composite",
            RequestType::CopyBranch => "copy branch",
            RequestType::CreateNode => "create node",
            RequestType::CreateWorkspace => "create workspace",
            RequestType::DeleteBranch => "delete branch",
            RequestType::DeleteChildren => "delete children",
            RequestType::DestroyWorkspace => "destroy workspace",
            RequestType::FullTextSearch => "full-text search",
            RequestType::GetWorkspaces => "get workspaces",
            RequestType::LockBranch => "lock branch",
            RequestType::MoveBranch => "move branch",
            RequestType::ReadAllChildren => "read all children",
            RequestType::ReadAllProperties => "read all properties",
            RequestType::ReadBlockOfChildren => "read block of children",
            RequestType::ReadBranch => "read branch",
            RequestType::ReadNextBlockOfChildren => "read next block of children",
            RequestType::ReadNode => "read node",
            RequestType::ReadProperty => "read property",
            RequestType::RemoveProperty => "remove property",
            RequestType::RenameNode => "rename node",
            RequestType::SetProperty => "set property",
            RequestType::UnlockBranch => "unlock branch",
            RequestType::UpdateProperties => "update properties",
            RequestType::UpdateValues => "update values",
            RequestType::VerifyNode => "verify node",
            RequestType::VerifyWorkspace => "verify workspace",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
