use thiserror::Error;

/// Errors produced when constructing or parsing value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid name {0:?}: names must be non-empty and may not contain '/', '[' or ']'")]
    InvalidName(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid same-name-sibling index {0}: indexes start at 1")]
    InvalidIndex(u32),

    #[error("root path has no {0}")]
    RootPath(&'static str),
}
