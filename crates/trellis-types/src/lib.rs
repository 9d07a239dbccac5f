//! Value types for the Trellis graph repository.
//!
//! These are the types every request carries: where a node is
//! ([`Location`], [`Path`]), what it holds ([`Property`], [`Value`]), and the
//! caller-selected behaviours for conflicts, locks and caching. The request
//! layer treats them as opaque values; only equality and a few structural
//! queries (`is_same`, `is_at_or_below`) matter to it.
//!
//! # Key Types
//!
//! - [`Name`]: validated node/property name
//! - [`Path`] / [`Segment`]: absolute hierarchical path with same-name-sibling indexes
//! - [`Location`]: path plus optional identification properties
//! - [`Property`] / [`Value`]: node properties
//! - [`CachePolicy`]: time-to-live for read results
//! - [`ExecutionContext`]: ambient data handed to connections

pub mod behavior;
pub mod cache;
pub mod context;
pub mod error;
pub mod location;
pub mod name;
pub mod path;
pub mod property;

pub use behavior::{CloneConflictBehavior, CreateConflictBehavior, LockScope, NodeConflictBehavior};
pub use cache::CachePolicy;
pub use context::ExecutionContext;
pub use error::TypeError;
pub use location::{Location, UUID_PROPERTY};
pub use name::Name;
pub use path::{Path, Segment};
pub use property::{Property, Value};
