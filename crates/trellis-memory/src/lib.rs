//! In-memory connector for the Trellis graph repository.
//!
//! [`InMemoryRepository`] holds named workspaces, each a tree of UUID-keyed
//! nodes with ordered children, same-name-sibling indexes, properties and
//! branch locks. [`InMemoryConnection`] executes every request kind against
//! it, in bulk or as a channel consumer.
//!
//! # Example
//!
//! ```
//! use trellis_memory::{InMemoryConnection, MemoryConfig};
//! use trellis_request::{BatchRequestBuilder, RequestKind};
//! use trellis_types::{Location, Name, NodeConflictBehavior, Path};
//!
//! let mut connection = InMemoryConnection::with_config(MemoryConfig::default());
//! let mut builder = BatchRequestBuilder::new();
//! builder
//!     .create_node(Location::root(), "default", Name::new("docs").unwrap(), vec![], NodeConflictBehavior::Append)
//!     .verify_node_exists(Location::from_path(Path::parse("/docs").unwrap()), "default");
//!
//! let batch = connection.run(builder.pop().unwrap());
//! assert!(batch.is_frozen());
//! assert!(!batch.has_error());
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod graph;
pub mod processor;
pub mod repository;

pub use config::MemoryConfig;
pub use connection::InMemoryConnection;
pub use error::{MemoryError, MemoryResult};
pub use graph::{Branch, Workspace};
pub use processor::{PATH_COLUMN, SCORE_COLUMN};
pub use repository::{InMemoryRepository, Transferred};
