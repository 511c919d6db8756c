//! Plumb Core - content-addressed object storage
//!
//! This crate provides the storage layer:
//! - SHA-1 object ids
//! - Canonical `<kind> <len>\0<payload>` object encoding
//! - zlib-compressed on-disk object store
//! - Recursive tree building and tree entry parsing

pub mod builder;
pub mod config;
pub mod error;
pub mod exclude;
pub mod hash;
pub mod object;
pub mod repository;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use builder::{BuildStats, CancelFlag, TreeBuilder};
pub use config::{BuildOptions, Config, ExcludeConfig, StoreConfig};
pub use error::{Error, Result};
pub use exclude::ExcludeRules;
pub use hash::{hash_bytes, ObjectHasher, ObjectId};
pub use object::{Object, ObjectContent, ObjectKind};
pub use repository::Repository;
pub use store::ObjectStore;
pub use tree::{EntryMode, TreeEntry};
