//! Error taxonomy for the object store

use crate::hash::ObjectId;
use crate::object::ObjectKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("object not found: {id}")]
    ObjectNotFound { id: String },

    #[error("ambiguous object prefix '{prefix}': matches {count} objects")]
    AmbiguousPrefix { prefix: String, count: usize },

    #[error("corrupt object{}: {reason}", display_id(.id))]
    CorruptObject { id: Option<ObjectId>, reason: String },

    #[error("object {id} is a {found}, expected a {expected}")]
    UnexpectedKind {
        id: ObjectId,
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("cannot read {}", .path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symlink cycle at {}", .path.display())]
    TraversalCycle { path: PathBuf },

    #[error("failed to write object {}", .path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("not a repository (or any parent up to /): {}", .path.display())]
    NotARepository { path: PathBuf },

    #[error("invalid configuration in {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("tree build cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptObject {
            id: None,
            reason: reason.into(),
        }
    }

    /// Attach the object id to a `CorruptObject` raised before the id was known
    pub(crate) fn with_id(self, object: ObjectId) -> Self {
        match self {
            Error::CorruptObject { id: None, reason } => Error::CorruptObject {
                id: Some(object),
                reason,
            },
            other => other,
        }
    }

    pub(crate) fn traversal(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Traversal {
            path: path.into(),
            source,
        }
    }

    /// True for `ObjectNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    /// True for `CorruptObject`
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptObject { .. })
    }
}

fn display_id(id: &Option<ObjectId>) -> String {
    match id {
        Some(id) => format!(" {}", id),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
