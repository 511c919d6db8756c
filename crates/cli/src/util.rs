//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use plumb_core::{Error, ObjectId, Repository};

/// Open the repository containing the current directory
pub fn open_repo() -> Result<Repository> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    Ok(Repository::discover(&current_dir)?)
}

/// Resolve a full or abbreviated object id
pub fn resolve_object(repo: &Repository, reference: &str) -> Result<ObjectId> {
    repo.resolve(reference)
        .with_context(|| format!("Not a valid object name: '{}'", reference))
}

/// Process exit code for an error (128 when not inside a repository)
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::NotARepository { .. }) => 128,
        _ => 1,
    }
}
