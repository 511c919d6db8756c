//! Snapshot a directory as a tree

use crate::util;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub fn run(dir: Option<&Path>) -> Result<()> {
    let repo = util::open_repo()?;

    let target = dir.unwrap_or_else(|| repo.root());
    let (id, stats) = repo
        .store_tree_with(Some(target), None)
        .with_context(|| format!("Failed to write tree for {}", target.display()))?;

    info!(
        "Wrote tree {} ({} files, {} trees, {} new objects)",
        id, stats.files, stats.trees, stats.written
    );
    println!("{}", id);
    Ok(())
}
