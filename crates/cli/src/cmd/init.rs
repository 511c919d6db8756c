//! Initialize a repository

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use plumb_core::Repository;
use std::env;

pub fn run() -> Result<()> {
    let current_dir = env::current_dir()?;

    let repo = Repository::init(&current_dir)
        .with_context(|| format!("Failed to initialize repository in {}", current_dir.display()))?;

    println!(
        "{} {}",
        "Initialized git directory".green(),
        repo.meta_dir().display()
    );
    Ok(())
}
