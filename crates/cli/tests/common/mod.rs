//! Common utilities for integration tests

pub mod cli;

/// Fresh temp directory initialized as a repository
pub fn init_repo() -> anyhow::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    cli::PlumbCommand::new(dir.path())
        .args(&["init"])
        .assert_success()?;
    Ok(dir)
}
