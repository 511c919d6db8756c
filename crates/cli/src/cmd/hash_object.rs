//! Compute blob ids, optionally writing the blobs

use crate::util;
use anyhow::{Context, Result};
use plumb_core::object::{self, ObjectKind};
use std::io::Read;
use std::path::{Path, PathBuf};

pub fn run(write: bool, stdin: bool, files: &[PathBuf]) -> Result<()> {
    if !stdin && files.is_empty() {
        anyhow::bail!("Nothing to hash: pass one or more files or --stdin");
    }

    // Only writing needs a repository
    let repo = if write { Some(util::open_repo()?) } else { None };

    let mut inputs = Vec::with_capacity(files.len() + 1);
    if stdin {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read stdin")?;
        inputs.push(data);
    }
    for file in files {
        inputs.push(read_file(file)?);
    }

    for data in inputs {
        let id = match repo {
            Some(ref repo) => repo.store_blob(&data)?,
            None => object::object_id(ObjectKind::Blob, &data),
        };
        println!("{}", id);
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Cannot open '{}'", path.display()))
}
