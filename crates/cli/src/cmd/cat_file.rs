//! Show object content, kind or size

use crate::util;
use anyhow::Result;
use plumb_core::{ObjectContent, TreeEntry};
use std::io::Write;

/// What to print about the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pretty,
    Kind,
    Size,
    Exists,
}

/// Returns `false` only in `Exists` mode when the object is missing or invalid
pub fn run(mode: Mode, reference: &str) -> Result<bool> {
    let repo = util::open_repo()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match mode {
        Mode::Exists => {
            return Ok(repo
                .resolve(reference)
                .and_then(|id| repo.object_info(&id))
                .is_ok());
        }
        Mode::Kind => {
            let id = util::resolve_object(&repo, reference)?;
            let (kind, _) = repo.object_info(&id)?;
            writeln!(out, "{}", kind)?;
        }
        Mode::Size => {
            let id = util::resolve_object(&repo, reference)?;
            let (_, size) = repo.object_info(&id)?;
            writeln!(out, "{}", size)?;
        }
        Mode::Pretty => {
            let id = util::resolve_object(&repo, reference)?;
            match repo.read_object(&id)? {
                ObjectContent::Blob(data) => out.write_all(&data)?,
                ObjectContent::Tree(entries) => {
                    for entry in &entries {
                        write_entry_line(&mut out, entry)?;
                    }
                }
            }
        }
    }

    out.flush()?;
    Ok(true)
}

/// `<mode> <kind> <hex>\t<name>`
pub fn write_entry_line(out: &mut impl Write, entry: &TreeEntry) -> std::io::Result<()> {
    write!(out, "{} {} {}\t", entry.mode, entry.kind(), entry.id)?;
    out.write_all(&entry.name)?;
    out.write_all(b"\n")
}
