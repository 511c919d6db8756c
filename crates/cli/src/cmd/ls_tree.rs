//! List tree entries

use crate::cmd::cat_file::write_entry_line;
use crate::util;
use anyhow::Result;
use std::io::Write;

pub fn run(reference: &str, name_only: bool) -> Result<()> {
    let repo = util::open_repo()?;
    let id = util::resolve_object(&repo, reference)?;
    let entries = repo.list_tree(&id)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        if name_only {
            out.write_all(&entry.name)?;
            out.write_all(b"\n")?;
        } else {
            write_entry_line(&mut out, entry)?;
        }
    }
    out.flush()?;
    Ok(())
}
