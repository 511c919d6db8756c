//! Tree entry codec
//!
//! A tree payload is a plain concatenation of entries:
//! ```text
//! <mode> <name>\0<20 raw id bytes>
//! ```
//! Entries are written in lexicographic order of their raw name bytes.

use crate::error::{Error, Result};
use crate::hash::{ObjectId, OBJECT_ID_LEN};
use crate::object::ObjectKind;
use std::borrow::Cow;

/// Mode of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file
    File,
    /// Regular file with the executable bit set
    Executable,
    /// Symbolic link, content is the link target
    Symlink,
    /// Sub-directory
    Directory,
}

impl EntryMode {
    /// Mode string as written into tree payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Directory => "040000",
        }
    }

    /// Parse a mode string, accepting the unpadded `40000` directory form
    pub fn parse(raw: &[u8]) -> Result<Self> {
        match raw {
            b"100644" => Ok(EntryMode::File),
            b"100755" => Ok(EntryMode::Executable),
            b"120000" => Ok(EntryMode::Symlink),
            b"040000" | b"40000" => Ok(EntryMode::Directory),
            other => Err(Error::corrupt(format!(
                "unknown tree entry mode '{}'",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// Kind of object this entry points at
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            EntryMode::Directory => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One child reference inside a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    /// Base name, raw bytes, never contains `/` or NUL
    pub name: Vec<u8>,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<Vec<u8>>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn kind(&self) -> ObjectKind {
        self.mode.object_kind()
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.mode.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.name);
        out.push(0);
        out.extend_from_slice(self.id.as_bytes());
    }
}

/// Sort entries into canonical order
pub fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Concatenate entries in the given order
pub fn serialize_entries(entries: &[TreeEntry]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(entries.len() * (OBJECT_ID_LEN + 16));
    for entry in entries {
        entry.write_to(&mut payload);
    }
    payload
}

/// Parse a tree payload back into entries, in stored order
pub fn parse_entries(payload: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut rest = payload;

    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| Error::corrupt("tree entry is missing its mode separator"))?;
        let mode = EntryMode::parse(&rest[..space])?;
        rest = &rest[space + 1..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupt("tree entry is missing its name terminator"))?;
        let name = &rest[..nul];
        if name.is_empty() || name.contains(&b'/') {
            return Err(Error::corrupt(format!(
                "invalid tree entry name '{}'",
                String::from_utf8_lossy(name)
            )));
        }
        rest = &rest[nul + 1..];

        if rest.len() < OBJECT_ID_LEN {
            return Err(Error::corrupt(format!(
                "tree entry '{}' has a truncated id ({} of {} bytes)",
                String::from_utf8_lossy(name),
                rest.len(),
                OBJECT_ID_LEN
            )));
        }
        let id = ObjectId::from_slice(&rest[..OBJECT_ID_LEN])?;
        rest = &rest[OBJECT_ID_LEN..];

        entries.push(TreeEntry::new(mode, name, id));
    }

    Ok(entries)
}
