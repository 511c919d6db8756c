//! Canonical object encoding
//!
//! Every object is stored and hashed as:
//! ```text
//! <kind> <decimal payload length>\0<payload>
//! ```
//! The payload is opaque bytes and is never re-encoded.

use crate::error::{Error, Result};
use crate::hash::{ObjectHasher, ObjectId};
use crate::tree::{self, TreeEntry};
use std::str::FromStr;

/// Type of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw file content
    Blob,
    /// Directory listing
    Tree,
}

impl ObjectKind {
    /// Name used in the object header
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            other => Err(Error::corrupt(format!("unknown object kind '{}'", other))),
        }
    }
}

/// Header bytes for an object of `kind` with a payload of `len` bytes
pub fn header(kind: ObjectKind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind.as_str(), len).into_bytes()
}

/// Canonical encoding of `(kind, payload)`
pub fn encode(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut encoded = header(kind, payload.len());
    encoded.reserve_exact(payload.len());
    encoded.extend_from_slice(payload);
    encoded
}

/// Id of `(kind, payload)`, identical to `hash_bytes(&encode(kind, payload))`
pub fn object_id(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    let mut hasher = ObjectHasher::new();
    hasher.update(&header(kind, payload.len()));
    hasher.update(payload);
    hasher.finalize()
}

/// Split encoded bytes into kind and payload
///
/// Fails with `CorruptObject` unless the header is well formed and the
/// declared length matches the bytes that follow it exactly.
pub fn decode(encoded: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let nul = encoded
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::corrupt("missing header terminator"))?;

    let header = std::str::from_utf8(&encoded[..nul])
        .map_err(|_| Error::corrupt("header is not valid UTF-8"))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| Error::corrupt(format!("malformed header '{}'", header)))?;

    let kind: ObjectKind = kind.parse()?;
    if len.is_empty()
        || !len.bytes().all(|b| b.is_ascii_digit())
        || (len.len() > 1 && len.starts_with('0'))
    {
        return Err(Error::corrupt(format!("malformed length '{}'", len)));
    }
    let declared: usize = len
        .parse()
        .map_err(|_| Error::corrupt(format!("length out of range '{}'", len)))?;

    let payload = &encoded[nul + 1..];
    if payload.len() != declared {
        return Err(Error::corrupt(format!(
            "header declares {} bytes but payload has {}",
            declared,
            payload.len()
        )));
    }

    Ok((kind, payload))
}

/// An owned object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub kind: ObjectKind,
    pub payload: Vec<u8>,
}

impl Object {
    pub fn blob(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ObjectKind::Blob,
            payload: data.into(),
        }
    }

    /// Tree object whose payload is `entries` concatenated in the given order
    pub fn tree(entries: &[TreeEntry]) -> Self {
        Self {
            kind: ObjectKind::Tree,
            payload: tree::serialize_entries(entries),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(self.kind, &self.payload)
    }

    pub fn id(&self) -> ObjectId {
        object_id(self.kind, &self.payload)
    }

    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let (kind, payload) = decode(encoded)?;
        Ok(Self {
            kind,
            payload: payload.to_vec(),
        })
    }

    /// Interpret the payload according to the object kind
    pub fn into_content(self) -> Result<ObjectContent> {
        match self.kind {
            ObjectKind::Blob => Ok(ObjectContent::Blob(self.payload)),
            ObjectKind::Tree => Ok(ObjectContent::Tree(tree::parse_entries(&self.payload)?)),
        }
    }
}

/// Typed object contents returned to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectContent {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
}

impl ObjectContent {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectContent::Blob(_) => ObjectKind::Blob,
            ObjectContent::Tree(_) => ObjectKind::Tree,
        }
    }
}
