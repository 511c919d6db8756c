//! SHA-1 object ids for content-addressed storage

use crate::error::{Error, Result};
use sha1::{Digest, Sha1};
use std::str::FromStr;

/// Length of a raw object id in bytes
pub const OBJECT_ID_LEN: usize = 20;

/// Length of an object id rendered as hex
pub const HEX_LEN: usize = OBJECT_ID_LEN * 2;

/// Number of hex characters used as the bucket directory name
pub const BUCKET_LEN: usize = 2;

/// A SHA-1 object id (20 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// Create a new ObjectId from bytes
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an ObjectId from a slice that must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; OBJECT_ID_LEN] = bytes.try_into().map_err(|_| {
            Error::InvalidObjectId(format!(
                "expected {} bytes, got {}",
                OBJECT_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Get the id as a byte slice
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a full-length hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != HEX_LEN {
            return Err(Error::InvalidObjectId(format!(
                "expected {} hex characters, got {}",
                HEX_LEN,
                hex_str.len()
            )));
        }

        let mut bytes = [0u8; OBJECT_ID_LEN];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|e| Error::InvalidObjectId(format!("{}: {}", hex_str, e)))?;
        Ok(Self(bytes))
    }

    /// Bucket directory name (first two hex characters)
    pub fn bucket(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// File name inside the bucket (remaining 38 hex characters)
    pub fn entry_name(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Hash already-encoded object bytes
pub fn hash_bytes(data: &[u8]) -> ObjectId {
    let digest = Sha1::digest(data);
    ObjectId(digest.into())
}

/// Incremental hasher, used to hash a header and payload without joining them
pub struct ObjectHasher {
    inner: Sha1,
}

impl ObjectHasher {
    /// Create a new incremental hasher
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the id
    pub fn finalize(self) -> ObjectId {
        ObjectId(self.inner.finalize().into())
    }
}

impl Default for ObjectHasher {
    fn default() -> Self {
        Self::new()
    }
}
