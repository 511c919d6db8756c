//! On-disk object store
//!
//! Objects live under the `objects/` directory of the metadata dir:
//! ```text
//! .git/
//!   objects/
//!     e6/
//!       9de29bb2d1d6434b8b29ae775ad8c2e48c5391   (zlib of "blob 0\0")
//! ```
//! Records are immutable. A write for an id that already exists is skipped.

use crate::error::{Error, Result};
use crate::hash::{ObjectId, BUCKET_LEN, HEX_LEN};
use crate::object::{self, Object, ObjectKind};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Shortest abbreviated id accepted by `resolve_prefix`
pub const MIN_PREFIX_LEN: usize = 4;

/// Content-addressed store of zlib-compressed objects
#[derive(Debug, Clone)]
pub struct ObjectStore {
    /// Path to the `objects/` directory
    objects_dir: PathBuf,
    /// zlib level used for new records
    compression: Compression,
}

impl ObjectStore {
    /// Open a store rooted at an `objects/` directory
    ///
    /// The directory itself is created lazily by the first write.
    pub fn open(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            compression: Compression::default(),
        }
    }

    /// Set the zlib level (0-9) used for new records
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Get the `objects/` directory path
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Path of the record for `id`: objects/<hh>/<rest>
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir.join(id.bucket()).join(id.entry_name())
    }

    /// Check if a record exists for `id`
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Store encoded object bytes under `id`
    ///
    /// Returns `false` if a record for `id` was already present, in which
    /// case nothing is written.
    pub fn put(&self, id: &ObjectId, encoded: &[u8]) -> Result<bool> {
        debug_assert_eq!(crate::hash::hash_bytes(encoded), *id);

        let target = self.object_path(id);
        if target.is_file() {
            trace!("Object {} already present", id);
            return Ok(false);
        }

        let bucket_dir = self.objects_dir.join(id.bucket());
        fs::create_dir_all(&bucket_dir).map_err(|source| Error::StoreWrite {
            path: bucket_dir.clone(),
            source,
        })?;

        let compressed = compress(encoded, self.compression).map_err(|source| Error::StoreWrite {
            path: target.clone(),
            source,
        })?;

        let written = atomic_write(&bucket_dir, &target, &compressed).map_err(|source| {
            Error::StoreWrite {
                path: target.clone(),
                source,
            }
        })?;

        if written {
            debug!(
                "Stored object {} ({} bytes, {} compressed)",
                id,
                encoded.len(),
                compressed.len()
            );
        }
        Ok(written)
    }

    /// Encode, address and store an object, returning its id
    pub fn write_object(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        self.write_object_status(kind, payload).map(|(id, _)| id)
    }

    /// Like `write_object`, also reporting whether a new record was written
    pub fn write_object_status(&self, kind: ObjectKind, payload: &[u8]) -> Result<(ObjectId, bool)> {
        let encoded = object::encode(kind, payload);
        let id = crate::hash::hash_bytes(&encoded);
        let written = self.put(&id, &encoded)?;
        Ok((id, written))
    }

    /// Read and decompress the encoded bytes stored under `id`
    ///
    /// The header is validated against the payload length before the
    /// bytes are returned.
    pub fn get(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound { id: id.to_hex() });
            }
            Err(e) => return Err(e.into()),
        };

        let encoded = decompress(&compressed).map_err(|reason| Error::CorruptObject {
            id: Some(*id),
            reason,
        })?;
        object::decode(&encoded).map_err(|e| e.with_id(*id))?;

        trace!("Read object {} ({} bytes)", id, encoded.len());
        Ok(encoded)
    }

    /// Read and decode the object stored under `id`
    pub fn read_object(&self, id: &ObjectId) -> Result<Object> {
        let encoded = self.get(id)?;
        Object::decode(&encoded).map_err(|e| e.with_id(*id))
    }

    /// Resolve a full or abbreviated hex id to a stored object
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId> {
        if prefix.len() < MIN_PREFIX_LEN
            || prefix.len() > HEX_LEN
            || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(Error::InvalidObjectId(prefix.to_string()));
        }
        let prefix = prefix.to_ascii_lowercase();

        if prefix.len() == HEX_LEN {
            let id = ObjectId::from_hex(&prefix)?;
            if self.contains(&id) {
                return Ok(id);
            }
            return Err(Error::ObjectNotFound { id: prefix });
        }

        let (bucket, rest) = prefix.split_at(BUCKET_LEN);
        let bucket_dir = self.objects_dir.join(bucket);
        let listing = match fs::read_dir(&bucket_dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound { id: prefix });
            }
            Err(e) => return Err(e.into()),
        };

        let mut matching = Vec::new();
        for entry in listing {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.len() == HEX_LEN - BUCKET_LEN && name.starts_with(rest) {
                if let Ok(id) = ObjectId::from_hex(&format!("{}{}", bucket, name)) {
                    matching.push(id);
                }
            }
        }

        match matching.len() {
            0 => Err(Error::ObjectNotFound { id: prefix }),
            1 => Ok(matching[0]),
            count => Err(Error::AmbiguousPrefix { prefix, count }),
        }
    }
}

fn compress(data: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), level);
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a complete zlib stream
///
/// Unlike `read::ZlibDecoder`, a stream cut short anywhere (including in
/// the trailing checksum) is an error, as are bytes after the stream end.
fn decompress(data: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2 + 64);

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(64));
        }
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();

        let status = inflater
            .decompress_vec(&data[in_before as usize..], &mut out, FlushDecompress::Finish)
            .map_err(|e| format!("zlib: {}", e))?;

        if status == Status::StreamEnd {
            break;
        }
        if inflater.total_in() == in_before && inflater.total_out() == out_before {
            return Err("zlib stream is truncated".to_string());
        }
    }

    if inflater.total_in() as usize != data.len() {
        return Err(format!(
            "{} trailing bytes after zlib stream",
            data.len() - inflater.total_in() as usize
        ));
    }
    Ok(out)
}

/// Write `data` to a temp file in `dir`, fsync it, then move it to `target`
///
/// Never replaces an existing `target`; returns `false` if one appeared
/// in the meantime.
fn atomic_write(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<bool> {
    let mut tmp = tempfile::Builder::new().prefix("tmp_obj_").tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
