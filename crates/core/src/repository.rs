//! Repository handle: the operations exposed to command-line tooling
//!
//! Manages the metadata directory layout:
//! ```text
//! .git/
//!   HEAD          ref: refs/heads/main
//!   plumb.toml    optional configuration
//!   objects/
//!     <hh>/<rest>
//!   refs/
//!     heads/
//!     tags/
//! ```

use crate::builder::{BuildStats, CancelFlag, TreeBuilder};
use crate::config::{Config, CONFIG_FILE, META_DIR};
use crate::error::{Error, Result};
use crate::exclude::ExcludeRules;
use crate::hash::ObjectId;
use crate::object::{self, ObjectContent, ObjectKind};
use crate::store::ObjectStore;
use crate::tree::TreeEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Initial contents of `HEAD`
pub const DEFAULT_HEAD: &str = "ref: refs/heads/main\n";

/// An opened repository
#[derive(Debug)]
pub struct Repository {
    /// Worktree root
    root: PathBuf,
    /// Path to the metadata directory
    meta_dir: PathBuf,
    config: Config,
    store: ObjectStore,
}

impl Repository {
    /// Create the metadata directory structure under `root`
    ///
    /// Existing directories and an existing `HEAD` are left untouched, so
    /// running this on an initialized repository is harmless.
    pub fn init(root: &Path) -> Result<Self> {
        let meta_dir = root.join(META_DIR);
        for dir in [
            meta_dir.join("objects"),
            meta_dir.join("refs").join("heads"),
            meta_dir.join("refs").join("tags"),
        ] {
            fs::create_dir_all(&dir)?;
        }

        let head = meta_dir.join("HEAD");
        if !head.exists() {
            fs::write(&head, DEFAULT_HEAD)?;
        }

        info!("Initialized repository at {}", meta_dir.display());
        Self::open(root)
    }

    /// Open the repository whose worktree root is `root`
    pub fn open(root: &Path) -> Result<Self> {
        let meta_dir = root.join(META_DIR);
        if !meta_dir.join("objects").is_dir() {
            return Err(Error::NotARepository {
                path: root.to_path_buf(),
            });
        }

        let config = Config::load(&meta_dir.join(CONFIG_FILE))?;
        let store = ObjectStore::open(meta_dir.join("objects"))
            .with_compression_level(config.store.compression_level);

        debug!("Opened repository at {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            meta_dir,
            config,
            store,
        })
    }

    /// Find the repository containing `start` by walking up to the first
    /// directory that holds a metadata directory
    pub fn discover(start: &Path) -> Result<Self> {
        let start = fs::canonicalize(start)?;
        let mut current = start.as_path();

        loop {
            if current.join(META_DIR).join("objects").is_dir() {
                return Self::open(current);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return Err(Error::NotARepository { path: start }),
            }
        }
    }

    /// Get the worktree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the metadata directory path
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Id `bytes` would have as a blob, without writing anything
    pub fn hash_blob(&self, bytes: &[u8]) -> ObjectId {
        object::object_id(ObjectKind::Blob, bytes)
    }

    /// Store `bytes` as a blob
    pub fn store_blob(&self, bytes: &[u8]) -> Result<ObjectId> {
        self.store.write_object(ObjectKind::Blob, bytes)
    }

    /// Store the contents of the file at `path` as a blob
    pub fn store_blob_file(&self, path: &Path) -> Result<ObjectId> {
        let data = fs::read(path).map_err(|e| Error::traversal(path, e))?;
        self.store_blob(&data)
    }

    /// Snapshot `dir` (the worktree root if `None`) as a tree
    pub fn store_tree(&self, dir: Option<&Path>) -> Result<ObjectId> {
        self.store_tree_with(dir, None).map(|(id, _)| id)
    }

    /// Snapshot with an optional cancellation flag, also returning build counters
    pub fn store_tree_with(
        &self,
        dir: Option<&Path>,
        cancel: Option<CancelFlag>,
    ) -> Result<(ObjectId, BuildStats)> {
        let dir = dir.unwrap_or(&self.root);
        let rules = ExcludeRules::load(dir, &self.config.exclude)?;
        let mut builder = TreeBuilder::new(&self.store, &rules, &self.config.build);
        if let Some(flag) = cancel {
            builder = builder.with_cancel(flag);
        }
        builder.build_with_stats(dir)
    }

    /// Read and decode an object
    pub fn read_object(&self, id: &ObjectId) -> Result<ObjectContent> {
        self.store
            .read_object(id)?
            .into_content()
            .map_err(|e| e.with_id(*id))
    }

    /// Kind and payload size of an object
    pub fn object_info(&self, id: &ObjectId) -> Result<(ObjectKind, usize)> {
        let object = self.store.read_object(id)?;
        Ok((object.kind, object.payload.len()))
    }

    /// Entries of a tree, in stored order
    pub fn list_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>> {
        match self.read_object(id)? {
            ObjectContent::Tree(entries) => Ok(entries),
            ObjectContent::Blob(_) => Err(Error::UnexpectedKind {
                id: *id,
                expected: ObjectKind::Tree,
                found: ObjectKind::Blob,
            }),
        }
    }

    /// Entry names of a tree, in stored order
    pub fn list_tree_names(&self, id: &ObjectId) -> Result<Vec<String>> {
        Ok(self
            .list_tree(id)?
            .iter()
            .map(|entry| entry.name_lossy().into_owned())
            .collect())
    }

    /// Resolve a full or abbreviated hex id
    pub fn resolve(&self, reference: &str) -> Result<ObjectId> {
        self.store.resolve_prefix(reference)
    }
}
