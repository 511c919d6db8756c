//! Recursive tree builder
//!
//! Snapshots a directory into tree objects, bottom-up: every child blob or
//! subtree is stored before the parent payload that names it is assembled.

use crate::config::BuildOptions;
use crate::error::{Error, Result};
use crate::exclude::ExcludeRules;
use crate::hash::ObjectId;
use crate::object::ObjectKind;
use crate::store::ObjectStore;
use crate::tree::{self, EntryMode, TreeEntry};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Shared flag checked between entries; set it to abort a build
pub type CancelFlag = Arc<AtomicBool>;

/// Counters collected during one build
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Regular files stored as blobs
    pub files: usize,
    /// Directories stored as trees (including the root)
    pub trees: usize,
    /// Symlinks stored as blobs
    pub symlinks: usize,
    /// Objects that produced a new record
    pub written: usize,
    /// Objects whose record already existed
    pub existing: usize,
    /// Entries skipped by the exclude rules
    pub excluded: usize,
    /// Symlinks skipped because neither following nor recording is enabled
    pub skipped_links: usize,
}

impl BuildStats {
    fn record(&mut self, written: bool) {
        if written {
            self.written += 1;
        } else {
            self.existing += 1;
        }
    }
}

/// Builds tree objects from directories on disk
pub struct TreeBuilder<'a> {
    store: &'a ObjectStore,
    rules: &'a ExcludeRules,
    options: &'a BuildOptions,
    cancel: Option<CancelFlag>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a ObjectStore, rules: &'a ExcludeRules, options: &'a BuildOptions) -> Self {
        Self {
            store,
            rules,
            options,
            cancel: None,
        }
    }

    /// Abort with `Error::Cancelled` once `flag` is set
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Store `dir` recursively and return the root tree id
    pub fn build(&self, dir: &Path) -> Result<ObjectId> {
        self.build_with_stats(dir).map(|(id, _)| id)
    }

    pub fn build_with_stats(&self, dir: &Path) -> Result<(ObjectId, BuildStats)> {
        let metadata = fs::metadata(dir).map_err(|e| Error::traversal(dir, e))?;
        if !metadata.is_dir() {
            return Err(Error::traversal(
                dir,
                io::Error::new(io::ErrorKind::Other, "not a directory"),
            ));
        }

        let mut stats = BuildStats::default();
        let mut ancestors = Vec::new();
        let id = self.build_dir(dir, Path::new(""), &mut ancestors, &mut stats)?;

        debug!(
            "Built tree {} for {} ({} files, {} trees, {} new objects, {} existing)",
            id,
            dir.display(),
            stats.files,
            stats.trees,
            stats.written,
            stats.existing
        );
        Ok((id, stats))
    }

    /// Store one directory; `ancestors` holds the canonical paths of the
    /// directories currently being built, outermost first
    fn build_dir(
        &self,
        dir: &Path,
        rel: &Path,
        ancestors: &mut Vec<PathBuf>,
        stats: &mut BuildStats,
    ) -> Result<ObjectId> {
        self.check_cancelled()?;

        let canonical = fs::canonicalize(dir).map_err(|e| Error::traversal(dir, e))?;
        if ancestors.contains(&canonical) {
            return Err(Error::TraversalCycle {
                path: dir.to_path_buf(),
            });
        }

        ancestors.push(canonical);
        let entries = self.collect_entries(dir, rel, ancestors, stats);
        ancestors.pop();
        let mut entries = entries?;

        tree::sort_entries(&mut entries);
        let payload = tree::serialize_entries(&entries);
        let (id, written) = self.store.write_object_status(ObjectKind::Tree, &payload)?;
        stats.trees += 1;
        stats.record(written);

        trace!("Tree {} for '{}' ({} entries)", id, rel.display(), entries.len());
        Ok(id)
    }

    fn collect_entries(
        &self,
        dir: &Path,
        rel: &Path,
        ancestors: &mut Vec<PathBuf>,
        stats: &mut BuildStats,
    ) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            self.check_cancelled()?;

            let entry = entry.map_err(|e| walk_error(dir, e))?;
            let path = entry.path();
            let child_rel = rel.join(entry.file_name());
            let file_type = entry.file_type();

            let followed = file_type.is_symlink() && self.options.follow_symlinks;
            let metadata = if followed {
                fs::metadata(path)
            } else {
                fs::symlink_metadata(path)
            }
            .map_err(|e| Error::traversal(path, e))?;

            if self.rules.is_excluded(&child_rel, metadata.is_dir()) {
                trace!("Excluded '{}'", child_rel.display());
                stats.excluded += 1;
                continue;
            }

            let name = name_bytes(entry.file_name(), path)?;

            if metadata.is_dir() {
                let id = self.build_dir(path, &child_rel, ancestors, stats)?;
                entries.push(TreeEntry::new(EntryMode::Directory, name, id));
            } else if metadata.is_file() {
                let data = fs::read(path).map_err(|e| Error::traversal(path, e))?;
                let (id, written) = self.store.write_object_status(ObjectKind::Blob, &data)?;
                stats.files += 1;
                stats.record(written);

                let mode = if self.options.record_executable && is_executable(&metadata) {
                    EntryMode::Executable
                } else {
                    EntryMode::File
                };
                trace!("Blob {} for '{}'", id, child_rel.display());
                entries.push(TreeEntry::new(mode, name, id));
            } else if metadata.file_type().is_symlink() {
                if !self.options.record_symlinks {
                    debug!("Skipping symlink '{}'", child_rel.display());
                    stats.skipped_links += 1;
                    continue;
                }
                let target = fs::read_link(path).map_err(|e| Error::traversal(path, e))?;
                let target = name_bytes(target.as_os_str(), path)?;
                let (id, written) = self.store.write_object_status(ObjectKind::Blob, &target)?;
                stats.symlinks += 1;
                stats.record(written);
                entries.push(TreeEntry::new(EntryMode::Symlink, name, id));
            } else {
                return Err(Error::traversal(
                    path,
                    io::Error::new(io::ErrorKind::Unsupported, "unsupported file type"),
                ));
            }
        }

        Ok(entries)
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(ref flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

fn walk_error(dir: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(dir).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    Error::traversal(path, source)
}

#[cfg(unix)]
fn name_bytes(name: &OsStr, _path: &Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(name.as_bytes().to_vec())
}

#[cfg(not(unix))]
fn name_bytes(name: &OsStr, path: &Path) -> Result<Vec<u8>> {
    name.to_str().map(|s| s.as_bytes().to_vec()).ok_or_else(|| {
        Error::traversal(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "name is not valid UTF-8"),
        )
    })
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{self, ObjectContent};
    use anyhow::Result;

    struct Fixture {
        _temp: tempfile::TempDir,
        work: PathBuf,
        store: ObjectStore,
        rules: ExcludeRules,
    }

    fn fixture() -> Result<Fixture> {
        let temp = tempfile::tempdir()?;
        let work = temp.path().join("work");
        fs::create_dir_all(&work)?;
        let store = ObjectStore::open(temp.path().join("objects"));
        let rules = ExcludeRules::reserved_only(&work);
        Ok(Fixture {
            _temp: temp,
            work,
            store,
            rules,
        })
    }

    fn tree_names(store: &ObjectStore, id: &ObjectId) -> Result<Vec<String>> {
        match store.read_object(id)?.into_content()? {
            ObjectContent::Tree(entries) => Ok(entries
                .iter()
                .map(|e| e.name_lossy().into_owned())
                .collect()),
            other => anyhow::bail!("expected tree, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_two_files_match_manual_encoding() -> Result<()> {
        let fx = fixture()?;
        fs::write(fx.work.join("b"), b"y")?;
        fs::write(fx.work.join("a"), b"x")?;

        let options = BuildOptions::default();
        let id = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work)?;

        let mut payload = Vec::new();
        for (name, content) in [("a", b"x"), ("b", b"y")] {
            payload.extend_from_slice(format!("100644 {}\0", name).as_bytes());
            payload.extend_from_slice(object::object_id(ObjectKind::Blob, content).as_bytes());
        }
        assert_eq!(id, object::object_id(ObjectKind::Tree, &payload));
        assert_eq!(fx.store.read_object(&id)?.payload, payload);
        Ok(())
    }

    #[test]
    fn test_empty_directory() -> Result<()> {
        let fx = fixture()?;
        let options = BuildOptions::default();

        let id = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work)?;

        assert_eq!(id.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert_eq!(fx.store.get(&id)?, b"tree 0\0");
        Ok(())
    }

    #[test]
    fn test_nested_directories() -> Result<()> {
        let fx = fixture()?;
        fs::create_dir_all(fx.work.join("src/empty"))?;
        fs::write(fx.work.join("src/lib.rs"), b"pub fn f() {}\n")?;
        fs::write(fx.work.join("README"), b"readme\n")?;

        let options = BuildOptions::default();
        let (id, stats) = TreeBuilder::new(&fx.store, &fx.rules, &options).build_with_stats(&fx.work)?;

        let root = match fx.store.read_object(&id)?.into_content()? {
            ObjectContent::Tree(entries) => entries,
            other => anyhow::bail!("expected tree, got {:?}", other.kind()),
        };
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].name, b"README");
        assert_eq!(root[0].mode, EntryMode::File);
        assert_eq!(root[1].name, b"src");
        assert_eq!(root[1].mode, EntryMode::Directory);

        assert_eq!(tree_names(&fx.store, &root[1].id)?, vec!["empty", "lib.rs"]);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.trees, 3);
        Ok(())
    }

    #[test]
    fn test_rebuild_is_stable() -> Result<()> {
        let fx = fixture()?;
        fs::create_dir_all(fx.work.join("dir"))?;
        fs::write(fx.work.join("dir/inner.txt"), b"inner")?;
        fs::write(fx.work.join("top.txt"), b"top")?;

        let options = BuildOptions::default();
        let builder = TreeBuilder::new(&fx.store, &fx.rules, &options);
        let (first, first_stats) = builder.build_with_stats(&fx.work)?;
        let (second, second_stats) = builder.build_with_stats(&fx.work)?;

        assert_eq!(first, second);
        assert_eq!(first_stats.written, 4);
        assert_eq!(second_stats.written, 0);
        assert_eq!(second_stats.existing, 4);
        Ok(())
    }

    #[test]
    fn test_identical_content_in_other_location() -> Result<()> {
        let fx = fixture()?;
        let other = fx.work.parent().unwrap().join("other");
        for dir in [&fx.work, &other] {
            fs::create_dir_all(dir.join("z"))?;
            fs::write(dir.join("z/file"), b"same")?;
            fs::write(dir.join("m"), b"same")?;
        }

        let options = BuildOptions::default();
        let builder = TreeBuilder::new(&fx.store, &fx.rules, &options);
        assert_eq!(builder.build(&fx.work)?, builder.build(&other)?);
        Ok(())
    }

    #[test]
    fn test_metadata_dir_excluded() -> Result<()> {
        let fx = fixture()?;
        fs::create_dir_all(fx.work.join(".git/objects"))?;
        fs::write(fx.work.join(".git/HEAD"), b"ref: refs/heads/main\n")?;
        fs::write(fx.work.join("file"), b"data")?;

        let options = BuildOptions::default();
        let (id, stats) = TreeBuilder::new(&fx.store, &fx.rules, &options).build_with_stats(&fx.work)?;

        assert_eq!(tree_names(&fx.store, &id)?, vec!["file"]);
        assert_eq!(stats.excluded, 1);
        Ok(())
    }

    #[test]
    fn test_root_must_be_directory() -> Result<()> {
        let fx = fixture()?;
        let file = fx.work.join("plain");
        fs::write(&file, b"not a dir")?;

        let options = BuildOptions::default();
        let builder = TreeBuilder::new(&fx.store, &fx.rules, &options);

        assert!(matches!(builder.build(&file), Err(Error::Traversal { .. })));
        assert!(matches!(
            builder.build(&fx.work.join("missing")),
            Err(Error::Traversal { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_cancelled_build() -> Result<()> {
        let fx = fixture()?;
        fs::write(fx.work.join("file"), b"data")?;

        let flag = CancelFlag::default();
        flag.store(true, Ordering::Relaxed);

        let options = BuildOptions::default();
        let result = TreeBuilder::new(&fx.store, &fx.rules, &options)
            .with_cancel(flag)
            .build(&fx.work);
        assert!(matches!(result, Err(Error::Cancelled)));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_aborts_build() -> Result<()> {
        let fx = fixture()?;
        fs::write(fx.work.join("a.txt"), b"data")?;
        let _listener = std::os::unix::net::UnixListener::bind(fx.work.join("sock"))?;

        let options = BuildOptions::default();
        let result = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work);
        match result {
            Err(Error::Traversal { path, .. }) => assert!(path.ends_with("sock"), "{:?}", path),
            other => panic!("expected traversal error, got {:?}", other),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped_by_default() -> Result<()> {
        let fx = fixture()?;
        fs::write(fx.work.join("target"), b"data")?;
        std::os::unix::fs::symlink("target", fx.work.join("link"))?;

        let options = BuildOptions::default();
        let (id, stats) = TreeBuilder::new(&fx.store, &fx.rules, &options).build_with_stats(&fx.work)?;

        assert_eq!(tree_names(&fx.store, &id)?, vec!["target"]);
        assert_eq!(stats.skipped_links, 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_recorded_as_blob() -> Result<()> {
        let fx = fixture()?;
        std::os::unix::fs::symlink("does/not/exist", fx.work.join("link"))?;

        let options = BuildOptions {
            record_symlinks: true,
            ..Default::default()
        };
        let id = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work)?;

        let entries = tree::parse_entries(&fx.store.read_object(&id)?.payload)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mode, EntryMode::Symlink);
        assert_eq!(fx.store.read_object(&entries[0].id)?.payload, b"does/not/exist");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_detected() -> Result<()> {
        let fx = fixture()?;
        fs::create_dir_all(fx.work.join("sub"))?;
        std::os::unix::fs::symlink("..", fx.work.join("sub/up"))?;

        let options = BuildOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let result = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work);
        assert!(matches!(result, Err(Error::TraversalCycle { .. })), "{:?}", result);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_followed_symlink_matches_real_file() -> Result<()> {
        let fx = fixture()?;
        let outside = fx.work.parent().unwrap().join("outside.txt");
        fs::write(&outside, b"shared")?;
        std::os::unix::fs::symlink(&outside, fx.work.join("linked"))?;

        let options = BuildOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let id = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work)?;

        let entries = tree::parse_entries(&fx.store.read_object(&id)?.payload)?;
        assert_eq!(entries[0].mode, EntryMode::File);
        assert_eq!(entries[0].id, object::object_id(ObjectKind::Blob, b"shared"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_followed_symlink_fails() -> Result<()> {
        let fx = fixture()?;
        std::os::unix::fs::symlink("gone", fx.work.join("dangling"))?;

        let options = BuildOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let result = TreeBuilder::new(&fx.store, &fx.rules, &options).build(&fx.work);
        match result {
            Err(Error::Traversal { path, .. }) => assert!(path.ends_with("dangling")),
            other => anyhow::bail!("expected traversal error, got {:?}", other),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_bit() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture()?;
        let script = fx.work.join("run.sh");
        fs::write(&script, b"#!/bin/sh\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        let plain = BuildOptions::default();
        let id = TreeBuilder::new(&fx.store, &fx.rules, &plain).build(&fx.work)?;
        let entries = tree::parse_entries(&fx.store.read_object(&id)?.payload)?;
        assert_eq!(entries[0].mode, EntryMode::File);

        let exec = BuildOptions {
            record_executable: true,
            ..Default::default()
        };
        let id = TreeBuilder::new(&fx.store, &fx.rules, &exec).build(&fx.work)?;
        let entries = tree::parse_entries(&fx.store.read_object(&id)?.payload)?;
        assert_eq!(entries[0].mode, EntryMode::Executable);
        Ok(())
    }
}
