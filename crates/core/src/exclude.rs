//! Exclude policy for tree builds
//!
//! Combines, in order of precedence:
//! 1. Reserved names (the metadata directory plus configured names), skipped at any depth
//! 2. Configured gitignore-style patterns
//! 3. `<root>/.gitignore`, when enabled

use crate::config::{ExcludeConfig, META_DIR};
use crate::error::{Error, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Exclude rules for one worktree root
#[derive(Debug)]
pub struct ExcludeRules {
    /// Worktree root that relative paths are resolved against
    root: PathBuf,

    /// Names skipped wherever they appear
    reserved: BTreeSet<String>,

    /// Patterns from configuration (optional)
    patterns: Option<Gitignore>,

    /// `.gitignore` patterns (optional)
    gitignore: Option<Gitignore>,
}

impl ExcludeRules {
    /// Rules that only skip the metadata directory
    pub fn reserved_only(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            reserved: BTreeSet::from([META_DIR.to_string()]),
            patterns: None,
            gitignore: None,
        }
    }

    /// Load rules for `root` from configuration
    pub fn load(root: &Path, config: &ExcludeConfig) -> Result<Self> {
        let mut rules = Self::reserved_only(root);
        rules.reserved.extend(config.reserved.iter().cloned());

        if !config.patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(root);
            for pattern in &config.patterns {
                builder
                    .add_line(None, pattern)
                    .map_err(|e| pattern_error(root, pattern, e))?;
            }
            rules.patterns = Some(builder.build().map_err(|e| pattern_error(root, "", e))?);
        }

        if config.use_gitignore {
            let gitignore_path = root.join(".gitignore");
            if gitignore_path.is_file() {
                let mut builder = GitignoreBuilder::new(root);
                if let Some(e) = builder.add(&gitignore_path) {
                    warn!("Some lines in {} were not understood: {}", gitignore_path.display(), e);
                }
                match builder.build() {
                    Ok(gitignore) => rules.gitignore = Some(gitignore),
                    Err(e) => warn!("Ignoring {}: {}", gitignore_path.display(), e),
                }
            }
        }

        Ok(rules)
    }

    /// Check a path relative to the root
    pub fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        if rel_path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| self.reserved.contains(name))
        {
            return true;
        }

        if let Some(ref patterns) = self.patterns {
            if patterns.matched(rel_path, is_dir).is_ignore() {
                return true;
            }
        }

        if let Some(ref gitignore) = self.gitignore {
            if gitignore.matched(rel_path, is_dir).is_ignore() {
                return true;
            }
        }

        false
    }

    /// Get the worktree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of active rule sources
    pub fn active_sources(&self) -> usize {
        1 + usize::from(self.patterns.is_some()) + usize::from(self.gitignore.is_some())
    }
}

fn pattern_error(root: &Path, pattern: &str, e: ignore::Error) -> Error {
    Error::Config {
        path: root.join(META_DIR).join(crate::config::CONFIG_FILE),
        reason: format!("bad exclude pattern '{}': {}", pattern, e),
    }
}
