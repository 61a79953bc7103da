use super::tree::StackTree;
use crate::errors::{Result, StratoError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default tree file, relative to the repository's metadata directory.
pub const STACK_FILE_NAME: &str = "stack.json";

/// Durable load/save of the stack tree. Whole-file overwrite; callers must
/// serialize access externally and treat save failure as fatal to the
/// enclosing operation.
pub struct TreeStore {
    path: PathBuf,
}

impl TreeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the tree file location for a repository, honoring a custom
    /// `stack_file` setting when present. The default lives under the git
    /// metadata directory, never the working tree: updates rewrite this file
    /// between checkouts and rebases, and a tracked copy would dirty the tree
    /// on every save.
    pub fn for_repo(repo_root: &Path, git_dir: &Path, custom: Option<&Path>) -> Self {
        let path = match custom {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => repo_root.join(p),
            None => git_dir.join("strato").join(STACK_FILE_NAME),
        };
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tree. A missing file yields an empty tree, not an error.
    pub fn load(&self) -> Result<StackTree> {
        if !self.path.exists() {
            debug!("No stack file at {}; starting empty", self.path.display());
            return Ok(StackTree::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            StratoError::storage(format!(
                "failed to read stack file {}: {e}",
                self.path.display()
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            StratoError::storage(format!(
                "failed to parse stack file {}: {e}",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, tree: &StackTree) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                StratoError::storage(format!(
                    "failed to create stack directory {}: {e}",
                    dir.display()
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(tree)
            .map_err(|e| StratoError::storage(format!("failed to serialize stack tree: {e}")))?;

        fs::write(&self.path, content).map_err(|e| {
            StratoError::storage(format!(
                "failed to write stack file {}: {e}",
                self.path.display()
            ))
        })
    }
}
