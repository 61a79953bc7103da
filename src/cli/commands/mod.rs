pub mod completions;
pub mod config;
pub mod hooks;
pub mod init;
pub mod layer;
pub mod navigate;
pub mod push;
pub mod update;
pub mod view;

use crate::config as cfg;
use crate::errors::{Result, StratoError};
use crate::git;
use crate::stack::StackManager;
use std::path::PathBuf;

/// Repository root for the current working directory, or a `Config` error
/// outside any repository.
pub fn repo_root() -> Result<PathBuf> {
    git::find_repository_root()
}

/// Build the manager for the enclosing repository, requiring that it has
/// been initialized first.
pub fn manager() -> Result<StackManager> {
    let root = repo_root()?;
    if !cfg::is_repo_initialized(&root) {
        return Err(StratoError::config(
            "repository not initialized; run 'strato init' first",
        ));
    }
    StackManager::from_repo(root)
}
