pub mod checkpoint;
pub mod conflict;
pub mod gateway;

pub use checkpoint::Checkpoint;
pub use conflict::{ConflictResolver, Resolution};
pub use gateway::{GitGateway, GitResult};

use crate::errors::{Result, StratoError};
use std::path::PathBuf;

/// Find the working-tree root of the repository containing the current
/// directory.
pub fn find_repository_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()
        .map_err(|e| StratoError::config(format!("Could not get current directory: {e}")))?;
    GitGateway::discover_root(&current_dir)
}
