pub mod settings;

pub use settings::{ConflictPolicy, HookConfig, ServerConfig, Settings, SettingsFile};

use crate::errors::{Result, StratoError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for per-repository state (config and the stack file).
pub const REPO_CONFIG_DIR: &str = ".strato";

const CONFIG_FILE_NAME: &str = "config.json";

/// Path of the user-wide config file, `$XDG_CONFIG_HOME/strato/config.json`.
pub fn global_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| StratoError::config("Could not determine user config directory"))?;
    Ok(base.join("strato").join(CONFIG_FILE_NAME))
}

/// Per-repository config directory (`<repo>/.strato`).
pub fn repo_config_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(REPO_CONFIG_DIR)
}

/// Per-repository config file path.
pub fn local_config_path(repo_root: &Path) -> PathBuf {
    repo_config_dir(repo_root).join(CONFIG_FILE_NAME)
}

/// A repository counts as initialized once its config directory exists.
pub fn is_repo_initialized(repo_root: &Path) -> bool {
    repo_config_dir(repo_root).exists()
}

/// Load the resolved settings for a repository: local file over global file
/// over built-in defaults. Missing files contribute nothing.
pub fn load_settings(repo_root: &Path) -> Result<Settings> {
    let global = SettingsFile::load(&global_config_path()?)?;
    let local = SettingsFile::load(&local_config_path(repo_root))?;
    Ok(Settings::from_files(global, local))
}

/// Create the repository config directory and seed the local config file.
/// Idempotent: an already-initialized repository keeps its existing file.
pub fn initialize_repo(repo_root: &Path) -> Result<PathBuf> {
    let dir = repo_config_dir(repo_root);
    std::fs::create_dir_all(&dir)
        .map_err(|e| StratoError::config(format!("Failed to create {}: {e}", dir.display())))?;

    let path = local_config_path(repo_root);
    if !path.exists() {
        let mut file = SettingsFile::default();
        file.repo_name = repo_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        file.save(&path)?;
        debug!("Wrote initial config to {}", path.display());
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_initialize_repo_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = initialize_repo(tmp.path()).unwrap();
        assert!(dir.exists());
        assert!(is_repo_initialized(tmp.path()));

        let path = local_config_path(tmp.path());
        let first = std::fs::read_to_string(&path).unwrap();
        initialize_repo(tmp.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_initial_config_guesses_repo_name() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("my-project");
        std::fs::create_dir(&repo).unwrap();
        initialize_repo(&repo).unwrap();

        let file = SettingsFile::load(&local_config_path(&repo)).unwrap();
        assert_eq!(file.repo_name.as_deref(), Some("my-project"));
    }
}
