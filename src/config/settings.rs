use crate::errors::{Result, StratoError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How rebase conflicts are resolved when the gateway reports one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Stage every conflicted file from our side and continue
    Ours,
    /// Stage every conflicted file from their side and continue
    Theirs,
    /// Drive an interactive continue/abort prompt loop
    #[default]
    Manual,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = StratoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ours" => Ok(ConflictPolicy::Ours),
            "theirs" => Ok(ConflictPolicy::Theirs),
            "manual" | "" => Ok(ConflictPolicy::Manual),
            other => Err(StratoError::config(format!(
                "invalid conflict policy '{other}' (expected ours, theirs or manual)"
            ))),
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Ours => write!(f, "ours"),
            ConflictPolicy::Theirs => write!(f, "theirs"),
            ConflictPolicy::Manual => write!(f, "manual"),
        }
    }
}

/// Collaboration endpoint, read by external sync collaborators only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// One configured lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Lifecycle event name (createLayer, renameLayer, mergeLayer, updateStack)
    pub event: String,
    /// Script path, run with `(event, arg)` as arguments
    pub script: String,
}

/// One configuration file's contents. Every field is optional so the local
/// file only overrides what it explicitly sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trunk_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_conflict_resolution: Option<ConflictPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<HookConfig>>,
}

impl SettingsFile {
    /// Load a settings file; a missing file is simply empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| StratoError::config(format!("Failed to read config file: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| StratoError::config(format!("Failed to parse config file: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                StratoError::config(format!("Failed to create config directory: {e}"))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StratoError::config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| StratoError::config(format!("Failed to write config file: {e}")))
    }

    /// Update a value by key. Keys mirror the resolved settings fields.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "trunk_branch" => self.trunk_branch = Some(value.to_string()),
            "remote" => self.remote = Some(value.to_string()),
            "auto_conflict_resolution" => {
                self.auto_conflict_resolution = Some(value.parse()?);
            }
            "stack_file" => self.stack_file = Some(value.to_string()),
            "repo_name" => self.repo_name = Some(value.to_string()),
            "server.url" => {
                self.server.get_or_insert_with(ServerConfig::default).url =
                    Some(value.to_string());
            }
            "server.token" => {
                self.server.get_or_insert_with(ServerConfig::default).token =
                    Some(value.to_string());
            }
            _ => return Err(StratoError::config(format!("Unknown config key: {key}"))),
        }
        Ok(())
    }

    /// Overlay `other` (higher precedence) on top of self.
    pub fn merged_with(mut self, other: SettingsFile) -> SettingsFile {
        if other.trunk_branch.is_some() {
            self.trunk_branch = other.trunk_branch;
        }
        if other.remote.is_some() {
            self.remote = other.remote;
        }
        if other.auto_conflict_resolution.is_some() {
            self.auto_conflict_resolution = other.auto_conflict_resolution;
        }
        if other.stack_file.is_some() {
            self.stack_file = other.stack_file;
        }
        if other.repo_name.is_some() {
            self.repo_name = other.repo_name;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.hooks.is_some() {
            self.hooks = other.hooks;
        }
        self
    }
}

/// Fully-resolved configuration: local file over global file over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub trunk_branch: String,
    pub remote: String,
    pub auto_conflict_resolution: ConflictPolicy,
    pub stack_file: Option<String>,
    pub repo_name: Option<String>,
    pub server: ServerConfig,
    pub hooks: Vec<HookConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trunk_branch: "main".to_string(),
            remote: "origin".to_string(),
            auto_conflict_resolution: ConflictPolicy::Manual,
            stack_file: None,
            repo_name: None,
            server: ServerConfig::default(),
            hooks: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_files(global: SettingsFile, local: SettingsFile) -> Self {
        let merged = global.merged_with(local);
        let defaults = Settings::default();
        Self {
            trunk_branch: merged.trunk_branch.unwrap_or(defaults.trunk_branch),
            remote: merged.remote.unwrap_or(defaults.remote),
            auto_conflict_resolution: merged
                .auto_conflict_resolution
                .unwrap_or(defaults.auto_conflict_resolution),
            stack_file: merged.stack_file,
            repo_name: merged.repo_name,
            server: merged.server.unwrap_or_default(),
            hooks: merged.hooks.unwrap_or_default(),
        }
    }

    /// Read a value by key for the `config get` command.
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "trunk_branch" => self.trunk_branch.clone(),
            "remote" => self.remote.clone(),
            "auto_conflict_resolution" => self.auto_conflict_resolution.to_string(),
            "stack_file" => self.stack_file.clone().unwrap_or_default(),
            "repo_name" => self.repo_name.clone().unwrap_or_default(),
            "server.url" => self.server.url.clone().unwrap_or_default(),
            "server.token" => self.server.token.clone().unwrap_or_default(),
            _ => return Err(StratoError::config(format!("Unknown config key: {key}"))),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_overrides_global() {
        let global = SettingsFile {
            trunk_branch: Some("master".to_string()),
            auto_conflict_resolution: Some(ConflictPolicy::Ours),
            ..Default::default()
        };
        let local = SettingsFile {
            auto_conflict_resolution: Some(ConflictPolicy::Theirs),
            ..Default::default()
        };

        let settings = Settings::from_files(global, local);
        assert_eq!(settings.trunk_branch, "master");
        assert_eq!(settings.auto_conflict_resolution, ConflictPolicy::Theirs);
        assert_eq!(settings.remote, "origin");
    }

    #[test]
    fn test_set_and_get_values() {
        let mut file = SettingsFile::default();
        file.set_value("trunk_branch", "develop").unwrap();
        file.set_value("auto_conflict_resolution", "ours").unwrap();
        file.set_value("server.url", "https://example.com").unwrap();
        assert!(file.set_value("no_such_key", "x").is_err());
        assert!(file.set_value("auto_conflict_resolution", "bogus").is_err());

        let settings = Settings::from_files(file, SettingsFile::default());
        assert_eq!(settings.get_value("trunk_branch").unwrap(), "develop");
        assert_eq!(settings.get_value("auto_conflict_resolution").unwrap(), "ours");
        assert_eq!(settings.get_value("server.url").unwrap(), "https://example.com");
        assert_eq!(settings.get_value("server.token").unwrap(), "");
    }

    #[test]
    fn test_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let mut file = SettingsFile::default();
        file.set_value("repo_name", "demo").unwrap();
        file.hooks = Some(vec![HookConfig {
            event: "createLayer".to_string(),
            script: "./notify.sh".to_string(),
        }]);
        file.save(&path).unwrap();

        let loaded = SettingsFile::load(&path).unwrap();
        assert_eq!(loaded.repo_name.as_deref(), Some("demo"));
        assert_eq!(loaded.hooks.unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let loaded = SettingsFile::load(&tmp.path().join("nope.json")).unwrap();
        assert!(loaded.trunk_branch.is_none());
    }
}
