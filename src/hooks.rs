use crate::config::HookConfig;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Hard ceiling for a single hook script run.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle events hooks can subscribe to.
pub mod events {
    pub const CREATE_LAYER: &str = "createLayer";
    pub const RENAME_LAYER: &str = "renameLayer";
    pub const MERGE_LAYER: &str = "mergeLayer";
    pub const UPDATE_STACK: &str = "updateStack";

    pub const ALL: [&str; 4] = [CREATE_LAYER, RENAME_LAYER, MERGE_LAYER, UPDATE_STACK];
}

pub fn is_known_event(event: &str) -> bool {
    events::ALL.contains(&event)
}

/// Runs configured lifecycle hook scripts. Hooks are strictly fire-and-forget
/// from the caller's perspective: a missing, failing or hanging script is
/// logged and never affects the operation that triggered it.
pub struct HookRunner {
    repo_root: PathBuf,
    hooks: Vec<HookConfig>,
}

impl HookRunner {
    pub fn new(repo_root: PathBuf, hooks: Vec<HookConfig>) -> Self {
        Self { repo_root, hooks }
    }

    /// Run every script registered for `event`, passing `(event, arg)` as
    /// the script's arguments.
    pub fn run(&self, event: &str, arg: &str) {
        for hook in self.hooks.iter().filter(|h| h.event == event) {
            self.run_script(&hook.script, event, arg);
        }
    }

    fn run_script(&self, script: &str, event: &str, arg: &str) {
        let path = self.resolve_script(script);
        debug!("Running {event} hook: {}", path.display());

        let child = Command::new(&path)
            .arg(event)
            .arg(arg)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Hook '{script}' for {event} could not be started: {e}");
                return;
            }
        };

        match child.wait_timeout(HOOK_TIMEOUT) {
            Ok(Some(status)) if status.success() => {}
            Ok(Some(status)) => warn!("Hook '{script}' for {event} exited with {status}"),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    "Hook '{script}' for {event} timed out after {}s and was killed",
                    HOOK_TIMEOUT.as_secs()
                );
            }
            Err(e) => warn!("Hook '{script}' for {event} could not be waited on: {e}"),
        }
    }

    /// Relative script paths are taken from the repository root.
    fn resolve_script(&self, script: &str) -> PathBuf {
        let path = Path::new(script);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    #[test]
    fn test_hook_receives_event_and_arg() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "record.sh", "echo \"$1 $2\" > hook-output.txt");

        let runner = HookRunner::new(
            tmp.path().to_path_buf(),
            vec![HookConfig {
                event: events::CREATE_LAYER.to_string(),
                script: "record.sh".to_string(),
            }],
        );
        runner.run(events::CREATE_LAYER, "feature-a");

        let output = std::fs::read_to_string(tmp.path().join("hook-output.txt")).unwrap();
        assert_eq!(output.trim(), "createLayer feature-a");
    }

    #[test]
    fn test_hook_only_fires_for_its_event() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "record.sh", "echo ran > hook-output.txt");

        let runner = HookRunner::new(
            tmp.path().to_path_buf(),
            vec![HookConfig {
                event: events::MERGE_LAYER.to_string(),
                script: "record.sh".to_string(),
            }],
        );
        runner.run(events::CREATE_LAYER, "feature-a");
        assert!(!tmp.path().join("hook-output.txt").exists());
    }

    #[test]
    fn test_missing_script_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let runner = HookRunner::new(
            tmp.path().to_path_buf(),
            vec![HookConfig {
                event: events::UPDATE_STACK.to_string(),
                script: "does-not-exist.sh".to_string(),
            }],
        );
        // Must not panic or error
        runner.run(events::UPDATE_STACK, "");
    }

    #[test]
    fn test_known_events() {
        assert!(is_known_event("createLayer"));
        assert!(is_known_event("updateStack"));
        assert!(!is_known_event("beforeLunch"));
    }
}
