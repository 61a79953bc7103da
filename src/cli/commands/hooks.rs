use crate::cli::output::Output;
use crate::cli::HooksAction;
use crate::config::{self, HookConfig, SettingsFile};
use crate::errors::{Result, StratoError};
use crate::hooks;

pub async fn run(action: HooksAction) -> Result<()> {
    let root = super::repo_root()?;
    let path = config::local_config_path(&root);

    match action {
        HooksAction::Add { event, script } => {
            if !hooks::is_known_event(&event) {
                return Err(StratoError::validation(format!(
                    "unknown event '{event}' (expected one of: {})",
                    hooks::events::ALL.join(", ")
                )));
            }

            let mut file = SettingsFile::load(&path)?;
            let entry = HookConfig { event, script };
            let list = file.hooks.get_or_insert_with(Vec::new);
            if list.contains(&entry) {
                Output::info("Hook already registered");
                return Ok(());
            }
            list.push(entry.clone());
            file.save(&path)?;
            Output::success(format!("Registered {} hook: {}", entry.event, entry.script));
        }
        HooksAction::Remove { event, script } => {
            let mut file = SettingsFile::load(&path)?;
            let entry = HookConfig { event, script };
            let Some(list) = file.hooks.as_mut() else {
                return Err(StratoError::not_found("no hooks registered"));
            };
            let before = list.len();
            list.retain(|h| h != &entry);
            if list.len() == before {
                return Err(StratoError::not_found(format!(
                    "no {} hook with script '{}'",
                    entry.event, entry.script
                )));
            }
            file.save(&path)?;
            Output::success(format!("Removed {} hook: {}", entry.event, entry.script));
        }
        HooksAction::List => {
            let settings = config::load_settings(&root)?;
            if settings.hooks.is_empty() {
                Output::info("No hooks registered");
                return Ok(());
            }
            Output::section("Hooks");
            for hook in &settings.hooks {
                Output::sub_item(format!("{}: {}", hook.event, hook.script));
            }
        }
    }
    Ok(())
}
