use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{self, SettingsFile};
use crate::errors::Result;

pub async fn run(action: ConfigAction) -> Result<()> {
    let root = super::repo_root()?;

    match action {
        ConfigAction::Set { key, value, global } => {
            let path = if global {
                config::global_config_path()?
            } else {
                config::local_config_path(&root)
            };
            let mut file = SettingsFile::load(&path)?;
            file.set_value(&key, &value)?;
            file.save(&path)?;

            let scope = if global { "global" } else { "local" };
            Output::success(format!("Set {key} = {value} ({scope})"));
        }
        ConfigAction::Get { key } => {
            let settings = config::load_settings(&root)?;
            println!("{}", settings.get_value(&key)?);
        }
        ConfigAction::List => {
            let settings = config::load_settings(&root)?;
            Output::section("Configuration");
            for key in [
                "trunk_branch",
                "remote",
                "auto_conflict_resolution",
                "stack_file",
                "repo_name",
                "server.url",
            ] {
                Output::sub_item(format!("{key}: {}", settings.get_value(key)?));
            }
            if !settings.hooks.is_empty() {
                Output::section("Hooks");
                for hook in &settings.hooks {
                    Output::sub_item(format!("{}: {}", hook.event, hook.script));
                }
            }
        }
    }
    Ok(())
}
