use crate::cli::output::Output;
use crate::config::{self, SettingsFile};
use crate::errors::Result;

/// Initialize the repository: create the `.strato` directory and seed the
/// local config file. Safe to run again on an initialized repository.
pub async fn run(trunk: Option<String>) -> Result<()> {
    let root = super::repo_root()?;
    let already = config::is_repo_initialized(&root);

    config::initialize_repo(&root)?;

    if let Some(trunk) = trunk {
        let path = config::local_config_path(&root);
        let mut file = SettingsFile::load(&path)?;
        file.set_value("trunk_branch", &trunk)?;
        file.save(&path)?;
    }

    let settings = config::load_settings(&root)?;
    if already {
        Output::info("Repository already initialized");
    } else {
        Output::success("Initialized Strato repository");
    }
    Output::sub_item(format!("Config: {}", config::local_config_path(&root).display()));
    Output::sub_item(format!("Trunk branch: {}", settings.trunk_branch));

    if !already {
        Output::spacing();
        Output::tip("Next steps:");
        Output::bullet("Create your first layer: strato add <branch>");
        Output::bullet("View the stack: strato view");
    }
    Ok(())
}
