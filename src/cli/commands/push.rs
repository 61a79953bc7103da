use crate::cli::output::Output;
use crate::errors::Result;

/// Push the current branch to the configured remote, refusing to run with
/// uncommitted changes.
pub async fn run() -> Result<()> {
    let manager = super::manager()?;
    let branch = manager.push_current()?;

    Output::success(format!(
        "Pushed '{branch}' to {}",
        manager.settings().remote
    ));
    Ok(())
}
