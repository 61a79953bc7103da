use crate::cli::output::Output;
use crate::errors::Result;

/// Create a new layer branching off the current branch (or `--parent`).
pub async fn add(name: &str, parent: Option<&str>) -> Result<()> {
    let manager = super::manager()?;
    let parent = manager.create_layer(name, parent)?;

    Output::success(format!("Created layer '{name}'"));
    Output::sub_item(format!("Parent: {parent}"));
    Output::sub_item(format!("Now on: {name}"));
    Ok(())
}

/// Rename a tracked layer everywhere: local branch, remote branch (best
/// effort) and the stack tree.
pub async fn rename(old: &str, new: &str) -> Result<()> {
    let manager = super::manager()?;
    manager.rename_layer(old, new)?;

    Output::success(format!("Renamed '{old}' to '{new}'"));
    Ok(())
}

/// Merge a layer into its parent with an explicit merge commit.
pub async fn merge(name: Option<&str>) -> Result<()> {
    let manager = super::manager()?;
    let name = match name {
        Some(n) => n.to_string(),
        None => manager.gateway().current_branch()?,
    };

    manager.merge_layer(&name)?;
    Output::success(format!("Merged '{name}' into its parent"));
    Output::tip("Run 'strato update' to rebase the remaining layers");
    Ok(())
}
