use crate::cli::output::Output;
use crate::errors::Result;

/// Rebase every layer onto its parent in dependency order and prune
/// branches already merged into the remote trunk.
pub async fn run() -> Result<()> {
    let manager = super::manager()?;
    let summary = manager.update_stack()?;

    if summary.rebased.is_empty() && summary.removed.is_empty() {
        Output::info("Stack is already up to date");
        return Ok(());
    }

    Output::success("Stack updated");
    for branch in &summary.rebased {
        Output::sub_item(format!("Rebased {branch}"));
    }
    for branch in &summary.removed {
        Output::sub_item(format!("Removed merged branch {branch}"));
    }
    Ok(())
}

/// Rebase only the currently checked-out layer onto its parent.
pub async fn rebase_current() -> Result<()> {
    let manager = super::manager()?;
    let branch = manager.gateway().current_branch()?;
    let parent = manager.rebase_current()?;

    Output::success(format!("Rebased '{branch}' onto '{parent}'"));
    Ok(())
}
