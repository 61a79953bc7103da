use crate::cli::output::Output;
use crate::errors::Result;
use console::style;

/// Show the stack as an indented tree, marking the current branch.
pub async fn run() -> Result<()> {
    let manager = super::manager()?;
    let tree = manager.snapshot()?;

    if tree.is_empty() {
        Output::info("No layers tracked yet");
        Output::tip("Create one with: strato add <branch>");
        return Ok(());
    }

    let current = manager.gateway().current_branch().unwrap_or_default();
    Output::section("Stack");
    for line in tree.render().lines() {
        let name = line.trim_start_matches(' ').trim_start_matches("- ");
        if name == current {
            println!("{} {}", line, style("(current)").green());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}
