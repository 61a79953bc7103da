use crate::cli::output::Output;
use crate::errors::{Result, StratoError};

/// Check out the parent of the current layer.
pub async fn down() -> Result<()> {
    let manager = super::manager()?;
    let current = manager.gateway().current_branch()?;
    let parent = manager.parent_of(&current)?.ok_or_else(|| {
        StratoError::not_found(format!("'{current}' has no tracked parent"))
    })?;

    manager.gateway().checkout_branch(&parent)?;
    Output::success(format!("Switched to '{parent}'"));
    Ok(())
}

/// Check out a child of the current layer. With several children the choices
/// are listed instead of guessing.
pub async fn up() -> Result<()> {
    let manager = super::manager()?;
    let current = manager.gateway().current_branch()?;
    let children = manager.children_of(&current)?;

    match children.as_slice() {
        [] => Err(StratoError::not_found(format!(
            "'{current}' has no tracked children"
        ))),
        [only] => {
            manager.gateway().checkout_branch(only)?;
            Output::success(format!("Switched to '{only}'"));
            Ok(())
        }
        many => {
            Output::info(format!("'{current}' has several children:"));
            for child in many {
                Output::bullet(child);
            }
            Output::tip("Check one out with: git checkout <branch>");
            Ok(())
        }
    }
}
