use super::store::TreeStore;
use super::tree::StackTree;
use crate::config::{self, Settings};
use crate::errors::{Result, StratoError};
use crate::git::{Checkpoint, ConflictResolver, GitGateway, GitResult, Resolution};
use crate::hooks::{events, HookRunner};
use crate::utils;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// What a whole-stack update actually did, in execution order.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Branches rebased onto their parent, parents first
    pub rebased: Vec<String>,
    /// Branches removed because they were already merged into the trunk
    pub removed: Vec<String>,
}

/// Central coordinator for all stack operations. Owns the resolved settings,
/// the git gateway, the tree store and the in-memory tree behind the
/// repository lock. Mutating operations take the write half of the lock;
/// read-only operations take the read half.
pub struct StackManager {
    settings: Settings,
    gateway: GitGateway,
    store: TreeStore,
    hooks: HookRunner,
    resolver: Mutex<ConflictResolver>,
    tree: RwLock<StackTree>,
}

impl StackManager {
    /// Build a manager for the repository at `repo_root`, loading settings
    /// and the persisted tree.
    pub fn from_repo(repo_root: PathBuf) -> Result<Self> {
        let settings = config::load_settings(&repo_root)?;
        Self::with_settings(repo_root, settings)
    }

    pub fn with_settings(repo_root: PathBuf, settings: Settings) -> Result<Self> {
        let gateway = GitGateway::new(
            repo_root.clone(),
            settings.remote.clone(),
            settings.trunk_branch.clone(),
        );
        let git_dir = gateway.git_dir()?;
        let store = TreeStore::for_repo(
            &repo_root,
            &git_dir,
            settings.stack_file.as_deref().map(Path::new),
        );
        let tree = store.load()?;
        let hooks = HookRunner::new(repo_root, settings.hooks.clone());
        let resolver = Mutex::new(ConflictResolver::new(settings.auto_conflict_resolution));

        Ok(Self {
            settings,
            gateway,
            store,
            hooks,
            resolver,
            tree: RwLock::new(tree),
        })
    }

    /// Replace the conflict resolver's input source (scripted runs, tests).
    pub fn set_resolver_input(&self, input: Box<dyn BufRead + Send>) -> Result<()> {
        let mut resolver = self.lock_resolver()?;
        *resolver = ConflictResolver::with_input(self.settings.auto_conflict_resolution, input);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gateway(&self) -> &GitGateway {
        &self.gateway
    }

    fn read_tree(&self) -> Result<RwLockReadGuard<'_, StackTree>> {
        self.tree
            .read()
            .map_err(|_| StratoError::state("stack tree lock poisoned"))
    }

    fn write_tree(&self) -> Result<RwLockWriteGuard<'_, StackTree>> {
        self.tree
            .write()
            .map_err(|_| StratoError::state("stack tree lock poisoned"))
    }

    fn lock_resolver(&self) -> Result<std::sync::MutexGuard<'_, ConflictResolver>> {
        self.resolver
            .lock()
            .map_err(|_| StratoError::state("conflict resolver lock poisoned"))
    }

    /// Create a new layer branching off `parent` (or the currently checked-out
    /// branch when no parent is given), record it in the tree and persist.
    pub fn create_layer(&self, name: &str, parent: Option<&str>) -> Result<String> {
        let current = self.gateway.current_branch()?;
        let parent = parent.unwrap_or(&current).to_string();

        let mut tree = self.write_tree()?;
        if name.is_empty() {
            return Err(StratoError::validation("branch name cannot be empty"));
        }
        if tree.contains(name) {
            return Err(StratoError::validation(format!(
                "branch '{name}' is already tracked"
            )));
        }

        // The new branch starts at its parent's tip
        if parent != current {
            self.gateway.checkout_branch(&parent)?;
        }
        self.gateway.checkout_new_branch(name)?;

        let created_by = utils::current_username(&self.gateway);
        tree.insert_layer(name, &parent, Some(created_by))
            .map_err(StratoError::validation)?;
        self.store.save(&tree)?;
        drop(tree);

        info!("Created layer '{name}' on top of '{parent}'");
        self.hooks.run(events::CREATE_LAYER, name);
        Ok(parent)
    }

    /// Rename a tracked layer: git branch first (local plus best-effort
    /// remote), then the tree.
    pub fn rename_layer(&self, old: &str, new: &str) -> Result<()> {
        let mut tree = self.write_tree()?;
        if !tree.contains(old) {
            return Err(StratoError::not_found(format!("branch '{old}' not in stack")));
        }
        if tree.contains(new) {
            return Err(StratoError::validation(format!(
                "branch '{new}' is already tracked"
            )));
        }

        self.gateway.rename_branch(old, new)?;
        tree.rename(old, new).map_err(StratoError::validation)?;
        self.store.save(&tree)?;
        drop(tree);

        info!("Renamed layer '{old}' to '{new}'");
        self.hooks.run(events::RENAME_LAYER, new);
        Ok(())
    }

    /// Merge a layer into its parent with an explicit merge commit, then drop
    /// it from the tree. Children are deliberately left pointing at the gone
    /// branch; the update operation re-parents them once the merge reaches
    /// the trunk.
    pub fn merge_layer(&self, name: &str) -> Result<()> {
        let mut tree = self.write_tree()?;
        let node = tree
            .get(name)
            .ok_or_else(|| StratoError::not_found(format!("branch '{name}' not in stack")))?;
        let target = node
            .parent
            .clone()
            .unwrap_or_else(|| self.settings.trunk_branch.clone());

        self.gateway.ensure_clean_working_tree()?;
        let checkpoint = Checkpoint::create(&self.gateway, "merge");

        if let Err(e) = self.gateway.merge_no_ff(name, &target) {
            checkpoint.rollback();
            return Err(e);
        }

        tree.remove(name);
        if let Err(e) = self.store.save(&tree) {
            checkpoint.rollback();
            return Err(e);
        }
        drop(tree);
        checkpoint.release();

        info!("Merged layer '{name}' into '{target}'");
        self.hooks.run(events::MERGE_LAYER, name);
        Ok(())
    }

    /// Rebase `branch` onto `onto` under a checkpoint, routing conflicts
    /// through the resolver. An aborted resolution rolls back to the
    /// checkpoint and surfaces as `ConflictAborted`.
    pub fn rebase_branch(&self, branch: &str, onto: &str) -> Result<()> {
        self.gateway.ensure_clean_working_tree()?;
        self.gateway.checkout_branch(branch)?;
        let checkpoint = Checkpoint::create(&self.gateway, branch);

        let result = match self.gateway.start_rebase(onto) {
            Ok(result) => result,
            Err(e) => {
                checkpoint.rollback();
                return Err(e);
            }
        };

        match result {
            GitResult::Success(_) => {
                debug!("Rebased '{branch}' onto '{onto}'");
                Ok(())
            }
            GitResult::Conflict(_) => {
                let resolution = {
                    let mut resolver = self.lock_resolver()?;
                    resolver.resolve(&self.gateway)
                };
                match resolution {
                    Ok(Resolution::Resolved) => Ok(()),
                    Ok(Resolution::Aborted) => {
                        checkpoint.rollback();
                        Err(StratoError::conflict_aborted(format!(
                            "rebase of '{branch}' onto '{onto}' aborted"
                        )))
                    }
                    Err(e) => {
                        checkpoint.rollback();
                        Err(e)
                    }
                }
            }
            GitResult::Failure(out) => {
                // start_rebase turns failures into Err; unreachable in practice
                checkpoint.rollback();
                Err(StratoError::vcs(out))
            }
        }
    }

    /// Rebase the currently checked-out branch onto its tracked parent.
    pub fn rebase_current(&self) -> Result<String> {
        let branch = self.gateway.current_branch()?;
        let parent = {
            let tree = self.read_tree()?;
            let node = tree.get(&branch).ok_or_else(|| {
                StratoError::not_found(format!("branch '{branch}' not in stack"))
            })?;
            node.parent
                .clone()
                .unwrap_or_else(|| self.settings.trunk_branch.clone())
        };
        self.rebase_branch(&branch, &parent)?;
        Ok(parent)
    }

    /// Bring the entire stack up to date: sync the trunk from the remote,
    /// rebase every tracked branch onto its parent in dependency order, and
    /// prune branches that have already been merged into the remote trunk.
    /// The rebase phase runs under a whole-update checkpoint and leaves the
    /// tree file untouched on failure; the prune phase persists after each
    /// removed branch.
    pub fn update_stack(&self) -> Result<UpdateSummary> {
        let trunk = self.settings.trunk_branch.clone();
        let mut tree = self.write_tree()?;
        let mut summary = UpdateSummary::default();

        self.gateway.ensure_clean_working_tree()?;
        let starting_branch = self.gateway.current_branch()?;

        // Save point for the entire update operation
        let checkpoint = Checkpoint::create(&self.gateway, "stack-update");
        let mut to_delete: Vec<String> = Vec::new();
        if let Err(e) = self.rebase_all(&mut tree, &trunk, &mut summary, &mut to_delete) {
            checkpoint.rollback();
            return Err(e);
        }

        // Prune merged branches: rebase each child onto the former parent,
        // re-parent it, drop the node, then delete the local branch. Each
        // removal persists before the branch itself is touched.
        if !to_delete.is_empty() {
            self.gateway.checkout_branch(&trunk)?;
        }
        for name in to_delete {
            let prefix = format!("remove-{name}");
            let branch_checkpoint = Checkpoint::create(&self.gateway, &prefix);
            let Some(node) = tree.get(&name) else {
                continue;
            };
            let new_parent = node.parent.clone().unwrap_or_else(|| trunk.clone());
            for child in node.children.clone() {
                if !tree.contains(&child) {
                    continue;
                }
                if let Err(e) = self.rebase_branch(&child, &new_parent) {
                    warn!("Could not rebase '{child}' onto '{new_parent}', leaving it in place: {e}");
                    continue;
                }
                if let Err(e) = tree.set_parent(&child, &new_parent) {
                    warn!("Could not re-parent '{child}' under '{new_parent}': {e}");
                }
            }
            tree.remove(&name);
            if let Err(e) = self.store.save(&tree) {
                branch_checkpoint.rollback();
                return Err(e);
            }
            self.gateway.delete_branch_force(&name);
            branch_checkpoint.release();
            info!("Removed merged branch '{name}'");
            summary.removed.push(name);
        }

        self.store.save(&tree)?;
        drop(tree);
        checkpoint.release();

        // Return to where the user was, unless that branch was pruned
        if self.branch_exists(&starting_branch) {
            self.gateway.checkout_branch(&starting_branch)?;
        }

        self.hooks.run(events::UPDATE_STACK, "");
        Ok(summary)
    }

    /// Fixpoint walk: a branch is processed only after its parent has been,
    /// so each pass handles one more level of the tree. Rebased branches get
    /// a best-effort push; merged branches are queued for the prune phase.
    /// Nothing is persisted here, so a failed or aborted rebase leaves the
    /// tree file exactly as it was.
    fn rebase_all(
        &self,
        tree: &mut StackTree,
        trunk: &str,
        summary: &mut UpdateSummary,
        to_delete: &mut Vec<String>,
    ) -> Result<()> {
        self.sync_trunk(trunk)?;

        let mut processed: HashSet<String> = HashSet::new();
        loop {
            let mut progressed = false;
            for name in tree.branch_names() {
                if processed.contains(&name) {
                    continue;
                }
                let Some(node) = tree.get(&name) else {
                    continue;
                };

                let Some(parent) = node.parent.clone() else {
                    // Trunk placeholder; already synced above
                    processed.insert(name);
                    progressed = true;
                    continue;
                };
                let parent_ready = !tree.contains(&parent) || processed.contains(&parent);
                if !parent_ready {
                    continue;
                }

                let merged = match self.gateway.is_merged_upstream(&name) {
                    Ok(merged) => merged,
                    Err(e) => {
                        warn!("Could not check upstream state of '{name}': {e}");
                        false
                    }
                };
                if merged {
                    debug!("'{name}' is merged upstream, queueing for removal");
                    to_delete.push(name.clone());
                    processed.insert(name);
                    progressed = true;
                    continue;
                }

                self.rebase_branch(&name, &parent)?;
                if let Err(e) = self.gateway.push_current_branch() {
                    warn!("Push after rebase failed for '{name}': {e}");
                }
                if let Some(node) = tree.get_mut(&name) {
                    node.touch();
                }
                summary.rebased.push(name.clone());
                processed.insert(name);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        Ok(())
    }

    /// Pull the trunk branch with rebase. A failure (typically no upstream
    /// configured) is logged and skipped rather than failing the update.
    fn sync_trunk(&self, trunk: &str) -> Result<()> {
        self.gateway.checkout_branch(trunk)?;
        if let Err(e) = self.gateway.fetch_all() {
            warn!("Fetch failed, continuing with local refs: {e}");
        }
        match self.gateway.pull_rebase()? {
            GitResult::Success(_) => Ok(()),
            GitResult::Conflict(_) => {
                let resolution = {
                    let mut resolver = self.lock_resolver()?;
                    resolver.resolve(&self.gateway)
                };
                match resolution? {
                    Resolution::Resolved => Ok(()),
                    Resolution::Aborted => Err(StratoError::conflict_aborted(format!(
                        "pull of trunk '{trunk}' aborted"
                    ))),
                }
            }
            GitResult::Failure(out) => {
                debug!("Trunk pull skipped: {}", out.trim());
                Ok(())
            }
        }
    }

    fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("refs/heads/{name}");
        matches!(
            self.gateway
                .run(&["show-ref", "--verify", "--quiet", &reference]),
            Ok(GitResult::Success(_))
        )
    }

    /// Push the currently checked-out branch to the configured remote.
    pub fn push_current(&self) -> Result<String> {
        let branch = self.gateway.current_branch()?;
        self.gateway.push_current_branch()?;
        Ok(branch)
    }

    /// Tracked parent of `branch`, falling back to the trunk for roots.
    pub fn parent_of(&self, branch: &str) -> Result<Option<String>> {
        let tree = self.read_tree()?;
        Ok(tree.get(branch).and_then(|n| n.parent.clone()))
    }

    /// Tracked children of `branch`, in creation order.
    pub fn children_of(&self, branch: &str) -> Result<Vec<String>> {
        let tree = self.read_tree()?;
        Ok(tree.get(branch).map(|n| n.children.clone()).unwrap_or_default())
    }

    pub fn render_tree(&self) -> Result<String> {
        Ok(self.read_tree()?.render())
    }

    pub fn snapshot(&self) -> Result<StackTree> {
        Ok(self.read_tree()?.clone())
    }

    /// Re-read the tree file, discarding the in-memory state.
    pub fn reload(&self) -> Result<()> {
        let fresh = self.store.load()?;
        *self.write_tree()? = fresh;
        Ok(())
    }
}
