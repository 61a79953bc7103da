use crate::errors::{Result, StratoError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// The sole conflict signal: git prints this marker in its combined output
/// when a merge/rebase step stops on conflicts.
pub const CONFLICT_MARKER: &str = "CONFLICT";

/// Classified result of one git invocation.
#[derive(Debug)]
pub enum GitResult {
    /// Exit status zero
    Success(String),
    /// Non-zero exit and the output carries the conflict marker
    Conflict(String),
    /// Any other non-zero exit
    Failure(String),
}

/// Thin wrapper issuing git operations as synchronous subprocess calls and
/// classifying their results. All commands run from the repository root, so
/// callers never depend on the process working directory.
pub struct GitGateway {
    repo_root: PathBuf,
    remote: String,
    trunk: String,
}

impl GitGateway {
    pub fn new(repo_root: PathBuf, remote: String, trunk: String) -> Self {
        Self {
            repo_root,
            remote,
            trunk,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    /// Resolve the working-tree root for any path inside a repository.
    pub fn discover_root(start: &Path) -> Result<PathBuf> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(start)
            .output()
            .map_err(|e| StratoError::vcs(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(StratoError::config(format!(
                "not a git repository: {}",
                start.display()
            )));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(PathBuf::from(root))
    }

    /// Run git with the given arguments and classify the outcome. Only a
    /// spawn failure is an `Err`; git's own exit status is carried in the
    /// returned `GitResult`.
    pub fn run(&self, args: &[&str]) -> Result<GitResult> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            // never block on an editor (e.g. `rebase --continue` commit messages)
            .env("GIT_EDITOR", "true")
            .output()
            .map_err(|e| StratoError::vcs(format!("failed to run git {}: {e}", args.join(" "))))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(GitResult::Success(combined))
        } else if combined.contains(CONFLICT_MARKER) {
            Ok(GitResult::Conflict(combined))
        } else {
            Ok(GitResult::Failure(combined))
        }
    }

    /// Run git and require success, mapping any failure to a `Vcs` error.
    fn run_checked(&self, args: &[&str]) -> Result<String> {
        match self.run(args)? {
            GitResult::Success(out) => Ok(out),
            GitResult::Conflict(out) | GitResult::Failure(out) => Err(StratoError::vcs(format!(
                "git {} failed:\n{}",
                args.join(" "),
                out.trim()
            ))),
        }
    }

    /// Run git where failures are tolerated (best-effort cleanup paths).
    pub fn run_quietly(&self, args: &[&str]) {
        if let Ok(GitResult::Failure(out)) | Ok(GitResult::Conflict(out)) = self.run(args) {
            debug!("git {} (ignored): {}", args.join(" "), out.trim());
        }
    }

    /// Current branch name, or a `State` error when it cannot be determined.
    pub fn current_branch(&self) -> Result<String> {
        let out = self
            .run_checked(&["rev-parse", "--abbrev-ref", "HEAD"])
            .map_err(|_| StratoError::state("cannot determine current branch"))?;
        let branch = out.trim().to_string();
        if branch.is_empty() {
            return Err(StratoError::state("cannot determine current branch"));
        }
        Ok(branch)
    }

    pub fn rev_parse(&self, reference: &str) -> Result<String> {
        Ok(self.run_checked(&["rev-parse", reference])?.trim().to_string())
    }

    /// Absolute path of the repository's metadata directory (usually
    /// `<root>/.git`). Git may report it relative to the working directory.
    pub fn git_dir(&self) -> Result<PathBuf> {
        let out = self.run_checked(&["rev-parse", "--git-dir"])?;
        let path = PathBuf::from(out.trim());
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.repo_root.join(path))
        }
    }

    /// Fail if any uncommitted change exists (staged, unstaged or untracked).
    pub fn ensure_clean_working_tree(&self) -> Result<()> {
        let out = self.run_checked(&["status", "--porcelain"])?;
        let status = out.trim();
        if !status.is_empty() {
            return Err(StratoError::vcs(format!(
                "working tree not clean; commit or stash changes first:\n{status}"
            )));
        }
        Ok(())
    }

    pub fn checkout_new_branch(&self, name: &str) -> Result<()> {
        self.ensure_clean_working_tree()?;
        self.run_checked(&["checkout", "-b", name])?;
        Ok(())
    }

    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        self.run_checked(&["checkout", name])?;
        Ok(())
    }

    /// Rename locally, then attempt the remote rename. The remote side is
    /// best-effort: the branch may simply never have been pushed.
    pub fn rename_branch(&self, old: &str, new: &str) -> Result<()> {
        self.ensure_clean_working_tree()?;
        self.run_checked(&["branch", "-m", old, new])?;

        let refspec = format!(":{old}");
        match self.run(&["push", &self.remote, &refspec, new])? {
            GitResult::Success(_) => {}
            GitResult::Conflict(out) | GitResult::Failure(out) => {
                warn!(
                    "Remote rename of '{old}' may have failed (possibly no remote branch): {}",
                    out.trim()
                );
            }
        }
        Ok(())
    }

    /// Push the current branch. Stricter than git itself: we refuse to push
    /// with uncommitted changes to avoid partial pushes.
    pub fn push_current_branch(&self) -> Result<()> {
        self.ensure_clean_working_tree()
            .map_err(|e| StratoError::vcs(format!("cannot push with uncommitted changes: {e}")))?;
        self.run_checked(&["push", "-u", &self.remote, "HEAD"])?;
        Ok(())
    }

    pub fn fetch_all(&self) -> Result<()> {
        self.run_checked(&["fetch", "--all"])?;
        Ok(())
    }

    /// `git pull --rebase`, classified so the caller can hand conflicts to
    /// the resolver.
    pub fn pull_rebase(&self) -> Result<GitResult> {
        self.run(&["pull", "--rebase"])
    }

    /// Start `git rebase <onto>` on the currently checked-out branch,
    /// classified. A non-conflict failure is aborted here before returning,
    /// leaving the working tree on its pre-rebase branch.
    pub fn start_rebase(&self, onto: &str) -> Result<GitResult> {
        let result = self.run(&["rebase", onto])?;
        if let GitResult::Failure(out) = &result {
            self.run_quietly(&["rebase", "--abort"]);
            return Err(StratoError::vcs(format!(
                "rebase onto {onto} failed:\n{}",
                out.trim()
            )));
        }
        Ok(result)
    }

    /// Merge `src` into `into` with `--no-ff` (always a merge commit, never a
    /// fast-forward). Any failed merge is aborted before the error surfaces.
    pub fn merge_no_ff(&self, src: &str, into: &str) -> Result<()> {
        self.checkout_branch(into)?;
        match self.run(&["merge", "--no-ff", src])? {
            GitResult::Success(_) => Ok(()),
            GitResult::Conflict(out) | GitResult::Failure(out) => {
                self.run_quietly(&["merge", "--abort"]);
                Err(StratoError::vcs(format!(
                    "merge {src} -> {into} failed:\n{}",
                    out.trim()
                )))
            }
        }
    }

    /// Whether `branch` is already merged into the remote trunk: the common
    /// ancestor of the branch and the remote trunk tip equals the branch's
    /// own tip commit.
    pub fn is_merged_upstream(&self, branch: &str) -> Result<bool> {
        // A branch that was never pushed cannot be merged upstream; an
        // unreachable remote counts the same way.
        let heads = match self.run(&["ls-remote", "--heads", &self.remote, branch])? {
            GitResult::Success(out) => out,
            GitResult::Conflict(out) | GitResult::Failure(out) => {
                debug!("ls-remote for '{branch}' failed, treating as unmerged: {}", out.trim());
                return Ok(false);
            }
        };
        if heads.trim().is_empty() {
            return Ok(false);
        }

        let upstream = format!("{}/{}", self.remote, self.trunk);
        let merge_base = self
            .run_checked(&["merge-base", branch, &upstream])?
            .trim()
            .to_string();
        let branch_tip = self.rev_parse(branch)?;
        Ok(merge_base == branch_tip)
    }

    pub fn create_tag(&self, name: &str) -> Result<()> {
        self.run_checked(&["tag", name])?;
        Ok(())
    }

    /// Best-effort tag removal; used on checkpoint release paths.
    pub fn delete_tag_quietly(&self, name: &str) {
        self.run_quietly(&["tag", "-d", name]);
    }

    /// Best-effort hard reset; used on rollback paths where errors from the
    /// reset itself are swallowed.
    pub fn reset_hard_quietly(&self, target: &str) {
        self.run_quietly(&["reset", "--hard", target]);
    }

    /// Force-delete a local branch, logging on failure.
    pub fn delete_branch_force(&self, name: &str) {
        match self.run(&["branch", "-D", name]) {
            Ok(GitResult::Success(_)) => {}
            Ok(GitResult::Conflict(out)) | Ok(GitResult::Failure(out)) => {
                warn!("Failed to delete local branch '{name}': {}", out.trim());
            }
            Err(e) => warn!("Failed to delete local branch '{name}': {e}"),
        }
    }
}
