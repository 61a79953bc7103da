use serial_test::serial;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use strato::config::{ConflictPolicy, Settings};
use strato::errors::StratoError;
use strato::stack::StackManager;
use tempfile::TempDir;

fn git(repo: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo)
        .env("GIT_EDITOR", "true")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

fn git_stdout(repo: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_file(repo: &Path, name: &str, content: &str, message: &str) {
    std::fs::write(repo.join(name), content).unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", message]);
}

/// Working repo with a bare origin, main pushed with one commit.
fn setup_repo_with_remote() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let remote = tmp.path().join("origin.git");
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare", "-b", "main"]);
    git(&work, &["init", "-b", "main"]);
    git(&work, &["config", "user.name", "Test"]);
    git(&work, &["config", "user.email", "test@test.com"]);
    commit_file(&work, "README.md", "# Test\n", "Initial commit");
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&work, &["push", "-u", "origin", "main"]);

    (tmp, work)
}

fn manager_for(work: &Path) -> StackManager {
    StackManager::with_settings(work.to_path_buf(), Settings::default()).unwrap()
}

fn manager_with_policy(work: &Path, policy: ConflictPolicy) -> StackManager {
    let settings = Settings {
        auto_conflict_resolution: policy,
        ..Settings::default()
    };
    StackManager::with_settings(work.to_path_buf(), settings).unwrap()
}

fn is_ancestor(repo: &Path, ancestor: &str, descendant: &str) -> bool {
    Command::new("git")
        .args(["merge-base", "--is-ancestor", ancestor, descendant])
        .current_dir(repo)
        .output()
        .unwrap()
        .status
        .success()
}

#[test]
#[serial]
fn test_update_rebases_in_dependency_order() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_for(&work);

    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");
    manager.create_layer("b", None).unwrap();
    commit_file(&work, "b.txt", "b\n", "Layer b");
    manager.create_layer("c", None).unwrap();
    commit_file(&work, "c.txt", "c\n", "Layer c");

    // Advance main so every layer is stale
    git(&work, &["checkout", "main"]);
    commit_file(&work, "news.txt", "news\n", "Trunk moved");
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "c"]);

    let summary = manager.update_stack().unwrap();

    // Parents must be rebased before their children
    assert_eq!(summary.rebased, vec!["a", "b", "c"]);
    assert!(summary.removed.is_empty());

    // After the update every layer contains the new trunk commit
    for branch in ["a", "b", "c"] {
        assert!(is_ancestor(&work, "main", branch), "{branch} missing trunk commit");
    }
    // And the chain is still stacked: a under b under c
    assert!(is_ancestor(&work, "a", "b"));
    assert!(is_ancestor(&work, "b", "c"));

    // Back on the branch we started from
    assert_eq!(git_stdout(&work, &["rev-parse", "--abbrev-ref", "HEAD"]), "c");

    // Each rebased branch was pushed to the remote (best effort)
    for branch in ["a", "b", "c"] {
        assert!(
            !git_stdout(&work, &["ls-remote", "--heads", "origin", branch]).is_empty(),
            "{branch} not pushed"
        );
    }
}

#[test]
#[serial]
fn test_update_prunes_merged_branch_and_reparents_children() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_for(&work);

    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");
    git(&work, &["push", "-u", "origin", "a"]);
    manager.create_layer("b", None).unwrap();
    commit_file(&work, "b.txt", "b\n", "Layer b");

    // a lands on the trunk upstream
    git(&work, &["checkout", "main"]);
    git(&work, &["merge", "--no-ff", "a"]);
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "b"]);

    let summary = manager.update_stack().unwrap();

    assert_eq!(summary.removed, vec!["a"]);
    assert_eq!(summary.rebased, vec!["b"]);

    let tree = manager.snapshot().unwrap();
    assert!(!tree.contains("a"));
    assert_eq!(tree.get("b").unwrap().parent.as_deref(), Some("main"));
    tree.validate().unwrap();

    // The local branch is gone
    assert!(git_stdout(&work, &["branch", "--list", "a"]).is_empty());
}

#[test]
#[serial]
fn test_update_cleanup_rebases_children_onto_former_parent() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_for(&work);

    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");
    git(&work, &["push", "-u", "origin", "a"]);
    manager.create_layer("b", None).unwrap();
    commit_file(&work, "b.txt", "b\n", "Layer b");

    // a lands upstream and the trunk moves past the merge
    git(&work, &["checkout", "main"]);
    git(&work, &["merge", "--no-ff", "a"]);
    commit_file(&work, "hotfix.txt", "fix\n", "Hotfix after merge");
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "b"]);

    let summary = manager.update_stack().unwrap();
    assert_eq!(summary.removed, vec!["a"]);

    // The orphaned child was not just re-parented in the tree: its history
    // actually sits on the new parent, including the post-merge commit
    let tree = manager.snapshot().unwrap();
    assert_eq!(tree.get("b").unwrap().parent.as_deref(), Some("main"));
    assert!(is_ancestor(&work, "main", "b"), "b not rebased onto main");
}

#[test]
#[serial]
fn test_update_conflict_abort_leaves_repo_and_tree_untouched() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_with_policy(&work, ConflictPolicy::Manual);

    commit_file(&work, "shared.txt", "base\n", "Add shared");
    manager.create_layer("a", None).unwrap();
    commit_file(&work, "shared.txt", "layer\n", "Layer edit");

    git(&work, &["checkout", "main"]);
    commit_file(&work, "shared.txt", "trunk\n", "Trunk edit");
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "a"]);

    let tip_before = git_stdout(&work, &["rev-parse", "a"]);
    let tree_file = work.join(".git").join("strato").join("stack.json");
    let tree_before = std::fs::read_to_string(&tree_file).unwrap();

    manager
        .set_resolver_input(Box::new(Cursor::new(b"abort\n".to_vec())))
        .unwrap();
    let err = manager.update_stack().unwrap_err();
    assert!(matches!(err, StratoError::ConflictAborted(_)));

    // No transaction markers left behind
    assert!(git_stdout(&work, &["tag", "-l", "strato-tx-*"]).is_empty());
    // The branch and the tree file are exactly as before
    assert_eq!(git_stdout(&work, &["rev-parse", "a"]), tip_before);
    assert_eq!(std::fs::read_to_string(&tree_file).unwrap(), tree_before);
    assert!(git_stdout(&work, &["status", "--porcelain"]).is_empty());
}

#[test]
#[serial]
fn test_update_conflict_on_later_branch_leaves_tree_file_unchanged() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_with_policy(&work, ConflictPolicy::Manual);

    commit_file(&work, "conflict.txt", "base\n", "Add conflict file");
    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");
    git(&work, &["checkout", "main"]);
    manager.create_layer("b", None).unwrap();
    commit_file(&work, "conflict.txt", "layer\n", "Layer edit");

    git(&work, &["checkout", "main"]);
    commit_file(&work, "conflict.txt", "trunk\n", "Trunk edit");
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "a"]);

    let tree_file = work.join(".git").join("strato").join("stack.json");
    let tree_before = std::fs::read_to_string(&tree_file).unwrap();
    let a_tip = git_stdout(&work, &["rev-parse", "a"]);
    let b_tip = git_stdout(&work, &["rev-parse", "b"]);

    // a rebases cleanly first, then b conflicts and the user gives up
    manager
        .set_resolver_input(Box::new(Cursor::new(b"abort\n".to_vec())))
        .unwrap();
    let err = manager.update_stack().unwrap_err();
    assert!(matches!(err, StratoError::ConflictAborted(_)));

    // Even with an earlier branch rebased, nothing was persisted and no
    // transaction markers remain; the whole-update rollback restored the
    // starting branch too
    assert_eq!(std::fs::read_to_string(&tree_file).unwrap(), tree_before);
    assert!(git_stdout(&work, &["tag", "-l", "strato-tx-*"]).is_empty());
    assert!(git_stdout(&work, &["status", "--porcelain"]).is_empty());
    assert_eq!(git_stdout(&work, &["rev-parse", "a"]), a_tip);
    assert_eq!(git_stdout(&work, &["rev-parse", "b"]), b_tip);
}

#[test]
#[serial]
fn test_update_tolerates_unknown_remote_trunk() {
    // The remote exists but its trunk ref does not (never pushed), so the
    // merged-upstream check errors; the update must fall through to the
    // rebase instead of failing.
    let tmp = TempDir::new().unwrap();
    let remote = tmp.path().join("origin.git");
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare", "-b", "main"]);
    git(&work, &["init", "-b", "main"]);
    git(&work, &["config", "user.name", "Test"]);
    git(&work, &["config", "user.email", "test@test.com"]);
    commit_file(&work, "README.md", "# Test\n", "Initial commit");
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);

    let manager = manager_for(&work);
    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");
    git(&work, &["push", "-u", "origin", "a"]);

    let summary = manager.update_stack().unwrap();
    assert_eq!(summary.rebased, vec!["a"]);
    assert!(summary.removed.is_empty());
}

#[test]
#[serial]
fn test_update_auto_policy_resolves_conflicts() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_with_policy(&work, ConflictPolicy::Theirs);

    commit_file(&work, "shared.txt", "base\n", "Add shared");
    manager.create_layer("a", None).unwrap();
    commit_file(&work, "shared.txt", "layer\n", "Layer edit");

    git(&work, &["checkout", "main"]);
    commit_file(&work, "shared.txt", "trunk\n", "Trunk edit");
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "a"]);

    let summary = manager.update_stack().unwrap();
    assert_eq!(summary.rebased, vec!["a"]);

    // The layer's side won and the trunk commit is in its history
    git(&work, &["checkout", "a"]);
    assert_eq!(
        std::fs::read_to_string(work.join("shared.txt")).unwrap(),
        "layer\n"
    );
    assert!(is_ancestor(&work, "main", "a"));
}

#[test]
#[serial]
fn test_update_on_current_stack_is_idempotent() {
    let (_tmp, work) = setup_repo_with_remote();
    let manager = manager_for(&work);

    manager.create_layer("a", None).unwrap();
    commit_file(&work, "a.txt", "a\n", "Layer a");

    let first = manager.update_stack().unwrap();
    assert_eq!(first.rebased, vec!["a"]);

    let second = manager.update_stack().unwrap();
    assert_eq!(second.rebased, vec!["a"]);
    assert!(second.removed.is_empty());
    // A second run must not move anything
    let tip = git_stdout(&work, &["rev-parse", "a"]);
    manager.update_stack().unwrap();
    assert_eq!(git_stdout(&work, &["rev-parse", "a"]), tip);
}
