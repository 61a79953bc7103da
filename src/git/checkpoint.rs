use super::gateway::GitGateway;
use chrono::Utc;
use tracing::{debug, warn};

/// Tag prefix shared by all checkpoint markers.
pub const CHECKPOINT_PREFIX: &str = "strato-tx";

/// A lightweight named marker at the current commit, created before a
/// multi-step repository mutation. Rolling back is a best-effort hard reset
/// to the marker; it cannot undo a push that already reached a remote. The
/// tag is removed when the checkpoint is dropped, success or failure.
pub struct Checkpoint<'a> {
    gateway: &'a GitGateway,
    tag: String,
    branch: Option<String>,
    released: bool,
}

impl<'a> Checkpoint<'a> {
    /// Create a marker named `strato-tx-<prefix>-<nanos>` at HEAD, remembering
    /// the branch it was taken on. Creation is best-effort: a failure to tag
    /// is logged, and rollback becomes a no-op.
    pub fn create(gateway: &'a GitGateway, prefix: &str) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let tag = format!("{CHECKPOINT_PREFIX}-{prefix}-{nanos}");
        if let Err(e) = gateway.create_tag(&tag) {
            warn!("Failed to create checkpoint tag '{tag}': {e}");
        } else {
            debug!("Created checkpoint tag '{tag}'");
        }
        Self {
            gateway,
            tag,
            branch: gateway.current_branch().ok(),
            released: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Best-effort restore of the repository to the marker. Returns to the
    /// branch the checkpoint was taken on before resetting, so a failure on
    /// some other branch never moves that branch's tip to the marker.
    pub fn rollback(&self) {
        debug!("Rolling back to checkpoint '{}'", self.tag);
        if let Some(branch) = &self.branch {
            self.gateway.run_quietly(&["checkout", branch]);
        }
        self.gateway.reset_hard_quietly(&self.tag);
    }

    /// Remove the marker early. Equivalent to dropping the checkpoint.
    pub fn release(mut self) {
        self.remove_tag();
    }

    fn remove_tag(&mut self) {
        if !self.released {
            self.gateway.delete_tag_quietly(&self.tag);
            self.released = true;
        }
    }
}

impl Drop for Checkpoint<'_> {
    fn drop(&mut self) {
        self.remove_tag();
    }
}
