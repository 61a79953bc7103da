//! Stack model and orchestration: the branch tree, its on-disk store, and
//! the manager driving whole-stack operations against the git gateway.

pub mod manager;
pub mod store;
pub mod tree;

pub use manager::{StackManager, UpdateSummary};
pub use store::TreeStore;
pub use tree::{StackNode, StackTree};
