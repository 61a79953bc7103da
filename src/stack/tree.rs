use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One tracked branch and its position in the dependency chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackNode {
    /// Branch name; always equal to the node's key in the tree
    pub name: String,
    /// Parent branch name; `None` means the node sits directly on the trunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Child branch names, in creation order
    #[serde(default)]
    pub children: Vec<String>,
    /// Who created this layer (audit only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// When this layer was created
    pub created_at: DateTime<Utc>,
    /// When this layer was last updated
    pub updated_at: DateTime<Utc>,
}

impl StackNode {
    fn new(name: String, parent: Option<String>, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            name,
            parent,
            children: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The full tree of tracked branches, keyed by branch name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackTree {
    nodes: HashMap<String, StackNode>,
}

impl StackTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StackNode> {
        self.nodes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut StackNode> {
        self.nodes.get_mut(name)
    }

    pub fn branch_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert a new layer on top of `parent`, creating a placeholder node for
    /// the parent if it is not tracked yet (e.g. the trunk branch).
    pub fn insert_layer(
        &mut self,
        name: &str,
        parent: &str,
        created_by: Option<String>,
    ) -> Result<(), String> {
        if name.is_empty() {
            return Err("branch name cannot be empty".to_string());
        }
        if self.nodes.contains_key(name) {
            return Err(format!("branch '{name}' is already tracked"));
        }

        let node = StackNode::new(name.to_string(), Some(parent.to_string()), created_by);
        self.nodes.insert(name.to_string(), node);

        match self.nodes.get_mut(parent) {
            Some(parent_node) => {
                parent_node.children.push(name.to_string());
            }
            None => {
                let mut placeholder = StackNode::new(parent.to_string(), None, None);
                placeholder.children.push(name.to_string());
                self.nodes.insert(parent.to_string(), placeholder);
            }
        }

        Ok(())
    }

    /// Re-key a node from `old` to `new`, rewriting every reference to `old`
    /// in other nodes' children lists.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), String> {
        if new.is_empty() {
            return Err("new branch name cannot be empty".to_string());
        }
        if self.nodes.contains_key(new) {
            return Err(format!("branch '{new}' is already tracked"));
        }

        let mut node = self
            .nodes
            .remove(old)
            .ok_or_else(|| format!("branch '{old}' not in stack"))?;
        node.name = new.to_string();
        node.touch();
        self.nodes.insert(new.to_string(), node);

        for other in self.nodes.values_mut() {
            for child in other.children.iter_mut() {
                if child == old {
                    *child = new.to_string();
                }
            }
            if other.parent.as_deref() == Some(old) {
                other.parent = Some(new.to_string());
            }
        }

        Ok(())
    }

    /// Remove a node without re-parenting its children. Used when a layer is
    /// merged into its parent: the node disappears from its parent's children
    /// list, but its own children keep their (now untracked) parent reference.
    pub fn remove(&mut self, name: &str) -> Option<StackNode> {
        let node = self.nodes.remove(name)?;
        if let Some(parent) = node.parent.as_deref() {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|c| c != name);
            }
        }
        Some(node)
    }

    /// Move `child` under `new_parent`, keeping both sides of the
    /// parent/children relation consistent.
    pub fn set_parent(&mut self, child: &str, new_parent: &str) -> Result<(), String> {
        if !self.nodes.contains_key(child) {
            return Err(format!("branch '{child}' not in stack"));
        }
        if self.would_create_cycle(child, new_parent) {
            return Err(format!(
                "moving '{child}' under '{new_parent}' would create a cycle"
            ));
        }

        let old_parent = self.nodes[child].parent.clone();
        if let Some(old) = old_parent.as_deref() {
            if let Some(old_node) = self.nodes.get_mut(old) {
                old_node.children.retain(|c| c != child);
            }
        }

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(new_parent.to_string());
            node.touch();
        }

        if let Some(parent_node) = self.nodes.get_mut(new_parent) {
            if !parent_node.children.iter().any(|c| c == child) {
                parent_node.children.push(child.to_string());
            }
        }

        Ok(())
    }

    /// Would attaching `child` under `candidate_parent` make `child` its own
    /// ancestor? Walks the parent chain with a visited guard so a corrupted
    /// tree cannot loop forever.
    pub fn would_create_cycle(&self, child: &str, candidate_parent: &str) -> bool {
        if child == candidate_parent {
            return true;
        }
        let mut visited = HashSet::new();
        let mut current = Some(candidate_parent.to_string());
        while let Some(name) = current {
            if name == child {
                return true;
            }
            if !visited.insert(name.clone()) {
                return true;
            }
            current = self.nodes.get(&name).and_then(|n| n.parent.clone());
        }
        false
    }

    /// Root branch names: no parent, or a parent that is not tracked (treated
    /// as the external trunk). Sorted for deterministic output.
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .nodes
            .values()
            .filter(|n| match n.parent.as_deref() {
                None => true,
                Some(p) => !self.nodes.contains_key(p),
            })
            .map(|n| n.name.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Render the tree as an indented listing. Iterative walk with an explicit
    /// visited set: each node is printed at most once even if the tree is
    /// corrupted and reachable from two roots.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut visited: HashSet<String> = HashSet::new();

        for root in self.roots() {
            let mut work: Vec<(String, usize)> = vec![(root, 0)];
            while let Some((name, level)) = work.pop() {
                if !visited.insert(name.clone()) {
                    continue;
                }
                let Some(node) = self.nodes.get(&name) else {
                    continue;
                };
                out.push_str(&"  ".repeat(level));
                out.push_str("- ");
                out.push_str(&node.name);
                out.push('\n');
                for child in node.children.iter().rev() {
                    work.push((child.clone(), level + 1));
                }
            }
        }

        out
    }

    /// Check bidirectional parent/children consistency.
    pub fn validate(&self) -> Result<(), String> {
        for (key, node) in &self.nodes {
            if key != &node.name {
                return Err(format!(
                    "node '{}' is stored under key '{}'",
                    node.name, key
                ));
            }

            if let Some(parent) = node.parent.as_deref() {
                if let Some(parent_node) = self.nodes.get(parent) {
                    let count = parent_node.children.iter().filter(|c| *c == key).count();
                    if count != 1 {
                        return Err(format!(
                            "parent '{parent}' references child '{key}' {count} times"
                        ));
                    }
                }
            }

            for child in &node.children {
                match self.nodes.get(child) {
                    Some(child_node) => {
                        if child_node.parent.as_deref() != Some(key.as_str()) {
                            return Err(format!(
                                "child '{child}' does not reference parent '{key}'"
                            ));
                        }
                    }
                    None => {
                        return Err(format!("child '{child}' of '{key}' is not tracked"));
                    }
                }
            }

            if self.would_create_cycle(key, node.parent.as_deref().unwrap_or_default()) {
                return Err(format!("node '{key}' is its own ancestor"));
            }
        }
        Ok(())
    }
}
