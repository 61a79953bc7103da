use crate::git::{GitGateway, GitResult};

/// Best-effort attribution for new layers: git identity first, then the
/// environment, then a fixed fallback.
pub fn current_username(gateway: &GitGateway) -> String {
    if let Ok(GitResult::Success(out)) = gateway.run(&["config", "user.name"]) {
        let name = out.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    for var in ["USER", "USERNAME"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    "anonymous".to_string()
}
