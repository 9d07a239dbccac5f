use serde::{Deserialize, Serialize};
use trellis_types::CachePolicy;

/// Configuration for an [`InMemoryRepository`](crate::InMemoryRepository).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Name reported in errors such as "unsupported request".
    pub source_name: String,
    /// Workspace used when a request does not name one.
    pub default_workspace: String,
    /// Extra workspaces created up front.
    pub predefined_workspaces: Vec<String>,
    /// Policy stamped on every read result. `None` leaves results unstamped.
    pub default_cache_policy: Option<CachePolicy>,
    /// When `false`, every change request fails as read-only.
    pub updates_allowed: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            source_name: "memory".to_string(),
            default_workspace: "default".to_string(),
            predefined_workspaces: Vec::new(),
            default_cache_policy: Some(CachePolicy::new(60_000)),
            updates_allowed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.source_name, "memory");
        assert_eq!(config.default_workspace, "default");
        assert!(config.updates_allowed);
        assert_eq!(config.default_cache_policy, Some(CachePolicy::new(60_000)));
    }

    #[test]
    fn partial_toml() {
        let config: MemoryConfig = toml::from_str(
            r#"
            predefined_workspaces = ["staging", "archive"]
            updates_allowed = false

            [default_cache_policy]
            ttl_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.predefined_workspaces, vec!["staging", "archive"]);
        assert!(!config.updates_allowed);
        assert_eq!(config.default_cache_policy, Some(CachePolicy::new(500)));
        assert_eq!(config.default_workspace, "default");
    }
}
