use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use trellis_channel::ChannelConfig;
use trellis_memory::MemoryConfig;

/// Settings read from `trellis.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    pub channel: ChannelConfig,
    pub memory: MemoryConfig,
}

impl TrellisConfig {
    pub const FILE_NAME: &'static str = "trellis.toml";

    /// Load `explicit` if given, else `trellis.toml` from the working
    /// directory if it exists, else the defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let local = Path::new(Self::FILE_NAME);
                if local.is_file() {
                    Self::read(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::CachePolicy;

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
            [channel]
            worker_threads = 2

            [memory]
            source_name = "scratch"
            predefined_workspaces = ["staging"]
            "#,
        )
        .unwrap();

        let config = TrellisConfig::load(Some(&path)).unwrap();
        assert_eq!(config.channel.worker_threads, 2);
        assert_eq!(config.channel.thread_name, "trellis-channel");
        assert_eq!(config.memory.source_name, "scratch");
        assert_eq!(config.memory.predefined_workspaces, vec!["staging".to_string()]);
        assert!(config.memory.updates_allowed);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrellisConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[memory]\nupdates_allowed = \"sometimes\"\n").unwrap();
        let err = TrellisConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    // =========================================================================
    // TOML
    // =========================================================================

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(TrellisConfig::from_toml("").unwrap(), TrellisConfig::default());
    }

    #[test]
    fn printed_config_reads_back() {
        let mut config = TrellisConfig::default();
        config.memory.default_cache_policy = Some(CachePolicy::new(5_000));
        config.channel.worker_threads = 3;
        let text = config.to_toml().unwrap();
        assert!(text.contains("[channel]"));
        assert_eq!(TrellisConfig::from_toml(&text).unwrap(), config);
    }
}
