use serde::{Deserialize, Serialize};

/// Configuration for channel workers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Name given to worker threads.
    pub thread_name: String,
    /// Size of a shared worker pool. `0` runs every channel on its own
    /// dedicated thread.
    pub worker_threads: usize,
    /// Whether the consumer is closed once the channel has been drained.
    pub close_consumer_on_completion: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            thread_name: "trellis-channel".to_string(),
            worker_threads: 0,
            close_consumer_on_completion: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.thread_name, "trellis-channel");
        assert_eq!(config.worker_threads, 0);
        assert!(config.close_consumer_on_completion);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ChannelConfig = toml::from_str("worker_threads = 4").unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.thread_name, "trellis-channel");
    }
}
