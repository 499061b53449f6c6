//! Executor configuration: the concurrency cap, default timeouts, and
//! event-source buffer sizes the scheduler and its drivers use.

use serde::{Deserialize, Serialize};

/// Runtime configuration for [`crate::executor::Executor`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of nodes in the `Running` state at once. `None`
    /// means unbounded.
    pub max_concurrency: Option<usize>,
    /// Default timeout, in milliseconds, applied to an `http_request`
    /// node when it does not specify one of its own.
    pub default_http_timeout_ms: u64,
    /// Per-handle incoming-event queue capacity for event sources
    /// (`tcp_listen`, `tcp_connect`, `udp`, `unix_listen`, `unix_connect`).
    pub event_buffer_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            default_http_timeout_ms: 30_000,
            event_buffer_size: 256,
        }
    }
}

impl ExecutorConfig {
    /// Loads an [`ExecutorConfig`] from a TOML/YAML/JSON file, with
    /// `${VAR}` environment substitution, via
    /// [`blueprint_kernel::config::load_config`]. Requires the `config`
    /// feature (propagated from `blueprint-kernel`).
    #[cfg(feature = "config")]
    pub fn load(path: &str) -> Result<Self, blueprint_kernel::config::ConfigError> {
        blueprint_kernel::config::load_config(path)
    }
}
