//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

fn default_cache_size() -> usize {
    256
}

fn default_true() -> bool {
    true
}

/// Options recognized by the query preparation engine.
///
/// Deserializable so an adapter can load it from its own configuration
/// format; the builder covers programmatic setup.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Capacity of the parsed-query cache. 0 disables it.
    #[serde(default = "default_cache_size")]
    pub query_cache_size: usize,

    /// Capacity of the resolved-parameter-type cache. 0 disables it.
    #[serde(default = "default_cache_size")]
    pub types_cache_size: usize,

    /// Capacity of the usage/explain statistics cache. 0 disables it.
    /// Only used when `full_scan_stats` is enabled.
    #[serde(default = "default_cache_size")]
    pub stats_cache_size: usize,

    /// Detect single list-of-struct parameter sets and accumulate rows
    /// into one request.
    #[serde(default = "default_true")]
    pub auto_batch_detection: bool,

    /// Resolve parameter types through a server prepare round trip.
    #[serde(default = "default_true")]
    pub server_prepare: bool,

    /// Deadline hint for prepare/describe/explain round trips, in
    /// milliseconds. 0 means no deadline.
    #[serde(default)]
    pub operation_timeout_ms: u64,

    /// Collect per-query AST/plan statistics for full-scan detection.
    #[serde(default)]
    pub full_scan_stats: bool,

    /// Grow and shrink the session pool with the number of active
    /// logical connections.
    #[serde(default = "default_true")]
    pub auto_resize_pool: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            query_cache_size: default_cache_size(),
            types_cache_size: default_cache_size(),
            stats_cache_size: default_cache_size(),
            auto_batch_detection: true,
            server_prepare: true,
            operation_timeout_ms: 0,
            full_scan_stats: false,
            auto_resize_pool: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Deadline hint passed to transport round trips.
    pub fn operation_deadline(&self) -> Option<Duration> {
        if self.operation_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.operation_timeout_ms))
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set all three cache capacities at once.
    pub fn cache_size(mut self, size: usize) -> Self {
        self.config.query_cache_size = size;
        self.config.types_cache_size = size;
        self.config.stats_cache_size = size;
        self
    }

    pub fn query_cache_size(mut self, size: usize) -> Self {
        self.config.query_cache_size = size;
        self
    }

    pub fn types_cache_size(mut self, size: usize) -> Self {
        self.config.types_cache_size = size;
        self
    }

    pub fn stats_cache_size(mut self, size: usize) -> Self {
        self.config.stats_cache_size = size;
        self
    }

    /// Enable or disable list-of-struct batch detection.
    pub fn auto_batch_detection(mut self, enabled: bool) -> Self {
        self.config.auto_batch_detection = enabled;
        self
    }

    /// Enable or disable server-side preparation.
    pub fn server_prepare(mut self, enabled: bool) -> Self {
        self.config.server_prepare = enabled;
        self
    }

    /// Set the operation deadline for resolution round trips.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable full-scan usage tracking.
    pub fn full_scan_stats(mut self, enabled: bool) -> Self {
        self.config.full_scan_stats = enabled;
        self
    }

    /// Enable or disable session pool auto-resizing.
    pub fn auto_resize_pool(mut self, enabled: bool) -> Self {
        self.config.auto_resize_pool = enabled;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
