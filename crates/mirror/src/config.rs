//! Mirror configuration

use anyhow::Result;
use mirror_lib::sync::{RowErrorPolicy, StreamErrorPolicy, SyncConfig};
use serde::Deserialize;
use std::time::Duration;

/// Mirror configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Name attached to every structured log record
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health, metrics and route queries
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON route dump served as the remote route list
    #[serde(default = "default_source_path")]
    pub source_path: String,

    /// Rest interval between refresh cycles in milliseconds
    #[serde(default = "default_rest_interval")]
    pub rest_interval_ms: u64,

    #[serde(default)]
    pub stream_error_policy: StreamErrorPolicy,

    #[serde(default)]
    pub row_error_policy: RowErrorPolicy,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "route-mirror".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_source_path() -> String {
    "routes.json".to_string()
}

fn default_rest_interval() -> u64 {
    1000
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            source_path: default_source_path(),
            rest_interval_ms: default_rest_interval(),
            stream_error_policy: StreamErrorPolicy::default(),
            row_error_policy: RowErrorPolicy::default(),
        }
    }
}

impl MirrorConfig {
    /// Load configuration from `route-mirror.toml` (if present) and
    /// `MIRROR_*` environment variables, the latter taking precedence
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("route-mirror").required(false))
            .add_source(config::Environment::with_prefix("MIRROR").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Engine settings derived from this configuration
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            rest_interval: Duration::from_millis(self.rest_interval_ms),
            stream_error_policy: self.stream_error_policy,
            row_error_policy: self.row_error_policy,
            ..SyncConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MirrorConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.source_path, "routes.json");
        assert_eq!(config.rest_interval_ms, 1000);
        assert_eq!(config.stream_error_policy, StreamErrorPolicy::Sweep);
        assert_eq!(config.row_error_policy, RowErrorPolicy::Skip);
    }

    #[test]
    fn test_deserialize_partial_file() {
        let config: MirrorConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "rest_interval_ms = 250\nstream_error_policy = \"retain\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.stream_error_policy, StreamErrorPolicy::Retain);

        let sync = config.sync_config();
        assert_eq!(sync.rest_interval, Duration::from_millis(250));
        assert_eq!(sync.stream_error_policy, StreamErrorPolicy::Retain);
        assert_eq!(sync.initial_delay, Duration::ZERO);
    }
}
