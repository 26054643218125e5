//! Pipeline configuration
//!
//! Configuration is plain data with serde support so it can be embedded in a
//! larger application config or loaded from a standalone YAML file:
//!
//! ```rust
//! use framelink::PipelineConfig;
//!
//! let config = PipelineConfig::from_yaml_str(
//!     "frame_timeout_ms: 250\nconsumers: 2\nqueue_capacity: 64\n",
//! ).unwrap();
//! assert_eq!(config.consumers, 2);
//! assert_eq!(config.discovery_timeout_ms, 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::{PipelineError, Result};

/// Tunables for the acquisition pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Timeout for a single frame retrieval
    pub frame_timeout_ms: u64,

    /// Consecutive timeouts after which the producer asks the source whether
    /// the device is still connected. 0 disables probing.
    pub timeouts_before_probe: u32,

    /// Stop after this many frames have been enqueued
    pub frame_target: Option<u64>,

    /// Number of processing threads
    pub consumers: usize,

    /// Queue bound; `None` keeps the queue unbounded and the producer
    /// never blocks on push
    pub queue_capacity: Option<usize>,

    /// Timeout for a single rediscovery sweep
    pub discovery_timeout_ms: u64,

    /// Pause between failed reconnect attempts
    pub reconnect_backoff_ms: u64,

    /// Give up reconnecting after this many attempts; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,

    /// Only accept a rediscovered device whose serial matches the original
    pub require_same_device: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 1000,
            timeouts_before_probe: 5,
            frame_target: None,
            consumers: 1,
            queue_capacity: None,
            discovery_timeout_ms: 1000,
            reconnect_backoff_ms: 500,
            max_reconnect_attempts: None,
            require_same_device: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded pipeline configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Check values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.frame_timeout_ms == 0 {
            return Err(PipelineError::config_invalid("frame_timeout_ms must be greater than 0"));
        }
        if self.discovery_timeout_ms == 0 {
            return Err(PipelineError::config_invalid(
                "discovery_timeout_ms must be greater than 0",
            ));
        }
        if self.consumers == 0 {
            return Err(PipelineError::config_invalid("consumers must be at least 1"));
        }
        if self.queue_capacity == Some(0) {
            return Err(PipelineError::config_invalid("queue_capacity must be at least 1"));
        }
        if self.frame_target == Some(0) {
            return Err(PipelineError::config_invalid("frame_target must be at least 1"));
        }
        if self.max_reconnect_attempts == Some(0) {
            return Err(PipelineError::config_invalid("max_reconnect_attempts must be at least 1"));
        }
        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().expect("default config must validate");
        assert_eq!(config.queue_capacity, None);
        assert!(config.require_same_device);
        assert_eq!(config.frame_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let yaml = r#"
frame_timeout_ms: 200
frame_target: 1000
max_reconnect_attempts: 12
require_same_device: false
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.frame_timeout(), Duration::from_millis(200));
        assert_eq!(config.frame_target, Some(1000));
        assert_eq!(config.max_reconnect_attempts, Some(12));
        assert!(!config.require_same_device);
        assert_eq!(config.consumers, 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_yaml_str("exposure_us: 500\n").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "consumers: 0",
            "queue_capacity: 0",
            "frame_timeout_ms: 0",
            "discovery_timeout_ms: 0",
            "frame_target: 0",
            "max_reconnect_attempts: 0",
        ] {
            let err = PipelineConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, PipelineError::Config { .. }), "{yaml} gave {err:?}");
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PipelineConfig::from_file("/nonexistent/framelink.yaml").unwrap_err();
        match err {
            PipelineError::File { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/framelink.yaml"));
            }
            other => panic!("Expected File error, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = PipelineConfig { consumers: 3, queue_capacity: Some(8), ..Default::default() };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
