//! Configuration management for slidewin.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SlidewinError};

/// Main configuration for slidewin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlidewinConfig {
    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Traffic simulation configuration
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Sliding window limiter configuration.
///
/// Values are kept raw here and validated when a limiter is built from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Length of the trailing window in seconds
    #[serde(default = "default_window_size_secs")]
    pub window_size_secs: f64,

    /// Maximum admitted events per key within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_size_secs: default_window_size_secs(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_window_size_secs() -> f64 {
    10.0
}

fn default_max_requests() -> u64 {
    1
}

impl LimiterConfig {
    /// The window size as a [`Duration`].
    ///
    /// Negative, NaN and infinite values are rejected rather than clamped.
    pub fn window_size(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.window_size_secs).map_err(|e| {
            SlidewinError::Config(format!(
                "invalid window_size_secs {}: {}",
                self.window_size_secs, e
            ))
        })
    }
}

/// Synthetic traffic configuration for the simulation driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Messages sent per batch
    #[serde(default = "default_messages")]
    pub messages: u32,

    /// Number of distinct users the messages are spread over
    #[serde(default = "default_users")]
    pub users: u32,

    /// Number of batches
    #[serde(default = "default_batches")]
    pub batches: u32,

    /// Lower bound of the random pause between messages
    #[serde(default = "default_min_pause_ms")]
    pub min_pause_ms: u64,

    /// Upper bound of the random pause between messages
    #[serde(default = "default_max_pause_ms")]
    pub max_pause_ms: u64,

    /// Pause between two batches
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            users: default_users(),
            batches: default_batches(),
            min_pause_ms: default_min_pause_ms(),
            max_pause_ms: default_max_pause_ms(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

fn default_messages() -> u32 {
    10
}

fn default_users() -> u32 {
    5
}

fn default_batches() -> u32 {
    2
}

fn default_min_pause_ms() -> u64 {
    100
}

fn default_max_pause_ms() -> u64 {
    1000
}

fn default_batch_pause_ms() -> u64 {
    4000
}

impl SimulationConfig {
    /// Check that the simulation can actually run with these settings.
    pub fn validate(&self) -> Result<()> {
        if self.users == 0 {
            return Err(SlidewinError::Config(
                "simulation.users must be at least 1".to_string(),
            ));
        }
        if self.min_pause_ms > self.max_pause_ms {
            return Err(SlidewinError::Config(format!(
                "simulation.min_pause_ms ({}) exceeds max_pause_ms ({})",
                self.min_pause_ms, self.max_pause_ms
            )));
        }
        Ok(())
    }
}

impl SlidewinConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SlidewinError::Config(format!("Failed to parse configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SlidewinConfig::default();
        assert_eq!(config.limiter.window_size_secs, 10.0);
        assert_eq!(config.limiter.max_requests, 1);
        assert_eq!(config.simulation.messages, 10);
        assert_eq!(config.simulation.users, 5);
        assert_eq!(config.simulation.batches, 2);
        assert_eq!(config.simulation.batch_pause_ms, 4000);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
limiter:
  max_requests: 3
simulation:
  users: 2
"#;
        let config = SlidewinConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.max_requests, 3);
        assert_eq!(config.limiter.window_size_secs, 10.0);
        assert_eq!(config.simulation.users, 2);
        assert_eq!(config.simulation.messages, 10);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = SlidewinConfig::from_yaml("limiter: [1, 2");
        assert!(matches!(result, Err(SlidewinError::Config(_))));
    }

    #[test]
    fn test_window_size_conversion() {
        let config = LimiterConfig {
            window_size_secs: 2.5,
            max_requests: 1,
        };
        assert_eq!(config.window_size().unwrap(), Duration::from_millis(2500));

        let zero = LimiterConfig {
            window_size_secs: 0.0,
            max_requests: 1,
        };
        assert_eq!(zero.window_size().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_window_size_rejects_invalid_values() {
        for secs in [-1.0, f64::NAN, f64::INFINITY] {
            let config = LimiterConfig {
                window_size_secs: secs,
                max_requests: 1,
            };
            assert!(matches!(config.window_size(), Err(SlidewinError::Config(_))));
        }
    }

    #[test]
    fn test_simulation_validation() {
        assert!(SimulationConfig::default().validate().is_ok());

        let no_users = SimulationConfig {
            users: 0,
            ..SimulationConfig::default()
        };
        assert!(no_users.validate().is_err());

        let inverted = SimulationConfig {
            min_pause_ms: 500,
            max_pause_ms: 100,
            ..SimulationConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let result = SlidewinConfig::from_file("/nonexistent/slidewin.yaml");
        assert!(matches!(result, Err(SlidewinError::Io(_))));
    }
}
