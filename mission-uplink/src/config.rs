use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::pacing::FixedDelay;

/// Default MAVProxy / GCS UDP port.
pub const DEFAULT_PORT: u16 = 14550;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    pub ground_station: GroundStationConfig,
    pub pacing: PacingConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroundStationConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GroundStationConfig {
    fn default() -> Self {
        GroundStationConfig { host: "127.0.0.1".to_string(), port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub after_count_ms: u64,
    pub between_items_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig { after_count_ms: 100, between_items_ms: 50 }
    }
}

impl PacingConfig {
    pub fn to_policy(&self) -> FixedDelay {
        FixedDelay {
            after_count: Duration::from_millis(self.after_count_ms),
            between_items: Duration::from_millis(self.between_items_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig { interval_ms: 1000 }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl UplinkConfig {
    /// Read and validate a TOML config file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: UplinkConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ground_station.host.trim().is_empty() {
            return Err(ConfigError::Invalid("ground_station.host is empty".into()));
        }
        if self.ground_station.port == 0 {
            return Err(ConfigError::Invalid("ground_station.port must be non-zero".into()));
        }
        if self.telemetry.interval_ms == 0 {
            return Err(ConfigError::Invalid("telemetry.interval_ms must be non-zero".into()));
        }
        Ok(())
    }
}
