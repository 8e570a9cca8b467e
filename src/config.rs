use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::{
    api::DEFAULT_BASE_URL,
    error::PollenError,
    pollen::{PollenKind, Thresholds},
};

/// Allowed range for the update interval, in minutes.
pub const MIN_UPDATE_INTERVAL_MINUTES: u64 = 5;
pub const MAX_UPDATE_INTERVAL_MINUTES: u64 = 240;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub location: LocationConfig,
    pub refresh: RefreshConfig,
    pub network: NetworkConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub thresholds: HashMap<String, Vec<f64>>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 52.52,
            longitude: 13.41,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub update_interval_minutes: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            update_interval_minutes: 30,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config files and `POLLEN__*` variables.
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("openmeteo-pollen");

        let builder = Self::defaults()?
            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Load from Environment variables (POLLEN__LOCATION__LATITUDE=...)
            .add_source(Environment::with_prefix("POLLEN").separator("__"));

        Self::finish(builder)
    }

    /// Load configuration from defaults and a single explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from(path.to_path_buf()).required(true));
        Self::finish(builder).with_context(|| format!("Failed to load {}", path.display()))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let location = LocationConfig::default();
        let refresh = RefreshConfig::default();
        let network = NetworkConfig::default();

        let builder = Config::builder()
            // 1. Load default values
            // Location
            .set_default("location.latitude", location.latitude)?
            .set_default("location.longitude", location.longitude)?
            // Refresh
            .set_default(
                "refresh.update_interval_minutes",
                refresh.update_interval_minutes as i64,
            )?
            // Network
            .set_default("network.request_timeout_secs", network.request_timeout_secs as i64)?
            .set_default("network.connect_timeout_secs", network.connect_timeout_secs as i64)?
            // API
            .set_default("api.base_url", DEFAULT_BASE_URL)?;

        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let s = builder.build()?;
        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their allowed ranges.
    pub fn validate(&self) -> Result<()> {
        let minutes = self.refresh.update_interval_minutes;
        if !(MIN_UPDATE_INTERVAL_MINUTES..=MAX_UPDATE_INTERVAL_MINUTES).contains(&minutes) {
            anyhow::bail!(
                "refresh.update_interval_minutes must be between {} and {}, got {}",
                MIN_UPDATE_INTERVAL_MINUTES,
                MAX_UPDATE_INTERVAL_MINUTES,
                minutes
            );
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            anyhow::bail!("location.latitude out of range: {}", self.location.latitude);
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            anyhow::bail!("location.longitude out of range: {}", self.location.longitude);
        }
        if self.network.request_timeout_secs == 0 {
            anyhow::bail!("network.request_timeout_secs must be positive");
        }
        self.threshold_tables()?;
        Ok(())
    }

    /// Threshold tables with configured overrides applied.
    pub fn threshold_tables(&self) -> Result<Thresholds> {
        let overrides = self
            .thresholds
            .iter()
            .map(|(key, bounds)| key.parse::<PollenKind>().map(|kind| (kind, bounds.clone())))
            .collect::<Result<HashMap<_, _>, PollenError>>()
            .context("Invalid threshold configuration")?;
        Thresholds::with_overrides(&overrides).context("Invalid threshold configuration")
    }
}
