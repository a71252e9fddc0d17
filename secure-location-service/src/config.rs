use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use secure_location_common::{AccuracyClass, PowerClass, ProviderProperties};

use crate::sim::{KnownPlace, RoutePoint};

/// Upper bound for the max age and update interval, one week
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Freshness and scheduling settings of the location service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Samples at least this old are rejected as stale
    #[serde(default = "default_max_age_minutes")]
    pub max_age_minutes: u64,

    /// Delay between listening cycles once a sample has been cached
    #[serde(default = "default_update_interval_minutes")]
    pub update_interval_minutes: u64,

    /// Minimum time between fixes requested from a provider
    #[serde(default = "default_min_update_time_secs")]
    pub min_update_time_secs: u64,

    /// Minimum distance between fixes requested from a provider
    #[serde(default)]
    pub min_update_distance_m: f32,
}

fn default_max_age_minutes() -> u64 {
    10
}

fn default_update_interval_minutes() -> u64 {
    10
}

fn default_min_update_time_secs() -> u64 {
    30
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_age_minutes: default_max_age_minutes(),
            update_interval_minutes: default_update_interval_minutes(),
            min_update_time_secs: default_min_update_time_secs(),
            min_update_distance_m: 0.0,
        }
    }
}

impl LocationConfig {
    /// Reject intervals the scheduler cannot honor
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_INTERVAL_MINUTES).contains(&self.max_age_minutes),
            "max_age_minutes must be between 1 and {}, got {}",
            MAX_INTERVAL_MINUTES,
            self.max_age_minutes
        );
        anyhow::ensure!(
            (1..=MAX_INTERVAL_MINUTES).contains(&self.update_interval_minutes),
            "update_interval_minutes must be between 1 and {}, got {}",
            MAX_INTERVAL_MINUTES,
            self.update_interval_minutes
        );
        anyhow::ensure!(
            self.min_update_time_secs <= MAX_INTERVAL_MINUTES * 60,
            "min_update_time_secs must be at most {}, got {}",
            MAX_INTERVAL_MINUTES * 60,
            self.min_update_time_secs
        );
        anyhow::ensure!(
            self.min_update_distance_m.is_finite() && self.min_update_distance_m >= 0.0,
            "min_update_distance_m must be a non-negative number, got {}",
            self.min_update_distance_m
        );
        Ok(())
    }

    /// Clamped to [`MAX_INTERVAL_MINUTES`]
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.max_age_minutes.min(MAX_INTERVAL_MINUTES) as i64)
    }

    /// Clamped to [`MAX_INTERVAL_MINUTES`]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes.min(MAX_INTERVAL_MINUTES) * 60)
    }

    pub fn min_update_time(&self) -> Duration {
        Duration::from_secs(self.min_update_time_secs)
    }
}

/// Description of the simulated device the demo runs against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Initial state of the mock location developer setting
    #[serde(default)]
    pub mock_location: bool,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderProperties>,

    /// Addresses known to the simulated geocoder
    #[serde(default)]
    pub places: Vec<KnownPlace>,

    /// Fixes replayed by the simulated hardware, in order, looping
    #[serde(default)]
    pub route: Vec<RoutePoint>,

    #[serde(default = "default_fix_interval_secs")]
    pub fix_interval_secs: u64,

    /// Make every geocoder lookup fail with an I/O error
    #[serde(default)]
    pub geocoder_offline: bool,
}

fn default_providers() -> Vec<ProviderProperties> {
    let mut gps = ProviderProperties::new("gps", AccuracyClass::Fine, PowerClass::High);
    gps.supports_altitude = true;
    gps.supports_bearing = true;
    gps.supports_speed = true;

    vec![
        ProviderProperties::new("network", AccuracyClass::Coarse, PowerClass::Low),
        gps,
    ]
}

fn default_fix_interval_secs() -> u64 {
    30
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mock_location: false,
            providers: default_providers(),
            places: Vec::new(),
            route: Vec::new(),
            fix_interval_secs: default_fix_interval_secs(),
            geocoder_offline: false,
        }
    }
}

impl DeviceConfig {
    pub fn fix_interval(&self) -> Duration {
        Duration::from_secs(self.fix_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub device: DeviceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            location: LocationConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;

        config
            .location
            .validate()
            .with_context(|| format!("Invalid [location] settings in '{}'", path.display()))?;

        Ok(config)
    }
}

pub static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Load `path` into [`CONFIG`]. A missing file yields the built-in defaults.
pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<&'static AppConfig> {
    let path = path.as_ref();
    let config = if path.exists() {
        AppConfig::load(path)?
    } else {
        AppConfig::default()
    };

    Ok(CONFIG.get_or_init(|| config))
}
