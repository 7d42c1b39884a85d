//! Panel configuration, loaded once at startup.
//!
//! The config file is user-edited JSON (API keys, city, cadence overrides)
//! at `<config_dir>/ncp/config.json`. A missing file yields the defaults; a
//! malformed file or a malformed entry is rejected at load time, never at
//! runtime.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::panel::QuantityId;
use crate::core::registry::{QuantitySpec, RefreshPolicy, Registry, RegistryEntry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub weather: Option<WeatherConfig>,
    #[serde(default)]
    pub news: Option<NewsConfig>,
}

/// Brightness and volume control cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsConfig {
    #[serde(default = "default_true")]
    pub brightness: bool,
    #[serde(default = "default_true")]
    pub volume: bool,
    #[serde(default = "default_control_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_control_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            brightness: true,
            volume: true,
            interval_secs: default_control_interval_secs(),
            timeout_secs: default_control_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_cpu_interval_secs")]
    pub cpu_interval_secs: u64,
    #[serde(default = "default_memory_interval_secs")]
    pub memory_interval_secs: u64,
    #[serde(default = "default_battery_interval_secs")]
    pub battery_interval_secs: u64,
    #[serde(default = "default_telemetry_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            cpu_interval_secs: default_cpu_interval_secs(),
            memory_interval_secs: default_memory_interval_secs(),
            battery_interval_secs: default_battery_interval_secs(),
            timeout_secs: default_telemetry_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub city: String,
    pub api_key: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_weather_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_feed_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_feed_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    pub api_key: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_max_headlines")]
    pub max_headlines: usize,
    #[serde(default = "default_news_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_feed_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_feed_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_control_interval_secs() -> u64 {
    5
}
fn default_control_timeout_secs() -> u64 {
    2
}
fn default_cpu_interval_secs() -> u64 {
    2
}
fn default_memory_interval_secs() -> u64 {
    2
}
fn default_battery_interval_secs() -> u64 {
    10
}
fn default_telemetry_timeout_secs() -> u64 {
    1
}
fn default_units() -> String {
    "metric".to_string()
}
fn default_country() -> String {
    "us".to_string()
}
fn default_max_headlines() -> usize {
    10
}
fn default_weather_interval_secs() -> u64 {
    600
}
fn default_news_interval_secs() -> u64 {
    900
}
fn default_feed_timeout_secs() -> u64 {
    10
}
fn default_feed_retry_limit() -> u32 {
    3
}
fn default_feed_backoff_ms() -> u64 {
    2_000
}

impl PanelConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            return Ok(PanelConfig::default());
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;
        Ok(config_dir.join("ncp").join("config.json"))
    }

    /// Build the validated startup registry. Every enabled quantity gets one
    /// entry; entries that fail validation abort the load.
    pub fn registry(&self) -> crate::error::Result<Registry> {
        let mut registry = Registry::new();

        let control_policy = RefreshPolicy::new(
            Duration::from_secs(self.controls.interval_secs),
            Duration::from_secs(self.controls.timeout_secs),
        )
        .with_retries(1, Duration::from_millis(500));

        if self.controls.brightness {
            registry.push(RegistryEntry {
                quantity: QuantityId::brightness(),
                policy: control_policy.clone(),
                spec: QuantitySpec::Brightness,
            })?;
        }
        if self.controls.volume {
            registry.push(RegistryEntry {
                quantity: QuantityId::volume(),
                policy: control_policy,
                spec: QuantitySpec::Volume,
            })?;
        }

        let telemetry_timeout = Duration::from_secs(self.telemetry.timeout_secs);
        registry.push(RegistryEntry {
            quantity: QuantityId::cpu(),
            policy: RefreshPolicy::new(
                Duration::from_secs(self.telemetry.cpu_interval_secs),
                telemetry_timeout,
            ),
            spec: QuantitySpec::Cpu,
        })?;
        registry.push(RegistryEntry {
            quantity: QuantityId::memory(),
            policy: RefreshPolicy::new(
                Duration::from_secs(self.telemetry.memory_interval_secs),
                telemetry_timeout,
            ),
            spec: QuantitySpec::Memory,
        })?;
        registry.push(RegistryEntry {
            quantity: QuantityId::battery(),
            policy: RefreshPolicy::new(
                Duration::from_secs(self.telemetry.battery_interval_secs),
                telemetry_timeout,
            ),
            spec: QuantitySpec::Battery,
        })?;

        if let Some(weather) = &self.weather {
            registry.push(RegistryEntry {
                quantity: QuantityId::weather(&weather.city),
                policy: RefreshPolicy::new(
                    Duration::from_secs(weather.interval_secs),
                    Duration::from_secs(weather.timeout_secs),
                )
                .with_retries(weather.retry_limit, Duration::from_millis(weather.backoff_ms)),
                spec: QuantitySpec::Weather {
                    city: weather.city.clone(),
                    api_key: weather.api_key.clone(),
                    units: weather.units.clone(),
                },
            })?;
        }

        if let Some(news) = &self.news {
            registry.push(RegistryEntry {
                quantity: QuantityId::news(),
                policy: RefreshPolicy::new(
                    Duration::from_secs(news.interval_secs),
                    Duration::from_secs(news.timeout_secs),
                )
                .with_retries(news.retry_limit, Duration::from_millis(news.backoff_ms)),
                spec: QuantitySpec::News {
                    api_key: news.api_key.clone(),
                    country: news.country.clone(),
                    max_headlines: news.max_headlines,
                },
            })?;
        }

        Ok(registry)
    }
}
