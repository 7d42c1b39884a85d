//! Startup registry: which quantities exist, how often they refresh, and
//! which endpoint/parameters back them. Entries are validated when the
//! registry is built; a malformed entry never reaches a running ticker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::panel::QuantityId;
use crate::error::{ControlError, Result};

/// Whether the first refresh runs immediately at start or after one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstTick {
    #[default]
    Immediate,
    AfterInterval,
}

/// Refresh cadence and failure budget for one quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Time between scheduled ticks.
    pub interval: Duration,
    /// Deadline for a single attempt. Must be shorter than `interval` so a
    /// stalled call cannot overrun its own next tick.
    pub timeout: Duration,
    /// Additional attempts within the same tick after a retryable failure.
    pub retry_limit: u32,
    /// Initial backoff before the first retry; doubles per attempt.
    pub backoff: Duration,
    pub first_tick: FirstTick,
}

impl RefreshPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            retry_limit: 0,
            backoff: Duration::from_millis(500),
            first_tick: FirstTick::Immediate,
        }
    }

    pub fn with_retries(mut self, retry_limit: u32, backoff: Duration) -> Self {
        self.retry_limit = retry_limit;
        self.backoff = backoff;
        self
    }

    pub fn delayed_start(mut self) -> Self {
        self.first_tick = FirstTick::AfterInterval;
        self
    }

    pub fn validate(&self, quantity: &QuantityId) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ControlError::registry(format!(
                "{}: refresh interval must be non-zero",
                quantity
            )));
        }
        if self.timeout.is_zero() {
            return Err(ControlError::registry(format!(
                "{}: attempt timeout must be non-zero",
                quantity
            )));
        }
        if self.timeout >= self.interval {
            return Err(ControlError::registry(format!(
                "{}: attempt timeout ({:?}) must be shorter than the refresh interval ({:?})",
                quantity, self.timeout, self.interval
            )));
        }
        if self.backoff >= self.interval {
            return Err(ControlError::registry(format!(
                "{}: retry backoff ({:?}) must be shorter than the refresh interval ({:?})",
                quantity, self.backoff, self.interval
            )));
        }
        Ok(())
    }
}

/// What backs a registered quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantitySpec {
    Brightness,
    Volume,
    Cpu,
    Memory,
    Battery,
    Weather {
        city: String,
        api_key: String,
        units: String,
    },
    News {
        api_key: String,
        country: String,
        max_headlines: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub quantity: QuantityId,
    pub policy: RefreshPolicy,
    pub spec: QuantitySpec,
}

impl RegistryEntry {
    pub fn validate(&self) -> Result<()> {
        self.policy.validate(&self.quantity)?;
        match &self.spec {
            QuantitySpec::Weather { city, api_key, .. } => {
                if city.trim().is_empty() {
                    return Err(ControlError::registry("weather: city must not be empty"));
                }
                if api_key.trim().is_empty() {
                    return Err(ControlError::registry("weather: api_key must not be empty"));
                }
            }
            QuantitySpec::News {
                api_key,
                max_headlines,
                ..
            } => {
                if api_key.trim().is_empty() {
                    return Err(ControlError::registry("news: api_key must not be empty"));
                }
                if *max_headlines == 0 {
                    return Err(ControlError::registry("news: max_headlines must be at least 1"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Ordered list of validated registry entries, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RegistryEntry) -> Result<()> {
        entry.validate()?;
        if self.entries.iter().any(|e| e.quantity == entry.quantity) {
            return Err(ControlError::registry(format!(
                "duplicate quantity: {}",
                entry.quantity
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest per-attempt timeout across all entries; the coordinator's
    /// stop grace period is derived from it.
    pub fn max_timeout(&self) -> Duration {
        self.entries
            .iter()
            .map(|e| e.policy.timeout)
            .max()
            .unwrap_or(Duration::from_secs(1))
    }
}
