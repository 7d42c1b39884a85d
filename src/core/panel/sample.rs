//! Data model for monitored quantities: identifiers, payloads, Samples.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Identifies one monitored or controllable value.
///
/// Unique within the coordinator's registry. External-data quantities are
/// parameterized, e.g. `weather:London`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantityId(String);

impl QuantityId {
    pub fn new<S: Into<String>>(name: S) -> Self {
        QuantityId(name.into())
    }

    pub fn brightness() -> Self {
        QuantityId::new("brightness")
    }

    pub fn volume() -> Self {
        QuantityId::new("volume")
    }

    pub fn cpu() -> Self {
        QuantityId::new("cpu")
    }

    pub fn memory() -> Self {
        QuantityId::new("memory")
    }

    pub fn battery() -> Self {
        QuantityId::new("battery")
    }

    pub fn weather(city: &str) -> Self {
        QuantityId::new(format!("weather:{}", city))
    }

    pub fn news() -> Self {
        QuantityId::new("news")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuantityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current weather for the configured city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp_c: f64,
    pub feels_like_c: Option<f64>,
    pub description: String,
    pub humidity_pct: Option<u8>,
    pub wind_speed_mps: Option<f64>,
}

/// One news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: Option<String>,
}

/// Typed payload of a successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Percentage in 0..=100 (brightness, cpu, memory, battery)
    Percent(f64),
    /// Unit scalar in 0..=1 (volume)
    Scalar(f64),
    Weather(WeatherReport),
    Headlines(Vec<Headline>),
}

impl Payload {
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Payload::Percent(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Payload::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// Outcome of one completed tick; exactly one of value or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    Ready(Payload),
    Failed(FailureKind),
}

impl SampleValue {
    pub fn is_ready(&self) -> bool {
        matches!(self, SampleValue::Ready(_))
    }
}

/// Last successful payload, carried across failed refreshes so consumers
/// can prefer stale data over no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastGood {
    pub payload: Payload,
    pub timestamp_ms: i64,
}

/// Latest observation for one quantity.
///
/// `version` starts at 1 and increases strictly with every refresh of the
/// quantity, successful or failed. Observers compare versions instead of
/// payloads to detect change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub quantity: QuantityId,
    pub value: SampleValue,
    pub timestamp_ms: i64,
    pub version: u64,
    pub last_good: Option<LastGood>,
}

impl Sample {
    /// Payload of this refresh, if it succeeded.
    pub fn current(&self) -> Option<&Payload> {
        match &self.value {
            SampleValue::Ready(payload) => Some(payload),
            SampleValue::Failed(_) => None,
        }
    }

    /// Most recent known payload with its timestamp: this refresh's value,
    /// or the carried last-good value when this refresh failed.
    pub fn latest_known(&self) -> Option<(&Payload, i64)> {
        match &self.value {
            SampleValue::Ready(payload) => Some((payload, self.timestamp_ms)),
            SampleValue::Failed(_) => self
                .last_good
                .as_ref()
                .map(|lg| (&lg.payload, lg.timestamp_ms)),
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match &self.value {
            SampleValue::Ready(_) => None,
            SampleValue::Failed(kind) => Some(*kind),
        }
    }
}

/// Change notification delivered to subscribers. Carries the version, not
/// the payload; observers re-read the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub quantity: QuantityId,
    pub version: u64,
}
