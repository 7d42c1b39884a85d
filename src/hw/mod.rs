//! Hardware capabilities: controls (read/write) and read-only telemetry.
//!
//! Handles to hardware endpoints are constructed once at startup and
//! injected into the coordinator; they are never rebuilt per call.

mod brightness;
mod telemetry;
mod volume;

pub use brightness::BacklightControl;
pub use telemetry::{BatterySampler, CpuSampler, MemorySampler};
pub use volume::VolumeControl;

use crate::core::panel::Payload;
use crate::error::Result;

/// A controllable hardware capability.
///
/// `write` is idempotent from the coordinator's point of view: applying the
/// same value twice has the same effect as once. Writes are immediate,
/// synchronous, user-triggered calls; they are never routed through the
/// periodic refresh.
pub trait ControlAdapter: Send + Sync {
    fn read(&self) -> Result<Payload>;
    fn write(&self, value: f64) -> Result<()>;
}

/// A read-only system metric.
pub trait TelemetrySampler: Send + Sync {
    fn sample(&self) -> Result<Payload>;
}
