//! Read-only system telemetry: CPU, memory, battery.

use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::TelemetrySampler;
use crate::core::panel::Payload;
use crate::error::{ControlError, Result};

/// Global CPU usage in percent.
pub struct CpuSampler {
    system: Mutex<System>,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        // Prime the usage baseline; deltas are accurate from the second
        // refresh onwards (sysinfo measures between refreshes).
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySampler for CpuSampler {
    fn sample(&self) -> Result<Payload> {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        Ok(Payload::Percent(system.global_cpu_usage() as f64))
    }
}

/// Memory usage in percent of total.
pub struct MemorySampler {
    system: Mutex<System>,
}

impl MemorySampler {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySampler for MemorySampler {
    fn sample(&self) -> Result<Payload> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        let used = system.used_memory();
        if total == 0 {
            return Err(ControlError::transient("total memory reported as zero"));
        }
        Ok(Payload::Percent(used as f64 / total as f64 * 100.0))
    }
}

/// Wrapper that asserts `Send`/`Sync` for `battery::Manager`.
///
/// On Linux `battery::Manager` holds a non-atomic `Rc` internally, so it is
/// neither `Send` nor `Sync`. Here it lives permanently behind a `Mutex` and
/// is only ever accessed under that lock (one thread at a time), so sharing it
/// across threads is sound and `BatterySampler` can satisfy the
/// `TelemetrySampler: Send + Sync` bound.
struct SyncManager(battery::Manager);

// SAFETY: the inner `Manager` is only ever accessed under `BatterySampler`'s
// `Mutex`, never concurrently, so its internal `Rc` is never touched from two
// threads at the same time.
unsafe impl Send for SyncManager {}
unsafe impl Sync for SyncManager {}

/// Battery state of charge in percent.
///
/// Hosts without a battery (or without the platform battery service) report
/// Unsupported, which permanently disables the quantity.
pub struct BatterySampler {
    manager: Option<Mutex<SyncManager>>,
}

impl BatterySampler {
    pub fn new() -> Self {
        let manager = match battery::Manager::new() {
            Ok(manager) => Some(Mutex::new(SyncManager(manager))),
            Err(e) => {
                log::debug!("battery service unavailable: {}", e);
                None
            }
        };
        Self { manager }
    }
}

impl Default for BatterySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySampler for BatterySampler {
    fn sample(&self) -> Result<Payload> {
        let manager = self
            .manager
            .as_ref()
            .ok_or_else(|| ControlError::unsupported("battery service unavailable"))?;
        let manager = manager.lock();
        let mut batteries = manager
            .0
            .batteries()
            .map_err(|e| ControlError::transient(format!("battery enumeration failed: {}", e)))?;
        match batteries.next() {
            Some(Ok(battery)) => {
                let percent = battery.state_of_charge().value as f64 * 100.0;
                Ok(Payload::Percent(percent.clamp(0.0, 100.0)))
            }
            Some(Err(e)) => Err(ControlError::transient(format!(
                "battery read failed: {}",
                e
            ))),
            None => Err(ControlError::unsupported("no battery present on this host")),
        }
    }
}
