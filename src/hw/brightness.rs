//! Display backlight control via the kernel backlight class.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::ControlAdapter;
use crate::core::panel::Payload;
use crate::error::{ControlError, Result};

/// Backlight device handle, discovered once at startup.
///
/// Reads and writes percentages in 0..=100, scaled to the device's own raw
/// range. Hosts without a backlight class device report Unsupported.
pub struct BacklightControl {
    device: Option<PathBuf>,
}

impl BacklightControl {
    pub fn new() -> Self {
        let device = discover();
        match &device {
            Some(path) => log::debug!("backlight device: {}", path.display()),
            None => log::debug!("no backlight device found"),
        }
        Self { device }
    }

    fn device(&self) -> Result<&Path> {
        self.device
            .as_deref()
            .ok_or_else(|| ControlError::unsupported("no backlight device on this host"))
    }
}

impl Default for BacklightControl {
    fn default() -> Self {
        Self::new()
    }
}

fn discover() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        fs::read_dir("/sys/class/backlight")
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .next()
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn read_sysfs_u64(path: &Path) -> Result<u64> {
    let text = fs::read_to_string(path).map_err(|e| map_io_error(path, e))?;
    text.trim().parse::<u64>().map_err(|_| {
        ControlError::transient(format!("unparseable value in {}", path.display()))
    })
}

fn map_io_error(path: &Path, err: io::Error) -> ControlError {
    match err.kind() {
        io::ErrorKind::NotFound => {
            ControlError::unsupported(format!("{} is missing", path.display()))
        }
        io::ErrorKind::PermissionDenied => {
            ControlError::transient(format!("permission denied for {}", path.display()))
        }
        _ => ControlError::transient(format!("{}: {}", path.display(), err)),
    }
}

impl ControlAdapter for BacklightControl {
    fn read(&self) -> Result<Payload> {
        let device = self.device()?;
        let raw = read_sysfs_u64(&device.join("brightness"))?;
        let max = read_sysfs_u64(&device.join("max_brightness"))?;
        if max == 0 {
            return Err(ControlError::transient(
                "backlight reports zero max brightness",
            ));
        }
        Ok(Payload::Percent(
            (raw as f64 / max as f64 * 100.0).round().clamp(0.0, 100.0),
        ))
    }

    fn write(&self, value: f64) -> Result<()> {
        let device = self.device()?;
        let percent = value.clamp(0.0, 100.0);
        let max = read_sysfs_u64(&device.join("max_brightness"))?;
        let raw = (percent / 100.0 * max as f64).round() as u64;
        let path = device.join("brightness");
        fs::write(&path, raw.to_string()).map_err(|e| map_io_error(&path, e))?;
        log::debug!("brightness set to {:.0}% (raw {})", percent, raw);
        Ok(())
    }
}
