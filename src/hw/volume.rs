//! Master volume control through PulseAudio / PipeWire's `pactl`.

use std::path::PathBuf;
use std::process::Command;

use super::ControlAdapter;
use crate::core::panel::Payload;
use crate::error::{ControlError, Result};

const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

/// Default audio sink volume as a unit scalar (0..=1).
///
/// The `pactl` binary is located once at startup; hosts without it report
/// Unsupported. Sink lookups and parse problems are transient: the sound
/// server may still be starting or the default sink may be switching.
pub struct VolumeControl {
    pactl: Option<PathBuf>,
}

impl VolumeControl {
    pub fn new() -> Self {
        let pactl = which::which("pactl").ok();
        match &pactl {
            Some(path) => log::debug!("pactl: {}", path.display()),
            None => log::debug!("pactl not found"),
        }
        Self { pactl }
    }

    fn pactl(&self) -> Result<&PathBuf> {
        self.pactl.as_ref().ok_or_else(|| {
            ControlError::unsupported("pactl not found; volume control unavailable")
        })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(self.pactl()?).args(args).output()?;
        if !output.status.success() {
            return Err(ControlError::transient(format!(
                "pactl {} exited with {}",
                args.first().unwrap_or(&""),
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the first percentage token from `pactl get-sink-volume` output,
/// e.g. `Volume: front-left: 39321 /  60% / -13.31 dB, ...` -> 60.
fn parse_volume_percent(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .filter_map(|token| token.strip_suffix('%'))
        .find_map(|token| token.parse::<u32>().ok())
}

impl ControlAdapter for VolumeControl {
    fn read(&self) -> Result<Payload> {
        let output = self.run(&["get-sink-volume", DEFAULT_SINK])?;
        let percent = parse_volume_percent(&output).ok_or_else(|| {
            ControlError::transient("could not parse pactl sink volume output")
        })?;
        Ok(Payload::Scalar((percent as f64 / 100.0).clamp(0.0, 1.0)))
    }

    fn write(&self, value: f64) -> Result<()> {
        let scalar = value.clamp(0.0, 1.0);
        let percent = (scalar * 100.0).round() as u32;
        self.run(&["set-sink-volume", DEFAULT_SINK, &format!("{}%", percent)])?;
        log::debug!("volume set to {}%", percent);
        Ok(())
    }
}
