//! Set command handler: immediate one-shot control writes.
//!
//! Writes go straight to the hardware adapter and the new value is read back
//! for confirmation; no coordinator runtime is started.

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use colored::*;

use crate::core::panel::Payload;
use crate::hw::{BacklightControl, ControlAdapter, VolumeControl};

/// Execute the set command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let quantity = matches
        .get_one::<String>("quantity")
        .expect("quantity is required");
    let value = *matches.get_one::<f64>("value").expect("value is required");

    match quantity.as_str() {
        "brightness" => {
            let control = BacklightControl::new();
            apply(&control, "brightness", value)
        }
        "volume" => {
            let control = VolumeControl::new();
            // Accept either a percentage (5..=100) or a unit scalar.
            let scalar = if value > 1.0 { value / 100.0 } else { value };
            apply(&control, "volume", scalar)
        }
        other => Err(anyhow!(
            "unknown control '{}' (expected 'brightness' or 'volume')",
            other
        )),
    }
}

fn apply(control: &dyn ControlAdapter, name: &str, value: f64) -> Result<()> {
    control
        .write(value)
        .map_err(|e| anyhow!("failed to set {}: {}", name, e))?;

    match control.read() {
        Ok(Payload::Percent(v)) => {
            println!("{} {}", format!("{} set to", name).white(), format!("{:.0}%", v).cyan().bold());
        }
        Ok(Payload::Scalar(v)) => {
            println!(
                "{} {}",
                format!("{} set to", name).white(),
                format!("{:.0}%", v * 100.0).cyan().bold()
            );
        }
        Ok(_) => println!("{}", format!("{} updated", name).green()),
        Err(e) => println!(
            "{}",
            format!("{} written, but read-back failed: {}", name, e).yellow()
        ),
    }
    Ok(())
}
