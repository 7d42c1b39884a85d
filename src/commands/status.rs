//! Status command handler: one snapshot of every monitored quantity.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::*;

use crate::core::panel::{PanelRuntime, Payload, Sample};

use super::panel::load_config;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Execute the status command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let registry = config.registry().context("Invalid configuration")?;
    let json_output = matches.get_flag("json");

    let runtime = PanelRuntime::with_registry(&registry).context("Failed to start panel runtime")?;

    // Give every quantity one chance to report: first ticks run immediately,
    // so a full snapshot normally arrives well inside the bound.
    let deadline = Instant::now() + registry.max_timeout() + Duration::from_secs(2);
    loop {
        let snapshot = runtime.snapshot();
        let all_reported = runtime
            .quantities()
            .iter()
            .all(|q| snapshot.contains_key(q));
        if all_reported || Instant::now() >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    let mut samples: Vec<_> = runtime.snapshot().into_values().collect();
    samples.sort_by(|a, b| a.quantity.cmp(&b.quantity));

    if json_output {
        let samples: Vec<&Sample> = samples.iter().map(|s| s.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&samples)?);
    } else {
        print_samples(&runtime, &samples);
    }

    runtime.shutdown();
    Ok(())
}

fn print_samples(runtime: &PanelRuntime, samples: &[std::sync::Arc<Sample>]) {
    if samples.is_empty() {
        println!("{}", "No quantities reported yet.".yellow());
        return;
    }

    for sample in samples {
        let name = format!("{:<16}", sample.quantity.to_string());
        match (sample.latest_known(), sample.failure()) {
            (Some((payload, _)), None) => {
                println!("  {} {}", name.cyan().bold(), format_payload(payload).white());
            }
            (Some((payload, _)), Some(kind)) => {
                println!(
                    "  {} {} {}",
                    name.cyan().bold(),
                    format_payload(payload).white(),
                    format!("(stale, last refresh failed: {})", kind).yellow()
                );
            }
            (None, Some(kind)) => {
                let detail = if runtime.is_disabled(&sample.quantity) {
                    format!("unavailable on this host ({})", kind)
                } else {
                    format!("failed: {}", kind)
                };
                println!("  {} {}", name.cyan().bold(), detail.red());
            }
            (None, None) => {
                println!("  {} {}", name.cyan().bold(), "no data".dimmed());
            }
        }
    }
}

fn format_payload(payload: &Payload) -> String {
    match payload {
        Payload::Percent(v) => format!("{:.1}%", v),
        Payload::Scalar(v) => format!("{:.0}%", v * 100.0),
        Payload::Weather(report) => format!(
            "{} {:.1}°, {}",
            report.city, report.temp_c, report.description
        ),
        Payload::Headlines(headlines) => match headlines.first() {
            Some(first) => format!("{} headlines, latest: {}", headlines.len(), first.title),
            None => "no headlines".to_string(),
        },
    }
}
