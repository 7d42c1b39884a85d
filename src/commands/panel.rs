//! Panel command handler.
//!
//! Starts the coordinator runtime and runs the terminal dashboard on top of
//! it. All refresh work happens on the coordinator's own threads; the
//! dashboard only reads cached Samples.

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::PanelConfig;
use crate::core::panel::PanelRuntime;
use crate::ui::panel_tui::run_panel_app;

/// Execute the panel command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let runtime = PanelRuntime::new(&config).context("Failed to start panel runtime")?;

    let result = run_panel_app(&runtime).context("Failed to run panel dashboard");

    // Stop tickers before reporting any dashboard error; shutdown is bounded
    // by the coordinator's grace period.
    runtime.shutdown();
    result
}

pub(crate) fn load_config(matches: &ArgMatches) -> Result<PanelConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => PanelConfig::load_from(std::path::Path::new(path)),
        None => PanelConfig::load(),
    }
}
