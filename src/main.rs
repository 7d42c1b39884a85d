use anyhow::Result;
use clap::{Arg, Command};

use ncp::commands;

fn main() -> Result<()> {
    ncp::init_logging();

    let matches = Command::new("ncp")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Desktop control panel: hardware controls, live telemetry, and external data feeds")
        .subcommand(
            Command::new("panel")
                .about("Run the interactive dashboard")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("PATH")
                        .help("Path to a config file (defaults to the user config directory)"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Print one snapshot of every monitored quantity")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("PATH")
                        .help("Path to a config file (defaults to the user config directory)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the snapshot as JSON (for scripting)")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("set")
                .about("Set a hardware control immediately")
                .arg(
                    Arg::new("quantity")
                        .help("Control to set: brightness or volume")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("value")
                        .help("Target value (brightness 0-100, volume 0-100 or 0.0-1.0)")
                        .required(true)
                        .value_parser(clap::value_parser!(f64))
                        .index(2),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("panel", sub_matches)) => commands::panel::execute(sub_matches),
        Some(("status", sub_matches)) => commands::status::execute(sub_matches),
        Some(("set", sub_matches)) => commands::set::execute(sub_matches),
        _ => {
            println!("Welcome to ncp!");
            println!("Use 'ncp --help' for more information.");
            Ok(())
        }
    }
}
