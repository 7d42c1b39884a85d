// NCP Library - Public API

// Re-export error types
pub mod error;
pub use error::{ControlError, FailureKind, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod feeds;
pub mod hw;
pub mod ui;

// Re-export commonly used types
pub use crate::core::config::PanelConfig;
pub use crate::core::panel::{PanelRuntime, QuantityId, Sample};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
