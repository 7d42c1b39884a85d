//! Terminal dashboard for the control panel.
//!
//! A read-only consumer of the coordinator: it renders cached Samples and
//! issues immediate control writes. It never blocks on hardware or the
//! network.

mod app;
mod event_handler;
mod render;
mod widgets;

pub use app::{run_panel_app, PanelApp};
pub use event_handler::PanelEvent;
