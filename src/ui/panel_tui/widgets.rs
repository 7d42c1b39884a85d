use ratatui::{prelude::*, widgets::Gauge};

/// Create a gauge with color based on value thresholds
pub fn colored_gauge<'a>(value: f64, label: String) -> Gauge<'a> {
    let color = match value {
        v if v < 50.0 => Color::Cyan,
        v if v < 75.0 => Color::LightYellow,
        v if v < 90.0 => Color::LightRed,
        _ => Color::Red,
    };

    Gauge::default()
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .ratio((value / 100.0).clamp(0.0, 1.0))
        .label(label)
}

/// Create a dimmed gauge for a quantity with no usable value
pub fn empty_gauge<'a>(label: &'a str) -> Gauge<'a> {
    Gauge::default()
        .gauge_style(Style::default().fg(Color::DarkGray).bg(Color::Black))
        .ratio(0.0)
        .label(label)
}

/// Format milliseconds-ago as a compact age string
pub fn format_age(age_ms: i64) -> String {
    let secs = (age_ms / 1_000).max(0);
    if secs >= 3_600 {
        format!("{}h{}m", secs / 3_600, (secs % 3_600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
