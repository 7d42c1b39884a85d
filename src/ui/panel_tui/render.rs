use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Sparkline, Wrap},
};

use crate::core::panel::{Payload, QuantityId, Sample};

use super::app::PanelApp;
use super::widgets::{colored_gauge, empty_gauge, format_age};

/// Main render function
pub fn render_ui(frame: &mut Frame, app: &PanelApp) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),      // Header
            Constraint::Length(3),      // Gauges row
            Constraint::Length(4),      // CPU / memory trend
            Constraint::Percentage(60), // Weather + news
            Constraint::Length(1),      // Footer
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    render_gauges(frame, chunks[1], app);
    render_trends(frame, chunks[2], app);
    render_feeds(frame, chunks[3], app);
    render_footer(frame, chunks[4]);

    if app.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let failures: Vec<String> = app
        .snapshot
        .values()
        .filter_map(|sample| {
            sample
                .failure()
                .map(|kind| format!("{}: {}", sample.quantity, kind))
        })
        .collect();

    let (status, color) = if failures.is_empty() {
        ("all quantities healthy".to_string(), Color::Cyan)
    } else {
        (failures.join(" │ "), Color::LightRed)
    };

    let title = format!(" ncp │ {} ", status);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    frame.render_widget(block, area);
}

fn render_gauges(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Percentage(20); 5])
        .split(area);

    let gauges = [
        (QuantityId::brightness(), "Brightness"),
        (QuantityId::volume(), "Volume"),
        (QuantityId::cpu(), "CPU"),
        (QuantityId::memory(), "Memory"),
        (QuantityId::battery(), "Battery"),
    ];

    for ((quantity, name), column) in gauges.iter().zip(columns.iter()) {
        render_quantity_gauge(frame, *column, app, quantity, name);
    }
}

fn render_quantity_gauge(
    frame: &mut Frame,
    area: Rect,
    app: &PanelApp,
    quantity: &QuantityId,
    name: &str,
) {
    let block = Block::default().title(name.to_string()).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.is_disabled(quantity) {
        frame.render_widget(empty_gauge("unavailable"), inner);
        return;
    }

    let Some(sample) = app.sample(quantity) else {
        frame.render_widget(empty_gauge("waiting..."), inner);
        return;
    };

    match gauge_percent(sample) {
        Some(percent) => {
            let label = match sample.failure() {
                // Stale data is preferred over no data; say how old it is.
                Some(_) => {
                    let age = sample
                        .latest_known()
                        .map(|(_, ts)| chrono::Utc::now().timestamp_millis() - ts)
                        .unwrap_or(0);
                    format!("{:.0}% (stale {})", percent, format_age(age))
                }
                None => format!("{:.0}%", percent),
            };
            frame.render_widget(colored_gauge(percent, label), inner);
        }
        None => {
            let label = sample
                .failure()
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "no data".to_string());
            frame.render_widget(empty_gauge("no data").label(label), inner);
        }
    }
}

/// Percent-equivalent value for the gauge row; volume scales 0..1 to 0..100.
fn gauge_percent(sample: &Sample) -> Option<f64> {
    let (payload, _) = sample.latest_known()?;
    match payload {
        Payload::Percent(v) => Some(*v),
        Payload::Scalar(v) => Some(v * 100.0),
        _ => None,
    }
}

fn render_trends(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let cpu_data: Vec<u64> = app.cpu_history.iter().copied().collect();
    let cpu = Sparkline::default()
        .block(Block::default().title("CPU trend").borders(Borders::ALL))
        .data(&cpu_data)
        .max(1_000)
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(cpu, columns[0]);

    let memory_data: Vec<u64> = app.memory_history.iter().copied().collect();
    let memory = Sparkline::default()
        .block(Block::default().title("Memory trend").borders(Borders::ALL))
        .data(&memory_data)
        .max(1_000)
        .style(Style::default().fg(Color::LightYellow));
    frame.render_widget(memory, columns[1]);
}

fn render_feeds(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    render_weather(frame, columns[0], app);
    render_news(frame, columns[1], app);
}

fn render_weather(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let weather_sample = app
        .snapshot
        .values()
        .find(|s| s.quantity.as_str().starts_with("weather:"));

    let block = Block::default().title("Weather").borders(Borders::ALL);

    let Some(sample) = weather_sample else {
        let text = Paragraph::new("not configured")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    if let Some((Payload::Weather(report), ts)) = sample.latest_known() {
        lines.push(Line::from(vec![
            Span::styled(report.city.clone(), Style::default().bold()),
            Span::raw(format!("  {:.1}°", report.temp_c)),
        ]));
        lines.push(Line::from(report.description.clone()));
        if let Some(feels) = report.feels_like_c {
            lines.push(Line::from(format!("feels like {:.1}°", feels)));
        }
        if let Some(humidity) = report.humidity_pct {
            lines.push(Line::from(format!("humidity {}%", humidity)));
        }
        if let Some(wind) = report.wind_speed_mps {
            lines.push(Line::from(format!("wind {:.1} m/s", wind)));
        }
        if sample.failure().is_some() {
            let age = chrono::Utc::now().timestamp_millis() - ts;
            lines.push(Line::styled(
                format!("stale ({} old)", format_age(age)),
                Style::default().fg(Color::LightRed),
            ));
        }
    } else if let Some(kind) = sample.failure() {
        lines.push(Line::styled(
            format!("unavailable: {}", kind),
            Style::default().fg(Color::LightRed),
        ));
    }

    let text = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(text, area);
}

fn render_news(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let block = Block::default().title("Headlines").borders(Borders::ALL);
    let news_sample = app.snapshot.get(&QuantityId::news());

    let Some(sample) = news_sample else {
        let text = Paragraph::new("not configured")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let Some((Payload::Headlines(headlines), _)) = sample.latest_known() else {
        let label = sample
            .failure()
            .map(|kind| format!("unavailable: {}", kind))
            .unwrap_or_else(|| "waiting...".to_string());
        let text = Paragraph::new(label)
            .style(Style::default().fg(Color::LightRed))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let items: Vec<ListItem> = headlines
        .iter()
        .skip(app.news_scroll.min(headlines.len().saturating_sub(1)))
        .map(|headline| {
            let mut spans = vec![Span::styled(
                headline.title.clone(),
                Style::default().bold(),
            )];
            if let Some(source) = &headline.source {
                spans.push(Span::styled(
                    format!("  — {}", source),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let footer = Paragraph::new(
        " q quit │ ←/→ brightness │ [/] volume │ ↑/↓ headlines │ ? help ",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 44.min(area.width);
    let height = 10.min(area.height);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    let lines = vec![
        Line::from("q / Esc    quit"),
        Line::from("? / h      toggle help"),
        Line::from("← / →      brightness -/+ 5%"),
        Line::from("[ / ]      volume -/+ 5%"),
        Line::from("↑ / ↓      scroll headlines"),
        Line::from(""),
        Line::from("Values refresh in the background;"),
        Line::from("failures show the last known value."),
    ];

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title("Help").borders(Borders::ALL)),
        popup,
    );
}
