use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::panel::{
    PanelRuntime, QuantityId, Sample, Subscription, SubscriptionScope,
};

use super::event_handler::PanelEvent;
use super::render::render_ui;

const HISTORY_SIZE: usize = 60;
const BRIGHTNESS_STEP: f64 = 5.0;
const VOLUME_STEP: f64 = 0.05;

/// Panel application state
pub struct PanelApp<'a> {
    runtime: &'a PanelRuntime,
    subscription: Subscription,
    pub snapshot: HashMap<QuantityId, Arc<Sample>>,
    pub cpu_history: VecDeque<u64>,
    pub memory_history: VecDeque<u64>,
    pub should_quit: bool,
    pub show_help: bool,
    pub news_scroll: usize,
    last_cpu_version: u64,
    last_memory_version: u64,
}

impl<'a> PanelApp<'a> {
    pub fn new(runtime: &'a PanelRuntime) -> Self {
        let subscription = runtime.subscribe(SubscriptionScope::All);
        Self {
            runtime,
            subscription,
            snapshot: runtime.snapshot(),
            cpu_history: VecDeque::with_capacity(HISTORY_SIZE),
            memory_history: VecDeque::with_capacity(HISTORY_SIZE),
            should_quit: false,
            show_help: false,
            news_scroll: 0,
            last_cpu_version: 0,
            last_memory_version: 0,
        }
    }

    pub fn sample(&self, quantity: &QuantityId) -> Option<&Arc<Sample>> {
        self.snapshot.get(quantity)
    }

    pub fn is_disabled(&self, quantity: &QuantityId) -> bool {
        self.runtime.is_disabled(quantity)
    }

    /// Drain pending change notifications; re-read the store if any arrived.
    pub fn drain_notifications(&mut self) {
        let mut changed = false;
        while self.subscription.try_recv().is_some() {
            changed = true;
        }
        if changed {
            self.snapshot = self.runtime.snapshot();
            self.update_history();
        }
    }

    fn update_history(&mut self) {
        if let Some(sample) = self.snapshot.get(&QuantityId::cpu()) {
            if sample.version > self.last_cpu_version {
                self.last_cpu_version = sample.version;
                if let Some((payload, _)) = sample.latest_known() {
                    if let Some(percent) = payload.as_percent() {
                        push_history(&mut self.cpu_history, (percent * 10.0) as u64);
                    }
                }
            }
        }
        if let Some(sample) = self.snapshot.get(&QuantityId::memory()) {
            if sample.version > self.last_memory_version {
                self.last_memory_version = sample.version;
                if let Some((payload, _)) = sample.latest_known() {
                    if let Some(percent) = payload.as_percent() {
                        push_history(&mut self.memory_history, (percent * 10.0) as u64);
                    }
                }
            }
        }
    }

    fn current_percent(&self, quantity: &QuantityId) -> Option<f64> {
        self.snapshot
            .get(quantity)
            .and_then(|s| s.latest_known())
            .and_then(|(payload, _)| payload.as_percent())
    }

    fn current_scalar(&self, quantity: &QuantityId) -> Option<f64> {
        self.snapshot
            .get(quantity)
            .and_then(|s| s.latest_known())
            .and_then(|(payload, _)| payload.as_scalar())
    }

    fn adjust_brightness(&mut self, delta: f64) {
        let quantity = QuantityId::brightness();
        let Some(current) = self.current_percent(&quantity) else {
            return;
        };
        let target = (current + delta).clamp(0.0, 100.0);
        if let Err(e) = self.runtime.set_control(&quantity, target) {
            log::warn!("brightness write failed: {}", e);
        }
    }

    fn adjust_volume(&mut self, delta: f64) {
        let quantity = QuantityId::volume();
        let Some(current) = self.current_scalar(&quantity) else {
            return;
        };
        let target = (current + delta).clamp(0.0, 1.0);
        if let Err(e) = self.runtime.set_control(&quantity, target) {
            log::warn!("volume write failed: {}", e);
        }
    }

    /// Handle keyboard events
    pub fn handle_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Quit => self.should_quit = true,
            PanelEvent::ToggleHelp => self.show_help = !self.show_help,
            PanelEvent::BrightnessUp => self.adjust_brightness(BRIGHTNESS_STEP),
            PanelEvent::BrightnessDown => self.adjust_brightness(-BRIGHTNESS_STEP),
            PanelEvent::VolumeUp => self.adjust_volume(VOLUME_STEP),
            PanelEvent::VolumeDown => self.adjust_volume(-VOLUME_STEP),
            PanelEvent::NewsUp => {
                self.news_scroll = self.news_scroll.saturating_sub(1);
            }
            PanelEvent::NewsDown => {
                self.news_scroll = self.news_scroll.saturating_add(1);
            }
            PanelEvent::None => {}
        }
    }
}

fn push_history(queue: &mut VecDeque<u64>, value: u64) {
    if queue.len() >= HISTORY_SIZE {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Run the panel TUI application
pub fn run_panel_app(runtime: &PanelRuntime) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = PanelApp::new(runtime);
    let poll_timeout = Duration::from_millis(250);

    // Main loop
    loop {
        app.drain_notifications();

        terminal.draw(|frame| render_ui(frame, &app))?;

        if event::poll(poll_timeout).context("Event poll failed")? {
            if let Event::Key(key) = event::read().context("Event read failed")? {
                if key.kind == KeyEventKind::Press {
                    let panel_event = match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => PanelEvent::Quit,
                        KeyCode::Char('?') | KeyCode::Char('h') => PanelEvent::ToggleHelp,
                        KeyCode::Right | KeyCode::Char('+') => PanelEvent::BrightnessUp,
                        KeyCode::Left | KeyCode::Char('-') => PanelEvent::BrightnessDown,
                        KeyCode::Char(']') => PanelEvent::VolumeUp,
                        KeyCode::Char('[') => PanelEvent::VolumeDown,
                        KeyCode::Up | KeyCode::Char('k') => PanelEvent::NewsUp,
                        KeyCode::Down | KeyCode::Char('j') => PanelEvent::NewsDown,
                        _ => PanelEvent::None,
                    };
                    app.handle_event(panel_event);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    Ok(())
}
