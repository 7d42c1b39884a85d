/// Events that can occur in the panel TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    /// Quit the application
    Quit,
    /// Toggle help overlay
    ToggleHelp,
    /// Raise display brightness one step
    BrightnessUp,
    /// Lower display brightness one step
    BrightnessDown,
    /// Raise master volume one step
    VolumeUp,
    /// Lower master volume one step
    VolumeDown,
    /// Scroll the headline list up
    NewsUp,
    /// Scroll the headline list down
    NewsDown,
    /// No action
    None,
}
