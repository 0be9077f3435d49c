//! Keyboard input dispatch
//!
//! Maps key events to playback intents. Stateless apart from the configured
//! step sizes; the caller says where focus is.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::config::PlaybackConfig;

/// Something the viewer asked the player to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    TogglePlay,
    Play,
    Pause,
    /// Relative seek in seconds
    SeekBy(f64),
    /// Absolute seek in seconds
    SeekTo(f64),
    /// Jump to `n` tenths of the duration
    JumpToDecile(u8),
    VolumeBy(f64),
    ToggleMute,
    ToggleFullscreen,
    SkipSegment,
    CycleSubtitles,
    DisableSubtitles,
    TogglePip,
    /// Start or stop casting the attached source
    ToggleCast,
    RateBy(f64),
}

/// Where keyboard focus currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFocus {
    /// The player surface
    #[default]
    Player,
    /// A text box (search, chat…); keys belong to it
    TextEntry,
}

/// Key → intent mapping
#[derive(Debug, Clone)]
pub struct InputDispatcher {
    seek_step: f64,
    volume_step: f64,
    rate_step: f64,
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl InputDispatcher {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            seek_step: config.seek_step_secs,
            volume_step: config.volume_step,
            rate_step: config.rate_step,
        }
    }

    /// Map a key event to an intent; `None` when it is not ours
    pub fn dispatch(&self, key: KeyEvent, focus: InputFocus) -> Option<Intent> {
        if focus == InputFocus::TextEntry || key.kind == KeyEventKind::Release {
            return None;
        }
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return None;
        }

        let intent = match key.code {
            KeyCode::Char(' ') | KeyCode::Char('k') => Intent::TogglePlay,
            KeyCode::Left | KeyCode::Char('j') => Intent::SeekBy(-self.seek_step),
            KeyCode::Right | KeyCode::Char('l') => Intent::SeekBy(self.seek_step),
            KeyCode::Up => Intent::VolumeBy(self.volume_step),
            KeyCode::Down => Intent::VolumeBy(-self.volume_step),
            KeyCode::Char(c @ '0'..='9') => Intent::JumpToDecile(c as u8 - b'0'),
            KeyCode::Char('m') => Intent::ToggleMute,
            KeyCode::Char('f') => Intent::ToggleFullscreen,
            KeyCode::Char('s') => Intent::SkipSegment,
            KeyCode::Char('c') => Intent::CycleSubtitles,
            KeyCode::Char('p') => Intent::TogglePip,
            KeyCode::Char('C') => Intent::ToggleCast,
            KeyCode::Char('<') => Intent::RateBy(-self.rate_step),
            KeyCode::Char('>') => Intent::RateBy(self.rate_step),
            _ => return None,
        };
        Some(intent)
    }
}

/// Human-readable key bindings, for help output
pub fn key_bindings() -> &'static [(&'static str, &'static str)] {
    &[
        ("Space / k", "Play / pause"),
        ("← / j", "Seek back"),
        ("→ / l", "Seek forward"),
        ("↑ / ↓", "Volume up / down"),
        ("0-9", "Jump to 0%-90%"),
        ("m", "Mute"),
        ("f", "Fullscreen"),
        ("s", "Skip intro / recap / credits"),
        ("c", "Cycle subtitles"),
        ("p", "Picture-in-picture"),
        ("C", "Cast to device"),
        ("< / >", "Slower / faster"),
    ]
}
