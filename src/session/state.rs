//! Session state machine
//!
//! ```text
//! Idle → Loading → Ready → { Playing ⇄ Paused, Buffering, Seeking } → Ended
//!                     *  → Errored → Loading (next candidate) | terminal
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Session state tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Buffering,
    Seeking,
    Ended,
    Errored,
}

impl SessionState {
    /// States in which the engine has a loaded source
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Ready
                | SessionState::Playing
                | SessionState::Paused
                | SessionState::Buffering
                | SessionState::Seeking
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "Idle",
            SessionState::Loading => "Loading...",
            SessionState::Ready => "Ready",
            SessionState::Playing => "▶ Playing",
            SessionState::Paused => "⏸ Paused",
            SessionState::Buffering => "Buffering...",
            SessionState::Seeking => "Seeking...",
            SessionState::Ended => "⏹ Ended",
            SessionState::Errored => "Error",
        };
        write!(f, "{}", s)
    }
}

/// Something that may move the session to another state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A source was attached to the engine
    Attach,
    EngineReady,
    PlayIntent,
    PauseIntent,
    EnginePlaying,
    EnginePaused,
    BufferingStart,
    BufferingStop,
    SeekRequested,
    SeekConfirmed,
    EngineEnded,
    FatalError,
    /// A further candidate is available after an error
    Fallback,
    /// No candidate is left after an error
    Exhausted,
}

/// Tracks the current state plus where to return after seeking/buffering
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: SessionState,
    after_seek: Option<SessionState>,
    terminal: bool,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Ended`, or `Errored` with no candidate left
    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Ended || self.terminal
    }

    /// Where a pending seek will land
    pub fn after_seek(&self) -> Option<SessionState> {
        self.after_seek
    }

    /// Compute the next state without applying it
    pub fn next(&self, trigger: Trigger) -> Option<SessionState> {
        use SessionState::*;

        if self.is_terminal() {
            return None;
        }

        match (self.state, trigger) {
            (_, Trigger::FatalError) if self.state != Errored => Some(Errored),
            (Errored, Trigger::Fallback) => Some(Loading),
            (Errored, Trigger::Exhausted) => Some(Errored),
            (Idle, Trigger::Attach) => Some(Loading),
            (Loading, Trigger::EngineReady) => Some(Ready),

            (Ready | Paused, Trigger::PlayIntent | Trigger::EnginePlaying) => Some(Playing),
            (Playing, Trigger::PauseIntent | Trigger::EnginePaused) => Some(Paused),
            (Buffering, Trigger::PauseIntent) => Some(Paused),

            (Playing, Trigger::BufferingStart) => Some(Buffering),
            (Buffering, Trigger::BufferingStop | Trigger::EnginePlaying) => Some(Playing),

            (Ready | Playing | Paused | Buffering | Seeking, Trigger::SeekRequested) => {
                Some(Seeking)
            }
            (Seeking, Trigger::SeekConfirmed) => Some(self.after_seek.unwrap_or(Paused)),
            // Play/pause while a seek is in flight only changes where we land
            (Seeking, Trigger::PlayIntent | Trigger::PauseIntent) => Some(Seeking),

            (Playing | Buffering | Paused | Seeking, Trigger::EngineEnded) => Some(Ended),
            _ => None,
        }
    }

    /// Apply a trigger; returns the new state, or `None` if it was ignored
    pub fn apply(&mut self, trigger: Trigger) -> Option<SessionState> {
        let Some(next) = self.next(trigger) else {
            debug!(state = ?self.state, ?trigger, "ignored trigger");
            return None;
        };

        match (self.state, trigger) {
            (SessionState::Seeking, Trigger::PlayIntent) => {
                self.after_seek = Some(SessionState::Playing)
            }
            (SessionState::Seeking, Trigger::PauseIntent) => {
                self.after_seek = Some(SessionState::Paused)
            }
            (SessionState::Seeking, _) => {}
            (from, Trigger::SeekRequested) => {
                self.after_seek = Some(match from {
                    SessionState::Buffering => SessionState::Playing,
                    other => other,
                });
            }
            _ => {}
        }
        if next != SessionState::Seeking {
            self.after_seek = None;
        }
        if trigger == Trigger::Exhausted {
            self.terminal = true;
        }

        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?trigger, "state transition");
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    fn machine_at(path: &[Trigger]) -> StateMachine {
        let mut m = StateMachine::new();
        for t in path {
            assert!(m.apply(*t).is_some(), "trigger {:?} rejected at {:?}", t, m.state());
        }
        m
    }

    #[test]
    fn test_happy_path() {
        let mut m = StateMachine::new();
        assert_eq!(m.apply(Trigger::Attach), Some(Loading));
        assert_eq!(m.apply(Trigger::EngineReady), Some(Ready));
        assert_eq!(m.apply(Trigger::PlayIntent), Some(Playing));
        assert_eq!(m.apply(Trigger::PauseIntent), Some(Paused));
        assert_eq!(m.apply(Trigger::PlayIntent), Some(Playing));
        assert_eq!(m.apply(Trigger::EngineEnded), Some(Ended));
        assert!(m.is_terminal());
        assert_eq!(m.apply(Trigger::PlayIntent), None);
    }

    #[test]
    fn test_buffering_round_trip() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady, Trigger::PlayIntent]);
        assert_eq!(m.apply(Trigger::BufferingStart), Some(Buffering));
        assert_eq!(m.apply(Trigger::BufferingStop), Some(Playing));
    }

    #[test]
    fn test_buffering_ignored_while_paused() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady]);
        assert_eq!(m.apply(Trigger::BufferingStart), None);
        assert_eq!(m.state(), Ready);
    }

    #[test]
    fn test_seek_returns_to_prior_state() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady, Trigger::PlayIntent]);
        assert_eq!(m.apply(Trigger::SeekRequested), Some(Seeking));
        assert_eq!(m.apply(Trigger::SeekConfirmed), Some(Playing));

        m.apply(Trigger::PauseIntent);
        m.apply(Trigger::SeekRequested);
        assert_eq!(m.apply(Trigger::SeekConfirmed), Some(Paused));
    }

    #[test]
    fn test_seek_from_buffering_resumes_playing() {
        let mut m = machine_at(&[
            Trigger::Attach,
            Trigger::EngineReady,
            Trigger::PlayIntent,
            Trigger::BufferingStart,
        ]);
        m.apply(Trigger::SeekRequested);
        assert_eq!(m.apply(Trigger::SeekConfirmed), Some(Playing));
    }

    #[test]
    fn test_seek_from_ready_returns_to_ready() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady]);
        m.apply(Trigger::SeekRequested);
        assert_eq!(m.apply(Trigger::SeekConfirmed), Some(Ready));
    }

    #[test]
    fn test_play_intent_during_seek_changes_landing_state() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady, Trigger::PlayIntent]);
        m.apply(Trigger::SeekRequested);
        m.apply(Trigger::PauseIntent);
        // A second seek keeps the updated landing state
        m.apply(Trigger::SeekRequested);
        assert_eq!(m.apply(Trigger::SeekConfirmed), Some(Paused));
    }

    #[test]
    fn test_seek_rejected_while_loading() {
        let m = machine_at(&[Trigger::Attach]);
        assert_eq!(m.next(Trigger::SeekRequested), None);
    }

    #[test]
    fn test_error_with_fallback_reloads() {
        let mut m = machine_at(&[Trigger::Attach, Trigger::EngineReady, Trigger::PlayIntent]);
        assert_eq!(m.apply(Trigger::FatalError), Some(Errored));
        assert!(!m.is_terminal());
        assert_eq!(m.apply(Trigger::Fallback), Some(Loading));
        assert_eq!(m.apply(Trigger::EngineReady), Some(Ready));
    }

    #[test]
    fn test_error_exhausted_is_terminal() {
        let mut m = machine_at(&[Trigger::Attach]);
        m.apply(Trigger::FatalError);
        m.apply(Trigger::Exhausted);
        assert!(m.is_terminal());
        assert_eq!(m.apply(Trigger::Fallback), None);
        assert_eq!(m.state(), Errored);
    }

    #[test]
    fn test_fatal_error_from_idle_is_allowed() {
        let mut m = StateMachine::new();
        assert_eq!(m.apply(Trigger::FatalError), Some(Errored));
    }
}
