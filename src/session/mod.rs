//! Playback session
//!
//! - State: the pure session state machine
//! - Controller: one session with its engine, progress and peripherals
//! - Timers / Runtime: the tokio side (ticks, event loop, teardown)
//! - Input: key → intent mapping
//! - Skip: intro/recap/credits segments

pub mod controller;
pub mod input;
pub mod runtime;
pub mod skip;
pub mod state;
pub mod timers;

pub use controller::SessionController;
pub use input::{InputDispatcher, InputFocus, Intent};
pub use runtime::{ExitReason, SessionEvent, SessionRuntime};
pub use skip::SkipSegmentTracker;
pub use state::{SessionState, StateMachine, Trigger};
pub use timers::{SessionTimers, TimerTick};
