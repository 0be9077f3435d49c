//! Session event loop
//!
//! Multiplexes engine events, viewer input, timer ticks and termination
//! signals (Ctrl-C, SIGTERM) onto one [`SessionController`], then tears the
//! session down.

use crossterm::event::KeyEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SessionError;
use crate::session::controller::SessionController;
use crate::session::input::{InputDispatcher, InputFocus, Intent};
use crate::session::timers::{SessionTimers, TimerTick};
use crate::stream::engine::EngineEvent;

/// How long teardown waits for the final remote push
const FINAL_PUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Input to the session loop
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Engine(EngineEvent),
    Intent(Intent),
    Key(KeyEvent, InputFocus),
    /// Leave the session (navigation away, explicit stop)
    Stop,
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Stopped,
    Ended,
    Interrupted,
    /// Every event sender was dropped
    Disconnected,
}

enum Wake {
    Event(Option<SessionEvent>),
    Tick(TimerTick),
    Interrupt,
}

/// Drives one started [`SessionController`]
pub struct SessionRuntime {
    controller: SessionController,
    dispatcher: InputDispatcher,
    config: Config,
    events: mpsc::Receiver<SessionEvent>,
}

impl SessionRuntime {
    /// Returns the runtime and the sender the embedding app feeds events into
    pub fn new(
        controller: SessionController,
        config: &Config,
    ) -> (Self, mpsc::Sender<SessionEvent>) {
        let (tx, events) = mpsc::channel(64);
        let runtime = Self {
            controller,
            dispatcher: InputDispatcher::new(&config.playback),
            config: config.clone(),
            events,
        };
        (runtime, tx)
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn into_controller(self) -> SessionController {
        self.controller
    }

    /// Run until the session stops, ends, fails or the process is interrupted.
    /// Teardown always runs before returning.
    pub async fn run(&mut self) -> Result<ExitReason, SessionError> {
        let (tick_tx, mut ticks) = mpsc::channel(16);
        let mut timers = SessionTimers::start(&self.config, tick_tx);
        timers.poke_controls();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let outcome = loop {
            let wake = tokio::select! {
                event = self.events.recv() => Wake::Event(event),
                Some(tick) = ticks.recv() => Wake::Tick(tick),
                _ = &mut shutdown => Wake::Interrupt,
            };

            match wake {
                Wake::Event(None) => break Ok(ExitReason::Disconnected),
                Wake::Event(Some(SessionEvent::Stop)) => break Ok(ExitReason::Stopped),
                Wake::Event(Some(SessionEvent::Engine(event))) => {
                    if let Err(e) = self.controller.handle_engine_event(event) {
                        break Err(e);
                    }
                }
                Wake::Event(Some(SessionEvent::Intent(intent))) => {
                    self.controller.handle_intent(intent);
                    timers.poke_controls();
                }
                Wake::Event(Some(SessionEvent::Key(key, focus))) => {
                    if let Some(intent) = self.dispatcher.dispatch(key, focus) {
                        debug!(?intent, "key dispatched");
                        self.controller.handle_intent(intent);
                        timers.poke_controls();
                    }
                }
                Wake::Tick(TimerTick::CacheWrite) => {
                    self.controller.on_cache_tick();
                }
                Wake::Tick(TimerTick::RemoteSync) => {
                    // Runs detached; the loop never waits on the network
                    let _ = self.controller.on_sync_tick();
                }
                Wake::Tick(TimerTick::ControlsIdle) => self.controller.on_controls_idle(),
                Wake::Interrupt => {
                    info!("termination signal received, saving progress");
                    break Ok(ExitReason::Interrupted);
                }
            }

            if self.controller.is_terminal() {
                break Ok(ExitReason::Ended);
            }
        };

        timers.cancel_all();
        if let Some(push) = self.controller.teardown() {
            if tokio::time::timeout(FINAL_PUSH_TIMEOUT, push).await.is_err() {
                warn!("final progress push timed out");
            }
        }
        outcome
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM. A handler that cannot be
/// installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
