//! Playback session controller
//!
//! Owns one [`PlaybackSession`] and everything that acts on it: the engine,
//! the state machine, progress persistence, skip segments, subtitles and the
//! output bridge. All methods are synchronous except [`SessionController::start`];
//! the async event loop lives in [`crate::session::runtime`].

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ProgressApi, ResolveRequest};
use crate::config::{Config, PlaybackConfig};
use crate::error::SessionError;
use crate::models::{ContentKey, PlaybackSession, SkipSegment, StreamSource};
use crate::progress::{ProgressCache, ProgressWriter, RemoteSync, WriteOutcome};
use crate::session::input::Intent;
use crate::session::skip::SkipSegmentTracker;
use crate::session::state::{SessionState, StateMachine, Trigger};
use crate::stream::engine::{AdaptiveStreamEngine, EngineEvent, ErrorAction};
use crate::stream::output::OutputBridge;
use crate::stream::resolver::SourceResolver;
use crate::stream::subtitles::SubtitleTracks;

/// One watch attempt of one piece of content
pub struct SessionController {
    session: PlaybackSession,
    machine: StateMachine,
    engine: AdaptiveStreamEngine,
    cache: ProgressCache,
    writer: ProgressWriter,
    remote: Option<RemoteSync>,
    skips: SkipSegmentTracker,
    output: OutputBridge,
    subtitles: SubtitleTracks,
    candidates: VecDeque<StreamSource>,
    playback: PlaybackConfig,
    /// Target of an in-flight seek
    pending_seek: Option<f64>,
    /// Position to seek to once the engine is ready
    resume_at: Option<f64>,
    controls_visible: bool,
    torn_down: bool,
}

impl SessionController {
    pub fn new(
        key: ContentKey,
        engine: AdaptiveStreamEngine,
        cache: ProgressCache,
        config: &Config,
    ) -> Self {
        let writer = ProgressWriter::new(&config.progress);
        Self {
            session: PlaybackSession::new(key),
            machine: StateMachine::new(),
            engine,
            cache,
            writer,
            remote: None,
            skips: SkipSegmentTracker::default(),
            output: OutputBridge::default(),
            subtitles: SubtitleTracks::default(),
            candidates: VecDeque::new(),
            playback: config.playback.clone(),
            pending_seek: None,
            resume_at: None,
            controls_visible: true,
            torn_down: false,
        }
    }

    /// Enable remote progress sync through `api`
    pub fn with_remote(mut self, api: Arc<dyn ProgressApi>) -> Self {
        let progress = self.cache.config().clone();
        self.remote = Some(RemoteSync::new(api, self.session.key.clone(), &progress));
        self
    }

    pub fn with_output(mut self, output: OutputBridge) -> Self {
        self.output = output;
        self
    }

    pub fn with_segments(mut self, segments: Vec<SkipSegment>) -> Self {
        self.skips = SkipSegmentTracker::new(segments);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn key(&self) -> &ContentKey {
        &self.session.key
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.machine.is_terminal()
    }

    pub fn engine(&self) -> &AdaptiveStreamEngine {
        &self.engine
    }

    pub fn cache(&mut self) -> &mut ProgressCache {
        &mut self.cache
    }

    pub fn remote(&self) -> Option<&RemoteSync> {
        self.remote.as_ref()
    }

    pub fn subtitles(&self) -> &SubtitleTracks {
        &self.subtitles
    }

    pub fn output(&self) -> &OutputBridge {
        &self.output
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.pending_seek
    }

    pub fn resume_position(&self) -> Option<f64> {
        self.resume_at
    }

    /// Candidates not tried yet
    pub fn remaining_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    /// Segment currently offered for skipping
    pub fn active_segment(&self) -> Option<&SkipSegment> {
        self.skips.active(self.session.current_time())
    }

    // -------------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------------

    /// Resolve sources, look up the resume position and attach the first
    /// playable candidate. `restart` discards any saved position.
    pub async fn start(
        &mut self,
        resolver: &SourceResolver,
        title_hint: Option<&str>,
        restart: bool,
    ) -> Result<(), SessionError> {
        let mut request = ResolveRequest::new(self.session.key.clone());
        if let Some(title) = title_hint {
            request = request.with_title(title);
        }

        let resolved = resolver.resolve(&request).await?;
        self.subtitles = resolved.subtitles;
        self.candidates = resolved.sources.into();

        if restart {
            if let Err(e) = self.cache.clear(&self.session.key) {
                warn!(key = %self.session.key, error = %e, "failed to clear saved position");
            }
        } else {
            self.resume_at = self.lookup_resume().await;
        }

        info!(
            session = %self.session.id,
            key = %self.session.key,
            candidates = self.candidates.len(),
            resume_at = ?self.resume_at,
            "session starting"
        );
        self.attach_next()
    }

    async fn lookup_resume(&mut self) -> Option<f64> {
        let key = self.session.key.clone();
        if let Some(record) = self.cache.read(&key) {
            debug!(%key, position = record.position, "resuming from local cache");
            return Some(record.position);
        }

        let record = self.remote.as_ref()?.pull().await?;
        if !record.is_valid() || !self.cache.is_resumable(&record) {
            return None;
        }
        match self.cache.seed(&key, &record) {
            Ok(true) => {
                debug!(%key, position = record.position, "resuming from remote progress");
                Some(record.position)
            }
            // Past retention
            Ok(false) => None,
            Err(e) => {
                let err = SessionError::PersistenceWriteError(e);
                warn!(%key, error = %err, "failed to seed remote progress");
                Some(record.position)
            }
        }
    }

    /// Attach the next candidate that the engine accepts
    fn attach_next(&mut self) -> Result<(), SessionError> {
        while let Some(source) = self.candidates.pop_front() {
            match self.engine.attach(&source) {
                Ok(_) => {
                    let trigger = if self.machine.state() == SessionState::Errored {
                        Trigger::Fallback
                    } else {
                        Trigger::Attach
                    };
                    // A running cast follows the fallback
                    if self.output.cast_requested() {
                        if let Err(e) = self.output.start_cast(&source.url) {
                            warn!(error = %e, "failed to move cast to fallback source");
                        }
                    }
                    self.session.source = Some(source);
                    self.transition(trigger);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        provider = %source.provider,
                        error = %e,
                        "candidate rejected, trying next"
                    );
                }
            }
        }

        if self.machine.state() != SessionState::Errored {
            self.transition(Trigger::FatalError);
        }
        self.transition(Trigger::Exhausted);
        warn!(key = %self.session.key, "no playable source left");
        Err(SessionError::NoSourceAvailable(self.session.key.to_string()))
    }

    // -------------------------------------------------------------------------
    // Engine events
    // -------------------------------------------------------------------------

    /// Apply an engine event. Only an exhausted candidate list is returned as
    /// an error; everything else is recovered internally.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Result<(), SessionError> {
        if self.torn_down || self.machine.is_terminal() {
            debug!(?event, "event after session end, ignoring");
            return Ok(());
        }

        match event {
            EngineEvent::Ready => {
                self.transition(Trigger::EngineReady);
                if let Some(at) = self.resume_at.take() {
                    if at > 0.0 {
                        self.seek_to(at);
                    }
                }
            }
            EngineEvent::TimeUpdate(t) => self.on_time_update(t),
            EngineEvent::DurationKnown(d) => self.session.set_duration(d),
            EngineEvent::BufferedUpdate(b) => self.session.set_buffered(b),
            EngineEvent::BufferingStart => {
                self.transition(Trigger::BufferingStart);
            }
            EngineEvent::BufferingStop => {
                self.transition(Trigger::BufferingStop);
            }
            EngineEvent::SeekStart => {
                // Seek started by the runtime itself (native scrubbing)
                if self.pending_seek.is_none() {
                    self.transition(Trigger::SeekRequested);
                }
            }
            EngineEvent::SeekConfirmed(t) => self.complete_seek(t),
            EngineEvent::VolumeChanged { volume, muted } => {
                self.session.volume = volume.clamp(0.0, 1.0);
                self.session.muted = muted;
            }
            EngineEvent::RateChanged(rate) => {
                if rate.is_finite() && rate > 0.0 {
                    self.session.rate = rate;
                }
            }
            EngineEvent::Playing => {
                self.transition(Trigger::EnginePlaying);
            }
            EngineEvent::Paused => {
                self.transition(Trigger::EnginePaused);
            }
            EngineEvent::Ended => {
                let duration = self.session.duration();
                self.session.set_current_time(duration);
                self.transition(Trigger::EngineEnded);
                self.persist(true);
            }
            EngineEvent::OutputError(details) => {
                let action = self.engine.handle_output_error(&details);
                return self.on_error_action(action);
            }
            EngineEvent::Demuxer(error) => {
                let action = self.engine.handle_demuxer_error(&error);
                return self.on_error_action(action);
            }
        }
        Ok(())
    }

    fn on_error_action(&mut self, action: ErrorAction) -> Result<(), SessionError> {
        let ErrorAction::Unplayable(cause) = action else {
            return Ok(());
        };

        self.transition(Trigger::FatalError);
        let position = self.session.current_time();
        info!(
            error = %cause,
            remaining = self.candidates.len(),
            "source failed, falling back"
        );

        self.engine.detach();
        self.pending_seek = None;
        // Carry the position over to the next candidate
        if position > 0.0 {
            self.resume_at = Some(position);
        }
        self.attach_next()
    }

    fn on_time_update(&mut self, t: f64) {
        if !t.is_finite() {
            return;
        }
        if let Some(target) = self.pending_seek {
            if (t - target).abs() > self.playback.seek_tolerance_secs {
                debug!(t, target, "stale time update during seek");
                return;
            }
            self.complete_seek(t);
            return;
        }

        let previous = self.session.current_time();
        self.session.set_current_time(t);
        if t > previous {
            self.engine.note_progress();
        }
        self.skips.update(self.session.current_time());
    }

    /// The engine's reported time is authoritative
    fn complete_seek(&mut self, t: f64) {
        if self.pending_seek.take().is_some() || self.machine.state() == SessionState::Seeking {
            self.transition(Trigger::SeekConfirmed);
        }
        self.session.set_current_time(t);
        self.skips.seeked(self.session.current_time());
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    pub fn handle_intent(&mut self, intent: Intent) {
        if self.torn_down {
            return;
        }
        self.controls_visible = true;

        match intent {
            Intent::TogglePlay => {
                if self.is_playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            Intent::Play => self.play(),
            Intent::Pause => self.pause(),
            Intent::SeekBy(delta) => {
                let target = self.pending_seek.unwrap_or(self.session.current_time()) + delta;
                self.seek_to(target);
            }
            Intent::SeekTo(t) => {
                self.seek_to(t);
            }
            Intent::JumpToDecile(n) => {
                let duration = self.session.duration();
                if duration > 0.0 {
                    self.seek_to(duration * f64::from(n.min(9)) / 10.0);
                }
            }
            // Volume/mute/rate go to the engine; the session mirrors its events
            Intent::VolumeBy(delta) => self.engine.set_volume(self.session.volume + delta),
            Intent::ToggleMute => self.engine.set_muted(!self.session.muted),
            Intent::RateBy(delta) => self.engine.set_rate(self.session.rate + delta),
            Intent::ToggleFullscreen => {
                if let Err(e) = self.output.toggle_fullscreen() {
                    warn!(error = %e, "fullscreen request failed");
                }
            }
            Intent::TogglePip => {
                if let Err(e) = self.output.toggle_pip() {
                    warn!(error = %e, "picture-in-picture request failed");
                }
            }
            Intent::ToggleCast => self.toggle_cast(),
            Intent::SkipSegment => {
                if let Some(end) = self.skips.skip(self.session.current_time()) {
                    self.seek_to(end);
                }
            }
            Intent::CycleSubtitles => {
                let label = self.subtitles.cycle().map(|t| t.label.clone());
                debug!(track = ?label, "subtitles cycled");
            }
            Intent::DisableSubtitles => self.subtitles.disable(),
        }
    }

    fn toggle_cast(&mut self) {
        let result = if self.output.cast_requested() {
            self.output.stop_cast()
        } else if let Some(url) = self.session.source.as_ref().map(|s| s.url.clone()) {
            self.output.start_cast(&url)
        } else {
            debug!("nothing attached to cast");
            return;
        };
        if let Err(e) = result {
            warn!(error = %e, "cast request failed");
        }
    }

    fn is_playing(&self) -> bool {
        match self.machine.state() {
            SessionState::Playing | SessionState::Buffering => true,
            SessionState::Seeking => self.machine.after_seek() == Some(SessionState::Playing),
            _ => false,
        }
    }

    fn play(&mut self) {
        if self.transition(Trigger::PlayIntent).is_some() {
            self.engine.play();
        }
    }

    fn pause(&mut self) {
        if self.transition(Trigger::PauseIntent).is_some() {
            self.engine.pause();
        }
    }

    /// Request a seek; the session moves once the engine confirms it
    fn seek_to(&mut self, target: f64) -> bool {
        if !target.is_finite() {
            return false;
        }
        let duration = self.session.duration();
        let target = if duration > 0.0 {
            target.clamp(0.0, duration)
        } else {
            target.max(0.0)
        };

        if self.transition(Trigger::SeekRequested).is_none() {
            return false;
        }
        self.pending_seek = Some(target);
        self.engine.seek(target);
        true
    }

    // -------------------------------------------------------------------------
    // Timer ticks
    // -------------------------------------------------------------------------

    /// Cache-write interval elapsed
    pub fn on_cache_tick(&mut self) -> WriteOutcome {
        if !self.position_settled() {
            return WriteOutcome::Coalesced;
        }
        self.persist(false)
    }

    /// Remote-sync interval elapsed
    pub fn on_sync_tick(&mut self) -> Option<JoinHandle<()>> {
        if !self.position_settled() {
            return None;
        }
        self.remote
            .as_ref()?
            .tick(self.session.current_time(), self.session.duration())
    }

    /// Controls have been idle for the debounce period
    pub fn on_controls_idle(&mut self) {
        if self.machine.state() == SessionState::Playing {
            self.controls_visible = false;
        }
    }

    /// The position reflects real playback (not a pending resume or seek)
    fn position_settled(&self) -> bool {
        self.resume_at.is_none()
            && self.pending_seek.is_none()
            && matches!(
                self.machine.state(),
                SessionState::Playing | SessionState::Paused | SessionState::Buffering
            )
    }

    /// Position worth saving: a pending resume wins over the engine's time,
    /// which has not caught up with it yet
    fn saved_position(&self) -> f64 {
        self.resume_at.unwrap_or_else(|| self.session.current_time())
    }

    fn persist(&mut self, force: bool) -> WriteOutcome {
        let (position, duration) = (self.saved_position(), self.session.duration());
        self.writer
            .offer(&mut self.cache, &self.session.key, position, duration, force)
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Final forced write, best-effort remote push, output release and
    /// engine detach. Idempotent. Returns the final push, if one was spawned.
    pub fn teardown(&mut self) -> Option<JoinHandle<()>> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;

        let mut push = None;
        let (position, duration) = (self.saved_position(), self.session.duration());
        // Nothing watched yet: keep whatever is stored
        if position > 0.0 && duration > 0.0 {
            let outcome = self.persist(true);
            debug!(?outcome, position, "final progress write");
            if let Some(remote) = &self.remote {
                push = remote.flush(position, duration);
            }
        }

        self.output.release();
        self.engine.detach();
        info!(session = %self.session.id, state = ?self.machine.state(), "session torn down");
        push
    }

    fn transition(&mut self, trigger: Trigger) -> Option<SessionState> {
        let next = self.machine.apply(trigger);
        self.session.state = self.machine.state();
        next
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if !self.torn_down {
            // Dropped outside a runtime: the final push cannot be spawned
            if tokio::runtime::Handle::try_current().is_ok() {
                self.teardown();
            } else {
                self.torn_down = true;
                if self.saved_position() > 0.0 {
                    self.persist(true);
                }
                self.engine.detach();
            }
        }
    }
}
