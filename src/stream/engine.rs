//! Adaptive stream engine
//!
//! Attaches one [`StreamSource`] to a [`MediaOutput`], using a software
//! demuxer for adaptive manifests when the output cannot play them natively,
//! and classifies demuxer failures into reload / recover / give up.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::error::SessionError;
use crate::models::StreamSource;

/// The runtime's media element
pub trait MediaOutput: Send {
    /// Whether the output can play adaptive manifests by itself
    fn supports_native_manifest(&self) -> bool;
    fn set_source(&mut self, url: &str);
    fn clear_source(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_rate(&mut self, rate: f64);
}

/// Software manifest demuxer bound to the media output
pub trait Demuxer: Send {
    /// Load a manifest and start feeding the output
    fn load_source(&mut self, url: &str);
    /// Restart loading of the current manifest
    fn start_load(&mut self);
    /// Reset the decode pipeline
    fn recover_media_error(&mut self);
    fn destroy(&mut self);
}

/// Creates demuxer instances; absent when the runtime has no software demuxer
pub trait DemuxerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Demuxer>;
}

/// Demuxer error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerErrorKind {
    Network,
    Media,
    Other,
}

/// Error reported by the demuxer
#[derive(Debug, Clone, PartialEq)]
pub struct DemuxerError {
    pub kind: DemuxerErrorKind,
    pub fatal: bool,
    pub details: String,
}

impl DemuxerError {
    pub fn fatal(kind: DemuxerErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    pub fn non_fatal(kind: DemuxerErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: false,
            details: details.into(),
        }
    }
}

impl fmt::Display for DemuxerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}{} error: {}",
            self.kind,
            if self.fatal { " fatal" } else { "" },
            self.details
        )
    }
}

/// Uniform event surface reported by the runtime for the attached source
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Ready,
    TimeUpdate(f64),
    DurationKnown(f64),
    BufferedUpdate(f64),
    BufferingStart,
    BufferingStop,
    SeekStart,
    SeekConfirmed(f64),
    VolumeChanged { volume: f64, muted: bool },
    RateChanged(f64),
    Playing,
    Paused,
    Ended,
    /// The media element itself failed (decode, unsupported, 404…)
    OutputError(String),
    Demuxer(DemuxerError),
}

/// How the current source was attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// URL assigned straight to the output
    Direct,
    /// Fed through a software demuxer
    SoftwareDemuxer,
}

/// Outcome of an engine error
#[derive(Debug)]
pub enum ErrorAction {
    /// Non-fatal, nothing to do
    Ignored,
    /// Manifest reload in progress
    Reloading,
    /// Decode pipeline reset in progress
    Recovering,
    /// The current source is exhausted; the demuxer has been torn down
    Unplayable(SessionError),
}

/// Drives one media output
pub struct AdaptiveStreamEngine {
    output: Box<dyn MediaOutput>,
    demuxer_factory: Option<Arc<dyn DemuxerFactory>>,
    demuxer: Option<Box<dyn Demuxer>>,
    source: Option<StreamSource>,
    mode: Option<AttachMode>,
    max_network_reloads: u32,
    network_reloads: u32,
    media_recovery_used: bool,
}

impl AdaptiveStreamEngine {
    pub fn new(
        output: Box<dyn MediaOutput>,
        demuxer_factory: Option<Arc<dyn DemuxerFactory>>,
        config: &PlaybackConfig,
    ) -> Self {
        Self {
            output,
            demuxer_factory,
            demuxer: None,
            source: None,
            mode: None,
            max_network_reloads: config.max_network_reloads,
            network_reloads: 0,
            media_recovery_used: false,
        }
    }

    pub fn source(&self) -> Option<&StreamSource> {
        self.source.as_ref()
    }

    pub fn mode(&self) -> Option<AttachMode> {
        self.mode
    }

    pub fn has_demuxer(&self) -> bool {
        self.demuxer.is_some()
    }

    /// Attach a source, replacing whatever was attached before
    pub fn attach(&mut self, source: &StreamSource) -> Result<AttachMode, SessionError> {
        self.detach();

        let mode = if !source.container.is_adaptive() || self.output.supports_native_manifest() {
            self.output.set_source(&source.url);
            AttachMode::Direct
        } else if let Some(factory) = &self.demuxer_factory {
            let mut demuxer = factory.create();
            demuxer.load_source(&source.url);
            self.demuxer = Some(demuxer);
            AttachMode::SoftwareDemuxer
        } else {
            return Err(SessionError::StreamUnplayable(format!(
                "no manifest support for {}",
                source.url
            )));
        };

        info!(url = %source.url, provider = %source.provider, ?mode, "source attached");
        self.source = Some(source.clone());
        self.mode = Some(mode);
        Ok(mode)
    }

    /// Tear down the demuxer and release the output
    pub fn detach(&mut self) {
        if let Some(mut demuxer) = self.demuxer.take() {
            demuxer.destroy();
        }
        if self.source.take().is_some() {
            self.output.clear_source();
            debug!("source detached");
        }
        self.mode = None;
        self.network_reloads = 0;
        self.media_recovery_used = false;
    }

    /// Playback moved forward; network recovery budget is restored
    pub fn note_progress(&mut self) {
        self.network_reloads = 0;
    }

    /// Classify a demuxer error and run the matching recovery
    pub fn handle_demuxer_error(&mut self, error: &DemuxerError) -> ErrorAction {
        if !error.fatal {
            debug!(%error, "non-fatal demuxer error");
            return ErrorAction::Ignored;
        }
        let Some(demuxer) = self.demuxer.as_mut() else {
            debug!(%error, "demuxer error with no demuxer attached");
            return ErrorAction::Ignored;
        };

        match error.kind {
            DemuxerErrorKind::Network if self.network_reloads < self.max_network_reloads => {
                self.network_reloads += 1;
                warn!(%error, attempt = self.network_reloads, "reloading manifest");
                demuxer.start_load();
                ErrorAction::Reloading
            }
            DemuxerErrorKind::Media if !self.media_recovery_used => {
                self.media_recovery_used = true;
                warn!(%error, "resetting decode pipeline");
                demuxer.recover_media_error();
                ErrorAction::Recovering
            }
            kind => {
                let cause = match kind {
                    DemuxerErrorKind::Network => {
                        SessionError::NetworkError(error.details.clone())
                    }
                    DemuxerErrorKind::Media => {
                        SessionError::MediaDecodeError(error.details.clone())
                    }
                    DemuxerErrorKind::Other => {
                        SessionError::StreamUnplayable(error.details.clone())
                    }
                };
                warn!(%error, cause = %cause, "giving up on source");
                self.teardown_demuxer();
                ErrorAction::Unplayable(SessionError::StreamUnplayable(cause.to_string()))
            }
        }
    }

    /// The output element failed on its own
    pub fn handle_output_error(&mut self, details: &str) -> ErrorAction {
        warn!(details, "media output error");
        self.teardown_demuxer();
        ErrorAction::Unplayable(SessionError::StreamUnplayable(details.to_string()))
    }

    fn teardown_demuxer(&mut self) {
        if let Some(mut demuxer) = self.demuxer.take() {
            demuxer.destroy();
        }
    }

    pub fn play(&mut self) {
        self.output.play();
    }

    pub fn pause(&mut self) {
        self.output.pause();
    }

    pub fn seek(&mut self, position: f64) {
        self.output.seek(position);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.output.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.output.set_muted(muted);
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.output.set_rate(rate.clamp(0.25, 4.0));
    }
}

impl Drop for AdaptiveStreamEngine {
    fn drop(&mut self) {
        self.teardown_demuxer();
    }
}
