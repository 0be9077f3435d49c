//! Termination Signal Tests
//!
//! Kept in its own test binary: SIGTERM reaches every runtime in the process.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use streamsession::api::{ProviderApi, ProviderResponse, ResolveRequest};
use streamsession::config::Config;
use streamsession::error::ApiError;
use streamsession::models::{ContainerKind, ContentKey, StreamSource};
use streamsession::progress::ProgressCache;
use streamsession::session::{ExitReason, Intent, SessionController, SessionEvent, SessionRuntime};
use streamsession::stream::engine::{AdaptiveStreamEngine, EngineEvent, MediaOutput};
use streamsession::stream::SourceResolver;

struct SilentOutput;

impl MediaOutput for SilentOutput {
    fn supports_native_manifest(&self) -> bool {
        true
    }
    fn set_source(&mut self, _url: &str) {}
    fn clear_source(&mut self) {}
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn seek(&mut self, _position: f64) {}
    fn set_volume(&mut self, _volume: f64) {}
    fn set_muted(&mut self, _muted: bool) {}
    fn set_rate(&mut self, _rate: f64) {}
}

struct OneSource;

#[async_trait]
impl ProviderApi for OneSource {
    async fn resolve_sources(
        &self,
        _request: &ResolveRequest,
    ) -> Result<ProviderResponse, ApiError> {
        Ok(ProviderResponse {
            sources: vec![StreamSource::new(
                "direct",
                "https://cdn.example/a.mp4",
                ContainerKind::Progressive,
                "720p",
            )],
            subtitles: Vec::new(),
        })
    }
}

/// Test: SIGTERM ends the loop like Ctrl-C and the position is saved
#[tokio::test]
async fn test_sigterm_tears_down_and_saves() {
    let config = Config::default();
    let engine = AdaptiveStreamEngine::new(Box::new(SilentOutput), None, &config.playback);
    let cache = ProgressCache::in_memory(config.progress.clone());
    let mut controller = SessionController::new(ContentKey::movie("tt9"), engine, cache, &config);
    let resolver = SourceResolver::new(Arc::new(OneSource));
    controller.start(&resolver, None, false).await.unwrap();

    let (mut runtime, tx) = SessionRuntime::new(controller, &config);
    for event in [
        SessionEvent::Engine(EngineEvent::Ready),
        SessionEvent::Engine(EngineEvent::DurationKnown(600.0)),
        SessionEvent::Intent(Intent::Play),
        SessionEvent::Engine(EngineEvent::TimeUpdate(48.0)),
    ] {
        tx.send(event).await.unwrap();
    }

    let task = tokio::spawn(async move {
        let exit = runtime.run().await;
        (runtime, exit)
    });

    // Let the loop install its handlers and drain the queued events
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let (runtime, exit) = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit.unwrap(), ExitReason::Interrupted);

    let mut controller = runtime.into_controller();
    let saved = controller.cache().read(&ContentKey::movie("tt9")).unwrap();
    assert_eq!(saved.position, 48.0);
    drop(tx);
}
