//! Adaptive Stream Engine Tests
//!
//! Software-demuxer recovery as seen through a whole session: bounded
//! reloads, one decode recovery, then fallback to the next candidate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use streamsession::api::{ProviderApi, ProviderResponse, ResolveRequest};
use streamsession::config::Config;
use streamsession::error::ApiError;
use streamsession::models::{ContainerKind, ContentKey, StreamSource};
use streamsession::progress::ProgressCache;
use streamsession::session::{SessionController, SessionState};
use streamsession::stream::engine::{
    AdaptiveStreamEngine, AttachMode, Demuxer, DemuxerError, DemuxerErrorKind, DemuxerFactory,
    EngineEvent, MediaOutput,
};
use streamsession::stream::SourceResolver;

type Log = Arc<Mutex<Vec<String>>>;

struct SoftwareOnlyOutput(Log);

impl MediaOutput for SoftwareOnlyOutput {
    fn supports_native_manifest(&self) -> bool {
        false
    }
    fn set_source(&mut self, url: &str) {
        self.0.lock().unwrap().push(format!("src {}", url));
    }
    fn clear_source(&mut self) {}
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn seek(&mut self, _position: f64) {}
    fn set_volume(&mut self, _volume: f64) {}
    fn set_muted(&mut self, _muted: bool) {}
    fn set_rate(&mut self, _rate: f64) {}
}

struct LoggingDemuxer(Log);

impl Demuxer for LoggingDemuxer {
    fn load_source(&mut self, url: &str) {
        self.0.lock().unwrap().push(format!("load {}", url));
    }
    fn start_load(&mut self) {
        self.0.lock().unwrap().push("reload".into());
    }
    fn recover_media_error(&mut self) {
        self.0.lock().unwrap().push("recover".into());
    }
    fn destroy(&mut self) {
        self.0.lock().unwrap().push("destroy".into());
    }
}

struct Factory(Log);

impl DemuxerFactory for Factory {
    fn create(&self) -> Box<dyn Demuxer> {
        Box::new(LoggingDemuxer(self.0.clone()))
    }
}

struct FixedProvider(Vec<StreamSource>);

#[async_trait]
impl ProviderApi for FixedProvider {
    async fn resolve_sources(
        &self,
        _request: &ResolveRequest,
    ) -> Result<ProviderResponse, ApiError> {
        Ok(ProviderResponse {
            sources: self.0.clone(),
            subtitles: Vec::new(),
        })
    }
}

fn sources() -> Vec<StreamSource> {
    vec![
        StreamSource::new(
            "direct",
            "https://cdn.example/movie.mp4",
            ContainerKind::Progressive,
            "720p",
        ),
        StreamSource::new(
            "hls",
            "https://cdn.example/master.m3u8",
            ContainerKind::AdaptiveManifest,
            "1080p",
        ),
    ]
}

async fn started(with_factory: bool) -> (SessionController, Log) {
    let config = Config::default();
    let log: Log = Arc::default();
    let factory: Option<Arc<dyn DemuxerFactory>> = if with_factory {
        Some(Arc::new(Factory(log.clone())))
    } else {
        None
    };
    let engine = AdaptiveStreamEngine::new(
        Box::new(SoftwareOnlyOutput(log.clone())),
        factory,
        &config.playback,
    );
    let cache = ProgressCache::in_memory(config.progress.clone());
    let mut controller = SessionController::new(ContentKey::movie("tt2"), engine, cache, &config);
    let resolver = SourceResolver::new(Arc::new(FixedProvider(sources())));
    controller.start(&resolver, None, false).await.unwrap();
    (controller, log)
}

fn network_error() -> EngineEvent {
    EngineEvent::Demuxer(DemuxerError::fatal(DemuxerErrorKind::Network, "manifest timeout"))
}

#[tokio::test]
async fn test_adaptive_candidate_is_tried_first_through_demuxer() {
    let (controller, log) = started(true).await;
    assert_eq!(controller.engine().mode(), Some(AttachMode::SoftwareDemuxer));
    assert_eq!(log.lock().unwrap()[0], "load https://cdn.example/master.m3u8");
}

#[tokio::test]
async fn test_without_demuxer_the_adaptive_candidate_is_skipped() {
    let (controller, _) = started(false).await;
    assert_eq!(controller.engine().mode(), Some(AttachMode::Direct));
    assert_eq!(
        controller.engine().source().unwrap().url,
        "https://cdn.example/movie.mp4"
    );
    assert_eq!(controller.state(), SessionState::Loading);
}

#[tokio::test]
async fn test_network_reload_budget_then_fallback() {
    let (mut controller, log) = started(true).await;

    for _ in 0..3 {
        controller.handle_engine_event(network_error()).unwrap();
        assert_eq!(controller.engine().mode(), Some(AttachMode::SoftwareDemuxer));
    }
    controller.handle_engine_event(network_error()).unwrap();

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries.iter().filter(|e| *e == "reload").count(), 3);
    assert!(entries.contains(&"destroy".to_string()));
    assert_eq!(controller.engine().mode(), Some(AttachMode::Direct));
    assert_eq!(controller.state(), SessionState::Loading);
}

#[tokio::test]
async fn test_playback_progress_restores_reload_budget() {
    let (mut controller, log) = started(true).await;
    controller.handle_engine_event(EngineEvent::Ready).unwrap();

    for t in 1..=6 {
        controller.handle_engine_event(network_error()).unwrap();
        controller
            .handle_engine_event(EngineEvent::TimeUpdate(t as f64 * 10.0))
            .unwrap();
    }

    assert_eq!(log.lock().unwrap().iter().filter(|e| *e == "reload").count(), 6);
    assert_eq!(controller.engine().mode(), Some(AttachMode::SoftwareDemuxer));
}

#[tokio::test]
async fn test_second_decode_error_falls_back() {
    let (mut controller, log) = started(true).await;
    let decode = || EngineEvent::Demuxer(DemuxerError::fatal(DemuxerErrorKind::Media, "bad frame"));

    controller.handle_engine_event(decode()).unwrap();
    assert!(log.lock().unwrap().contains(&"recover".to_string()));
    assert_eq!(controller.engine().mode(), Some(AttachMode::SoftwareDemuxer));

    controller.handle_engine_event(decode()).unwrap();
    assert_eq!(controller.engine().mode(), Some(AttachMode::Direct));
}
