//! Provider Client Tests
//!
//! HTTP provider parsing and source resolution against a mocked addon.

use std::sync::Arc;

use mockito::Server;
use streamsession::api::{HttpProvider, ProviderApi, ResolveRequest};
use streamsession::error::{ApiError, SessionError};
use streamsession::models::{ContainerKind, ContentKey, Quality, SubtitleKind};
use streamsession::stream::SourceResolver;

const STREAMS_BODY: &str = r#"{
    "streams": [
        {
            "name": "Mirror\n720p",
            "title": "Movie.2022.720p.WEB",
            "url": "https://files.example/movie-720.mp4"
        },
        {
            "name": "Edge\n1080p",
            "url": "https://edge.example/hls/master.m3u8"
        },
        {
            "name": "Broken\n4K",
            "title": "no url here"
        },
        {
            "name": "Dash",
            "title": "Auto quality",
            "url": "https://edge.example/play?id=9",
            "type": "dash"
        }
    ],
    "subtitles": [
        { "url": "https://subs.example/fr.srt", "lang": "fre" },
        { "url": "https://subs.example/en.vtt", "lang": "eng", "label": "English SDH", "kind": "captions" }
    ]
}"#;

// =============================================================================
// HTTP Request Tests (with mockito)
// =============================================================================

/// Test: Movie request hits the movie resource and parses every stream with a url
#[tokio::test]
async fn test_movie_sources_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/stream/movie/tt1877830.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(STREAMS_BODY)
        .create_async()
        .await;

    let provider = HttpProvider::new(server.url());
    let response = provider
        .resolve_sources(&ResolveRequest::new(ContentKey::movie("tt1877830")))
        .await
        .unwrap();

    mock.assert_async().await;

    assert_eq!(response.sources.len(), 3);
    assert_eq!(response.sources[0].provider, "Mirror");
    assert_eq!(response.sources[0].quality(), Quality::HD720p);
    assert_eq!(response.sources[0].container, ContainerKind::Progressive);
    assert_eq!(response.sources[1].container, ContainerKind::AdaptiveManifest);
    assert_eq!(response.sources[2].container, ContainerKind::AdaptiveManifest);
    assert_eq!(response.sources[2].quality_label, "Auto quality");

    assert_eq!(response.subtitles.len(), 2);
    assert_eq!(response.subtitles[0].label, "French");
    assert_eq!(response.subtitles[1].kind, SubtitleKind::Caption);
    assert!(response.subtitles.iter().all(|t| !t.active));
}

/// Test: Episode request uses the series resource with season and episode
#[tokio::test]
async fn test_episode_sources_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/stream/series/tt0903747:1:1.json")
        .with_status(200)
        .with_body(r#"{"streams": []}"#)
        .create_async()
        .await;

    let provider = HttpProvider::new(server.url());
    let response = provider
        .resolve_sources(&ResolveRequest::new(ContentKey::episode("tt0903747", 1, 1)))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.sources.is_empty());
    assert!(response.subtitles.is_empty());
}

/// Test: HTTP errors surface as status errors
#[tokio::test]
async fn test_http_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/stream/movie/tt0000001.json")
        .with_status(503)
        .create_async()
        .await;

    let provider = HttpProvider::new(server.url());
    let err = provider
        .resolve_sources(&ResolveRequest::new(ContentKey::movie("tt0000001")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status(503)));
}

/// Test: A body that is not JSON is a malformed response
#[tokio::test]
async fn test_malformed_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/stream/movie/tt0000002.json")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let provider = HttpProvider::new(server.url());
    let err = provider
        .resolve_sources(&ResolveRequest::new(ContentKey::movie("tt0000002")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)));
}

// =============================================================================
// Resolver over HTTP
// =============================================================================

/// Test: Adaptive candidates first, provider order kept, preferred subtitle active
#[tokio::test]
async fn test_resolver_orders_and_selects_subtitle() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/stream/movie/tt1877830.json")
        .with_status(200)
        .with_body(STREAMS_BODY)
        .create_async()
        .await;

    let resolver = SourceResolver::new(Arc::new(HttpProvider::new(server.url())))
        .with_subtitle_languages(vec!["en".to_string()]);
    let resolved = resolver
        .resolve(&ResolveRequest::new(ContentKey::movie("tt1877830")))
        .await
        .unwrap();

    let providers: Vec<_> = resolved.sources.iter().map(|s| s.provider.as_str()).collect();
    assert_eq!(providers, vec!["Edge", "Dash", "Mirror"]);
    assert_eq!(resolved.subtitles.active().unwrap().language, "eng");
}

/// Test: Provider failure and empty lists both mean no source
#[tokio::test]
async fn test_resolver_no_source_available() {
    let mut server = Server::new_async().await;
    let _empty = server
        .mock("GET", "/stream/movie/tt0000003.json")
        .with_status(200)
        .with_body(r#"{"streams": [{"name": "X", "url": ""}]}"#)
        .create_async()
        .await;
    let _down = server
        .mock("GET", "/stream/movie/tt0000004.json")
        .with_status(500)
        .create_async()
        .await;

    let resolver = SourceResolver::new(Arc::new(HttpProvider::new(server.url())));
    for id in ["tt0000003", "tt0000004"] {
        let err = resolver
            .resolve(&ResolveRequest::new(ContentKey::movie(id)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoSourceAvailable(_)));
    }
}
