//! Source resolution
//!
//! Asks the provider for candidates, drops malformed ones and orders the
//! rest: adaptive manifests first, provider order otherwise preserved.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ProviderApi, ProviderResponse, ResolveRequest};
use crate::error::SessionError;
use crate::models::{StreamSource, SubtitleTrack};
use crate::stream::subtitles::SubtitleTracks;

/// Ordered candidates for one play request
#[derive(Debug, Clone)]
pub struct ResolvedSources {
    pub sources: Vec<StreamSource>,
    pub subtitles: SubtitleTracks,
}

/// Resolves stream candidates through a [`ProviderApi`]
pub struct SourceResolver {
    provider: Arc<dyn ProviderApi>,
    subtitle_languages: Vec<String>,
}

impl SourceResolver {
    pub fn new(provider: Arc<dyn ProviderApi>) -> Self {
        Self {
            provider,
            subtitle_languages: Vec::new(),
        }
    }

    /// Pre-activate the first subtitle track matching these languages
    pub fn with_subtitle_languages(mut self, languages: Vec<String>) -> Self {
        self.subtitle_languages = languages;
        self
    }

    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedSources, SessionError> {
        let response = self.provider.resolve_sources(request).await.map_err(|e| {
            warn!(key = %request.key, error = %e, "provider request failed");
            SessionError::NoSourceAvailable(request.key.to_string())
        })?;
        self.resolve_response(request, response)
    }

    /// Order and filter a response already fetched from the provider
    pub fn resolve_response(
        &self,
        request: &ResolveRequest,
        response: ProviderResponse,
    ) -> Result<ResolvedSources, SessionError> {
        let sources = order_sources(response.sources);
        if sources.is_empty() {
            return Err(SessionError::NoSourceAvailable(request.key.to_string()));
        }

        let mut subtitles = SubtitleTracks::new(valid_tracks(response.subtitles));
        if subtitles.active().is_none() {
            subtitles.select_preferred(&self.subtitle_languages);
        }

        info!(
            key = %request.key,
            sources = sources.len(),
            subtitles = subtitles.tracks().len(),
            "sources resolved"
        );
        Ok(ResolvedSources { sources, subtitles })
    }
}

/// Drop unusable candidates and put adaptive manifests first (stable)
pub fn order_sources(sources: Vec<StreamSource>) -> Vec<StreamSource> {
    let (adaptive, progressive): (Vec<_>, Vec<_>) = sources
        .into_iter()
        .filter(is_well_formed)
        .partition(|s| s.container.is_adaptive());
    adaptive.into_iter().chain(progressive).collect()
}

fn is_well_formed(source: &StreamSource) -> bool {
    let url = source.url.trim();
    !url.is_empty() && url.contains("://")
}

fn valid_tracks(tracks: Vec<SubtitleTrack>) -> Vec<SubtitleTrack> {
    tracks
        .into_iter()
        .filter(|t| !t.url.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContainerKind;

    fn src(name: &str, container: ContainerKind) -> StreamSource {
        StreamSource::new(name, format!("https://cdn.example/{}", name), container, "720p")
    }

    #[test]
    fn test_adaptive_first_preserving_order() {
        let ordered = order_sources(vec![
            src("p1", ContainerKind::Progressive),
            src("a1", ContainerKind::AdaptiveManifest),
            src("p2", ContainerKind::Progressive),
            src("a2", ContainerKind::AdaptiveManifest),
        ]);
        let names: Vec<_> = ordered.iter().map(|s| s.provider.as_str()).collect();
        assert_eq!(names, vec!["a1", "a2", "p1", "p2"]);
    }

    #[test]
    fn test_malformed_sources_dropped() {
        let mut bad = src("bad", ContainerKind::Progressive);
        bad.url = "not a url".into();
        let ordered = order_sources(vec![bad, src("ok", ContainerKind::Progressive)]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].provider, "ok");
    }
}
