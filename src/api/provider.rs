//! Stream provider client
//!
//! Fetches stream candidates and subtitle tracks from a Stremio-addon-style
//! endpoint. The provider's own source discovery happens server-side.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{
    ContainerKind, ContentKey, MediaKind, StreamSource, SubtitleKind, SubtitleTrack,
};

/// What to resolve sources for
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveRequest {
    pub key: ContentKey,
    /// Human title, a disambiguation hint for the provider
    pub title_hint: Option<String>,
}

impl ResolveRequest {
    pub fn new(key: ContentKey) -> Self {
        Self {
            key,
            title_hint: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.key.kind()
    }
}

/// Raw provider answer, before ordering and validation
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub sources: Vec<StreamSource>,
    pub subtitles: Vec<SubtitleTrack>,
}

/// Provider collaborator
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn resolve_sources(&self, request: &ResolveRequest) -> Result<ProviderResponse, ApiError>;
}

/// Provider API response
#[derive(Debug, Deserialize)]
struct AddonResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
    #[serde(default)]
    subtitles: Vec<AddonSubtitle>,
}

/// Individual stream from the provider
#[derive(Debug, Deserialize)]
struct AddonStream {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "type")]
    container: Option<String>,
}

impl AddonStream {
    /// Convert API response to our StreamSource model.
    /// Streams without a url are dropped.
    fn into_stream_source(self) -> Option<StreamSource> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let container = match self.container.as_deref() {
            Some("hls") | Some("dash") | Some("adaptive") => ContainerKind::AdaptiveManifest,
            Some("file") | Some("progressive") | Some("mp4") => ContainerKind::Progressive,
            _ => ContainerKind::infer(&url),
        };
        let (provider, quality_label) = split_name(&self.name);
        let quality_label = if quality_label.is_empty() {
            self.title.unwrap_or_default()
        } else {
            quality_label
        };

        Some(StreamSource {
            provider,
            url,
            container,
            quality_label,
        })
    }
}

/// Individual subtitle from the provider
#[derive(Debug, Deserialize)]
struct AddonSubtitle {
    url: String,
    lang: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

impl AddonSubtitle {
    fn into_track(self) -> SubtitleTrack {
        let kind = match self.kind.as_deref() {
            Some("captions") | Some("caption") => SubtitleKind::Caption,
            _ => SubtitleKind::Subtitle,
        };
        let label = self
            .label
            .unwrap_or_else(|| crate::stream::subtitles::lang_code_to_name(&self.lang));
        SubtitleTrack {
            url: self.url,
            language: self.lang,
            label,
            kind,
            active: false,
        }
    }
}

/// Split "Provider\n1080p" into ("Provider", "1080p")
fn split_name(name: &str) -> (String, String) {
    match name.split_once('\n') {
        Some((provider, quality)) => (provider.trim().to_string(), quality.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

/// HTTP provider client
pub struct HttpProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Create a client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the resource URL for a request
    pub fn url_for(&self, request: &ResolveRequest) -> String {
        let key = &request.key;
        let mut url = match (key.season, key.episode) {
            (Some(s), Some(e)) => format!(
                "{}/stream/series/{}:{}:{}.json",
                self.base_url,
                urlencoding::encode(&key.content_id),
                s,
                e
            ),
            _ => format!(
                "{}/stream/movie/{}.json",
                self.base_url,
                urlencoding::encode(&key.content_id)
            ),
        };
        if let Some(title) = &request.title_hint {
            url.push_str("?title=");
            url.push_str(&urlencoding::encode(title));
        }
        url
    }
}

#[async_trait]
impl ProviderApi for HttpProvider {
    async fn resolve_sources(
        &self,
        request: &ResolveRequest,
    ) -> Result<ProviderResponse, ApiError> {
        let url = self.url_for(request);
        debug!(%url, "resolving sources");

        let response = self.client.get(&url).send().await?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let data: AddonResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Malformed(e.to_string()))?;

        Ok(ProviderResponse {
            sources: data
                .streams
                .into_iter()
                .filter_map(AddonStream::into_stream_source)
                .collect(),
            subtitles: data.subtitles.into_iter().map(AddonSubtitle::into_track).collect(),
        })
    }
}
