//! Remote progress service client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::models::{ContentKey, ProgressRecord};

/// Progress collaborator
#[async_trait]
pub trait ProgressApi: Send + Sync {
    async fn push_progress(&self, key: &ContentKey, position: f64, duration: f64)
        -> Result<(), ApiError>;

    async fn pull_progress(&self, key: &ContentKey) -> Result<Option<ProgressRecord>, ApiError>;
}

/// Request body for a progress push
#[derive(Debug, Serialize, Deserialize)]
struct PushBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    season: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode: Option<u16>,
    position: f64,
    duration: f64,
}

/// HTTP progress client
pub struct HttpProgressApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProgressApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn resource(&self, key: &ContentKey) -> String {
        format!(
            "{}/progress/{}",
            self.base_url,
            urlencoding::encode(&key.content_id)
        )
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn push_progress(
        &self,
        key: &ContentKey,
        position: f64,
        duration: f64,
    ) -> Result<(), ApiError> {
        let body = PushBody {
            season: key.season,
            episode: key.episode,
            position,
            duration,
        };
        debug!(%key, position, "pushing progress");

        let response = self
            .client
            .put(self.resource(key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn pull_progress(&self, key: &ContentKey) -> Result<Option<ProgressRecord>, ApiError> {
        let mut request = self.client.get(self.resource(key));
        if let (Some(s), Some(e)) = (key.season, key.episode) {
            request = request.query(&[("season", s), ("episode", e)]);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let record: ProgressRecord =
            serde_json::from_str(&text).map_err(|e| ApiError::Malformed(e.to_string()))?;
        Ok(Some(record))
    }
}
