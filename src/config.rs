//! Configuration management
//!
//! Handles config file loading/saving and every tunable threshold of the
//! playback runtime. Config is stored at ~/.config/streamsession/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{COMPLETION_THRESHOLD, RESUME_BLOCK_THRESHOLD};

/// Shortest period a session timer may run at; tokio intervals reject zero
const MIN_TIMER_INTERVAL_SECS: u64 = 1;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub progress: ProgressConfig,
    pub provider: ProviderConfig,
}

/// Engine and input tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seek step for arrow keys (seconds)
    pub seek_step_secs: f64,
    /// Volume step for up/down keys (0.0 - 1.0)
    pub volume_step: f64,
    /// Playback rate step
    pub rate_step: f64,
    /// A confirmed seek within this distance of the request needs no correction
    pub seek_tolerance_secs: f64,
    /// Manifest reloads allowed for network errors before giving up on a source
    pub max_network_reloads: u32,
    /// Idle time before on-screen controls are hidden while playing
    pub controls_hide_after_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_step_secs: 10.0,
            volume_step: 0.1,
            rate_step: 0.25,
            seek_tolerance_secs: 0.5,
            max_network_reloads: 3,
            controls_hide_after_ms: 3000,
        }
    }
}

impl PlaybackConfig {
    pub fn controls_hide_after(&self) -> Duration {
        Duration::from_millis(self.controls_hide_after_ms)
    }
}

/// Progress cache and remote sync policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Ratio at which a record counts as watched
    pub completion_threshold: f64,
    /// Ratio at which a stored position is ignored for resume
    pub resume_block_threshold: f64,
    /// Records older than this are treated as absent
    pub retention_days: i64,
    /// Minimum time between coalesced local writes
    pub cache_write_interval_secs: u64,
    /// Minimum position change for a coalesced local write
    pub min_write_delta_secs: f64,
    /// Remote push cadence
    pub remote_sync_interval_secs: u64,
    /// Minimum position change for a remote push
    pub remote_sync_threshold_secs: f64,
    /// Override for the progress file location
    pub store_path: Option<PathBuf>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            completion_threshold: COMPLETION_THRESHOLD,
            resume_block_threshold: RESUME_BLOCK_THRESHOLD,
            retention_days: 30,
            cache_write_interval_secs: 5,
            min_write_delta_secs: 2.0,
            remote_sync_interval_secs: 30,
            remote_sync_threshold_secs: 10.0,
            store_path: None,
        }
    }
}

impl ProgressConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn cache_write_interval(&self) -> Duration {
        Duration::from_secs(self.cache_write_interval_secs.max(MIN_TIMER_INTERVAL_SECS))
    }

    pub fn remote_sync_interval(&self) -> Duration {
        Duration::from_secs(self.remote_sync_interval_secs.max(MIN_TIMER_INTERVAL_SECS))
    }

    /// Raise zero timer periods to the minimum, warning about each
    fn clamp_intervals(&mut self) {
        for (name, secs) in [
            ("cache_write_interval_secs", &mut self.cache_write_interval_secs),
            ("remote_sync_interval_secs", &mut self.remote_sync_interval_secs),
        ] {
            if *secs < MIN_TIMER_INTERVAL_SECS {
                tracing::warn!(
                    setting = name,
                    value = *secs,
                    "timer interval too short, using 1s"
                );
                *secs = MIN_TIMER_INTERVAL_SECS;
            }
        }
    }
}

/// Collaborator endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the stream provider
    pub base_url: Option<String>,
    /// Base URL of the remote progress service
    pub progress_url: Option<String>,
    /// Preferred subtitle languages, in order (e.g., ["eng", "spa"])
    pub subtitle_languages: Vec<String>,
}

impl Config {
    /// Get config file path (~/.config/streamsession/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamsession").join("config.toml"))
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
            .with_env_overrides()
    }

    /// Load config from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let mut config: Self = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match toml::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                    None
                }
            })
            .unwrap_or_default();
        config.progress.clamp_intervals();
        config
    }

    /// Apply `STREAMSESSION_PROVIDER_URL` / `STREAMSESSION_PROGRESS_URL`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("STREAMSESSION_PROVIDER_URL") {
            self.provider.base_url = Some(url);
        }
        if let Ok(url) = std::env::var("STREAMSESSION_PROGRESS_URL") {
            self.provider.progress_url = Some(url);
        }
        self
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.progress.completion_threshold, 0.93);
        assert_eq!(config.progress.resume_block_threshold, 0.95);
        assert!(config.progress.remote_sync_interval() > config.progress.cache_write_interval());
        assert_eq!(config.playback.seek_step_secs, 10.0);
        assert!(config.provider.base_url.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [progress]
            retention_days = 7

            [provider]
            subtitle_languages = ["spa"]
            "#,
        )
        .unwrap();
        assert_eq!(config.progress.retention_days, 7);
        assert_eq!(config.progress.cache_write_interval_secs, 5);
        assert_eq!(config.provider.subtitle_languages, vec!["spa".to_string()]);
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.provider.base_url = Some("http://localhost:7000".into());

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[progress\nbroken").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_zero_timer_intervals_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[progress]\ncache_write_interval_secs = 0\nremote_sync_interval_secs = 0\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.progress.cache_write_interval_secs, 1);
        assert_eq!(config.progress.remote_sync_interval_secs, 1);

        // Built in code, bypassing the loader
        let progress = ProgressConfig {
            cache_write_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(progress.cache_write_interval(), Duration::from_secs(1));
    }
}
