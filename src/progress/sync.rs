//! Remote progress sync
//!
//! Best-effort push of the session position to the progress service on a
//! slow cadence. Pushes run as detached tasks and never hold up local
//! playback or cache writes; failures are logged and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ProgressApi;
use crate::config::ProgressConfig;
use crate::error::SessionError;
use crate::models::{ContentKey, ProgressRecord};

/// Per-session remote sync state
pub struct RemoteSync {
    api: Arc<dyn ProgressApi>,
    key: ContentKey,
    threshold: f64,
    last_synced: Arc<Mutex<Option<f64>>>,
    busy: Arc<AtomicBool>,
}

impl RemoteSync {
    pub fn new(api: Arc<dyn ProgressApi>, key: ContentKey, config: &ProgressConfig) -> Self {
        Self {
            api,
            key,
            threshold: config.remote_sync_threshold_secs,
            last_synced: Arc::new(Mutex::new(None)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Position last acknowledged by the service
    pub fn last_synced(&self) -> Option<f64> {
        self.last_synced.lock().ok().and_then(|g| *g)
    }

    /// Whether `position` has drifted far enough from the last sync
    pub fn should_push(&self, position: f64) -> bool {
        match self.last_synced() {
            Some(last) => (position - last).abs() > self.threshold,
            None => true,
        }
    }

    /// Periodic tick. Spawns a push when the drift exceeds the threshold and
    /// no earlier push is still in flight.
    pub fn tick(&self, position: f64, duration: f64) -> Option<JoinHandle<()>> {
        if duration <= 0.0 || !self.should_push(position) {
            return None;
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!(key = %self.key, "previous push still in flight, skipping tick");
            return None;
        }
        Some(self.spawn_push(position, duration))
    }

    /// Final best-effort push on teardown; skipped only if nothing changed
    pub fn flush(&self, position: f64, duration: f64) -> Option<JoinHandle<()>> {
        if duration <= 0.0 || self.last_synced() == Some(position) {
            return None;
        }
        self.busy.store(true, Ordering::Release);
        Some(self.spawn_push(position, duration))
    }

    /// Pull the remote record; errors are logged and read as absent
    pub async fn pull(&self) -> Option<ProgressRecord> {
        match self.api.pull_progress(&self.key).await {
            Ok(record) => {
                if let Some(r) = &record {
                    if let Ok(mut last) = self.last_synced.lock() {
                        *last = Some(r.position);
                    }
                }
                record
            }
            Err(e) => {
                let err = SessionError::RemoteSyncError(e);
                warn!(key = %self.key, error = %err, "remote progress pull failed");
                None
            }
        }
    }

    fn spawn_push(&self, position: f64, duration: f64) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let key = self.key.clone();
        let last_synced = Arc::clone(&self.last_synced);
        let busy = Arc::clone(&self.busy);

        tokio::spawn(async move {
            match api.push_progress(&key, position, duration).await {
                Ok(()) => {
                    if let Ok(mut last) = last_synced.lock() {
                        *last = Some(position);
                    }
                    debug!(%key, position, "remote progress pushed");
                }
                Err(e) => {
                    let err = SessionError::RemoteSyncError(e);
                    warn!(%key, position, error = %err, "dropping remote progress push");
                }
            }
            busy.store(false, Ordering::Release);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingApi {
        pushes: Mutex<Vec<f64>>,
        fail: bool,
    }

    #[async_trait]
    impl ProgressApi for RecordingApi {
        async fn push_progress(
            &self,
            _key: &ContentKey,
            position: f64,
            _duration: f64,
        ) -> Result<(), ApiError> {
            if self.fail {
                return Err(ApiError::Status(500));
            }
            self.pushes.lock().unwrap().push(position);
            Ok(())
        }

        async fn pull_progress(
            &self,
            _key: &ContentKey,
        ) -> Result<Option<ProgressRecord>, ApiError> {
            Err(ApiError::Status(503))
        }
    }

    #[tokio::test]
    async fn test_push_only_after_threshold() {
        let api = Arc::new(RecordingApi::default());
        let sync = RemoteSync::new(
            api.clone(),
            ContentKey::movie("m1"),
            &ProgressConfig::default(),
        );

        sync.tick(5.0, 100.0).unwrap().await.unwrap();
        assert_eq!(sync.last_synced(), Some(5.0));

        assert!(sync.tick(12.0, 100.0).is_none());
        sync.tick(16.0, 100.0).unwrap().await.unwrap();

        assert_eq!(*api.pushes.lock().unwrap(), vec![5.0, 16.0]);
    }

    #[tokio::test]
    async fn test_failed_push_does_not_advance_last_synced() {
        let api = Arc::new(RecordingApi {
            fail: true,
            ..Default::default()
        });
        let sync = RemoteSync::new(api, ContentKey::movie("m1"), &ProgressConfig::default());

        sync.tick(50.0, 100.0).unwrap().await.unwrap();
        assert_eq!(sync.last_synced(), None);
        // Next tick may try again
        assert!(sync.tick(50.0, 100.0).is_some());
    }

    #[tokio::test]
    async fn test_pull_error_reads_as_absent() {
        let sync = RemoteSync::new(
            Arc::new(RecordingApi::default()),
            ContentKey::movie("m1"),
            &ProgressConfig::default(),
        );
        assert!(sync.pull().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_skips_unchanged_position() {
        let api = Arc::new(RecordingApi::default());
        let sync = RemoteSync::new(
            api.clone(),
            ContentKey::movie("m1"),
            &ProgressConfig::default(),
        );

        sync.tick(40.0, 100.0).unwrap().await.unwrap();
        assert!(sync.flush(40.0, 100.0).is_none());
        sync.flush(41.0, 100.0).unwrap().await.unwrap();
        assert_eq!(*api.pushes.lock().unwrap(), vec![40.0, 41.0]);
    }
}
