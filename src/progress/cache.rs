//! Local progress cache
//!
//! Stores the last-known position per [`ContentKey`] and applies the resume
//! policy: stale records (past retention) and nearly-finished records (past
//! the resume-block threshold) read back as absent.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ProgressConfig;
use crate::error::{SessionError, StorageError};
use crate::models::{ContentKey, ProgressRecord};
use crate::progress::storage::{MemoryStorage, Storage};

/// Progress cache over a pluggable [`Storage`]
pub struct ProgressCache {
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: ProgressConfig,
}

impl ProgressCache {
    pub fn new(storage: Box<dyn Storage>, clock: Arc<dyn Clock>, config: ProgressConfig) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    /// Cache backed by [`MemoryStorage`] and the system clock
    pub fn in_memory(config: ProgressConfig) -> Self {
        Self::new(Box::new(MemoryStorage::new()), Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resume lookup. Absent when missing, unreadable, expired, or past the
    /// resume-block threshold.
    pub fn read(&mut self, key: &ContentKey) -> Option<ProgressRecord> {
        match self.try_read(key) {
            Ok(record) => record,
            Err(e) => {
                warn!(%key, error = %e, "treating unreadable progress as absent");
                None
            }
        }
    }

    /// Like [`ProgressCache::read`] but surfaces `ResumeReadError`
    pub fn try_read(&mut self, key: &ContentKey) -> Result<Option<ProgressRecord>, SessionError> {
        let Some(record) = self.lookup(key)? else {
            return Ok(None);
        };
        if !self.is_resumable(&record) {
            debug!(%key, ratio = record.ratio(), "resume blocked, starting from zero");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Fetch a live record ignoring the resume-block policy.
    /// Expired and corrupt records are purged as a side effect.
    pub fn lookup(&mut self, key: &ContentKey) -> Result<Option<ProgressRecord>, SessionError> {
        let storage_key = key.storage_key();
        let raw = self
            .storage
            .get(&storage_key)
            .map_err(|e| SessionError::ResumeReadError(e.to_string()))?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let record = match serde_json::from_str::<ProgressRecord>(&raw) {
            Ok(record) if record.is_valid() => record,
            Ok(_) => {
                self.purge(&storage_key);
                return Err(SessionError::ResumeReadError(format!(
                    "invalid record for {}",
                    key
                )));
            }
            Err(e) => {
                self.purge(&storage_key);
                return Err(SessionError::ResumeReadError(e.to_string()));
            }
        };

        if self.is_expired(&record) {
            debug!(%key, updated_at = %record.updated_at, "purging expired progress");
            self.purge(&storage_key);
            return Ok(None);
        }

        Ok(Some(self.with_completion(record)))
    }

    /// Persist a position. Returns `Ok(false)` when the input is rejected.
    pub fn write(
        &mut self,
        key: &ContentKey,
        position: f64,
        duration: f64,
    ) -> Result<bool, StorageError> {
        if !position.is_finite() || !duration.is_finite() || position < 0.0 || duration <= 0.0 {
            debug!(%key, position, duration, "rejecting invalid progress write");
            return Ok(false);
        }

        let record = ProgressRecord::new(
            position,
            duration,
            self.clock.now(),
            self.config.completion_threshold,
        );
        let json = serde_json::to_string(&record)?;
        self.storage.set(&key.storage_key(), json)?;
        Ok(true)
    }

    /// Store a record obtained elsewhere (e.g. pulled from the remote service)
    pub fn seed(
        &mut self,
        key: &ContentKey,
        record: &ProgressRecord,
    ) -> Result<bool, StorageError> {
        if !record.is_valid() || self.is_expired(record) {
            return Ok(false);
        }
        let json = serde_json::to_string(&self.with_completion(record.clone()))?;
        self.storage.set(&key.storage_key(), json)?;
        Ok(true)
    }

    /// Explicitly forget a position (restarting a watch)
    pub fn clear(&mut self, key: &ContentKey) -> Result<(), StorageError> {
        self.storage.remove(&key.storage_key())
    }

    /// Remove every expired or unreadable record. Returns how many were removed.
    pub fn sweep(&mut self) -> Result<usize, StorageError> {
        let mut removed = 0;
        for storage_key in self.storage.keys()? {
            if ContentKey::from_storage_key(&storage_key).is_none() {
                continue;
            }
            let stale = match self.storage.get(&storage_key)? {
                Some(raw) => match serde_json::from_str::<ProgressRecord>(&raw) {
                    Ok(record) => !record.is_valid() || self.is_expired(&record),
                    Err(_) => true,
                },
                None => false,
            };
            if stale {
                self.storage.remove(&storage_key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "swept progress cache");
        }
        Ok(removed)
    }

    /// All live records, sorted by most recently updated
    pub fn entries(&mut self) -> Result<Vec<(ContentKey, ProgressRecord)>, StorageError> {
        let mut entries = Vec::new();
        for storage_key in self.storage.keys()? {
            let Some(key) = ContentKey::from_storage_key(&storage_key) else {
                continue;
            };
            if let Ok(Some(record)) = self.lookup(&key) {
                entries.push((key, record));
            }
        }
        entries.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));
        Ok(entries)
    }

    /// Whether a record is eligible for resume
    pub fn is_resumable(&self, record: &ProgressRecord) -> bool {
        record.ratio() < self.config.resume_block_threshold
    }

    fn is_expired(&self, record: &ProgressRecord) -> bool {
        self.clock.now() - record.updated_at > self.config.retention()
    }

    fn with_completion(&self, mut record: ProgressRecord) -> ProgressRecord {
        record.completed = record.ratio() >= self.config.completion_threshold;
        record
    }

    fn purge(&mut self, storage_key: &str) {
        if let Err(e) = self.storage.remove(storage_key) {
            warn!(key = storage_key, error = %e, "failed to purge progress record");
        }
    }
}

/// What happened to a write offered to [`ProgressWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Persisted,
    Coalesced,
    Rejected,
    Failed,
}

/// Coalesces frequent position updates into periodic cache writes
#[derive(Debug, Clone)]
pub struct ProgressWriter {
    interval: Duration,
    min_delta: f64,
    last_write_at: Option<DateTime<Utc>>,
    last_position: Option<f64>,
}

impl ProgressWriter {
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            interval: config.cache_write_interval(),
            min_delta: config.min_write_delta_secs,
            last_write_at: None,
            last_position: None,
        }
    }

    /// Offer a position. The first write of a session and any `force`d
    /// write always go through; others need both the interval to have
    /// elapsed and the position to have moved by at least the minimum delta.
    pub fn offer(
        &mut self,
        cache: &mut ProgressCache,
        key: &ContentKey,
        position: f64,
        duration: f64,
        force: bool,
    ) -> WriteOutcome {
        let now = cache.now();

        if !force {
            if let (Some(at), Some(last)) = (self.last_write_at, self.last_position) {
                let elapsed = (now - at).to_std().unwrap_or(Duration::ZERO);
                if elapsed < self.interval || (position - last).abs() < self.min_delta {
                    return WriteOutcome::Coalesced;
                }
            }
        }

        match cache.write(key, position, duration) {
            Ok(true) => {
                self.last_write_at = Some(now);
                self.last_position = Some(position);
                WriteOutcome::Persisted
            }
            Ok(false) => WriteOutcome::Rejected,
            Err(e) => {
                let err = SessionError::PersistenceWriteError(e);
                warn!(%key, error = %err, "dropping progress write");
                WriteOutcome::Failed
            }
        }
    }

    pub fn last_position(&self) -> Option<f64> {
        self.last_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock() -> (ProgressCache, ManualClock) {
        let clock = ManualClock::default();
        let cache = ProgressCache::new(
            Box::new(MemoryStorage::new()),
            Arc::new(clock.clone()),
            ProgressConfig::default(),
        );
        (cache, clock)
    }

    #[test]
    fn test_write_then_read() {
        let (mut cache, _) = cache_with_clock();
        let key = ContentKey::movie("m1");
        assert!(cache.write(&key, 600.0, 1200.0).unwrap());

        let record = cache.read(&key).unwrap();
        assert_eq!(record.position, 600.0);
        assert_eq!(record.duration, 1200.0);
        assert!(!record.completed);
    }

    #[test]
    fn test_invalid_writes_are_noops() {
        let (mut cache, _) = cache_with_clock();
        let key = ContentKey::movie("m1");
        assert!(!cache.write(&key, -1.0, 100.0).unwrap());
        assert!(!cache.write(&key, 10.0, 0.0).unwrap());
        assert!(!cache.write(&key, 10.0, -5.0).unwrap());
        assert!(!cache.write(&key, f64::NAN, 100.0).unwrap());
        assert!(cache.read(&key).is_none());
    }

    #[test]
    fn test_resume_block_threshold() {
        let (mut cache, _) = cache_with_clock();
        let key = ContentKey::movie("m1");

        cache.write(&key, 949.0, 1000.0).unwrap();
        assert!(cache.read(&key).is_some());

        cache.write(&key, 950.0, 1000.0).unwrap();
        assert!(cache.read(&key).is_none());
        // Blocked, not deleted
        assert!(cache.lookup(&key).unwrap().is_some());
    }

    #[test]
    fn test_expired_record_is_purged() {
        let (mut cache, clock) = cache_with_clock();
        let key = ContentKey::episode("s1", 1, 1);
        cache.write(&key, 100.0, 1000.0).unwrap();

        clock.advance(chrono::Duration::days(31));
        assert!(cache.read(&key).is_none());

        // Still absent after moving the clock back: it was removed
        clock.advance(chrono::Duration::days(-31));
        assert!(cache.read(&key).is_none());
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let mut storage = MemoryStorage::new();
        storage.set("progress:m1", "garbage".into()).unwrap();
        let mut cache = ProgressCache::new(
            Box::new(storage),
            Arc::new(ManualClock::default()),
            ProgressConfig::default(),
        );
        let key = ContentKey::movie("m1");

        assert!(matches!(
            cache.try_read(&key),
            Err(SessionError::ResumeReadError(_))
        ));
        assert!(cache.read(&key).is_none());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let (mut cache, clock) = cache_with_clock();
        cache.write(&ContentKey::movie("old"), 10.0, 100.0).unwrap();
        clock.advance(chrono::Duration::days(40));
        cache.write(&ContentKey::movie("new"), 10.0, 100.0).unwrap();

        assert_eq!(cache.sweep().unwrap(), 1);
        assert_eq!(cache.sweep().unwrap(), 0);
        assert!(cache.read(&ContentKey::movie("new")).is_some());
    }

    #[test]
    fn test_writer_coalesces_small_rapid_updates() {
        let (mut cache, clock) = cache_with_clock();
        let key = ContentKey::movie("m1");
        let mut writer = ProgressWriter::new(&ProgressConfig::default());

        assert_eq!(writer.offer(&mut cache, &key, 10.0, 100.0, false), WriteOutcome::Persisted);
        assert_eq!(writer.offer(&mut cache, &key, 10.5, 100.0, false), WriteOutcome::Coalesced);

        // Interval elapsed but position barely moved
        clock.advance(chrono::Duration::seconds(6));
        assert_eq!(writer.offer(&mut cache, &key, 11.0, 100.0, false), WriteOutcome::Coalesced);

        assert_eq!(writer.offer(&mut cache, &key, 20.0, 100.0, false), WriteOutcome::Persisted);
        // Moved enough but too soon after the last write
        assert_eq!(writer.offer(&mut cache, &key, 30.0, 100.0, false), WriteOutcome::Coalesced);

        // Forced teardown write always persists
        assert_eq!(writer.offer(&mut cache, &key, 30.2, 100.0, true), WriteOutcome::Persisted);
        assert_eq!(cache.read(&key).unwrap().position, 30.2);
    }

    #[test]
    fn test_entries_sorted_by_recency() {
        let (mut cache, clock) = cache_with_clock();
        cache.write(&ContentKey::movie("first"), 10.0, 100.0).unwrap();
        clock.advance(chrono::Duration::minutes(5));
        cache.write(&ContentKey::episode("show", 2, 3), 10.0, 100.0).unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, ContentKey::episode("show", 2, 3));
    }
}
