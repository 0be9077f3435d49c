//! Per-session timers
//!
//! Three tokio tasks feed ticks into the session loop: the cache-write
//! interval, the remote-sync interval and the controls-idle debounce. All of
//! them are aborted when the session ends, including on drop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::Config;

/// Tick delivered to the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    CacheWrite,
    RemoteSync,
    ControlsIdle,
}

/// Handles of the running timer tasks
pub struct SessionTimers {
    handles: Vec<JoinHandle<()>>,
    controls: Arc<Notify>,
    cancelled: bool,
}

impl SessionTimers {
    /// Spawn the timers. Must be called from within a tokio runtime.
    pub fn start(config: &Config, tx: mpsc::Sender<TimerTick>) -> Self {
        let controls = Arc::new(Notify::new());
        let handles = vec![
            spawn_interval(
                config.progress.cache_write_interval(),
                TimerTick::CacheWrite,
                tx.clone(),
            ),
            spawn_interval(
                config.progress.remote_sync_interval(),
                TimerTick::RemoteSync,
                tx.clone(),
            ),
            spawn_debounce(
                config.playback.controls_hide_after(),
                Arc::clone(&controls),
                tx,
            ),
        ];
        debug!(timers = handles.len(), "session timers started");

        Self {
            handles,
            controls,
            cancelled: false,
        }
    }

    /// Restart the controls-idle countdown
    pub fn poke_controls(&self) {
        if !self.cancelled {
            self.controls.notify_one();
        }
    }

    pub fn cancel_all(&mut self) {
        if self.cancelled {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        self.cancelled = true;
        debug!("session timers cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn spawn_interval(
    period: Duration,
    tick: TimerTick,
    tx: mpsc::Sender<TimerTick>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tx.send(tick).await.is_err() {
                break;
            }
        }
    })
}

fn spawn_debounce(
    delay: Duration,
    poked: Arc<Notify>,
    tx: mpsc::Sender<TimerTick>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            poked.notified().await;
            // Every further poke restarts the countdown
            loop {
                tokio::select! {
                    _ = poked.notified() => continue,
                    _ = tokio::time::sleep(delay) => break,
                }
            }
            if tx.send(TimerTick::ControlsIdle).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_intervals_tick() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timers = SessionTimers::start(&Config::default(), tx);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(rx.recv().await, Some(TimerTick::CacheWrite));

        timers.cancel_all();
        assert!(timers.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_debounce_restarts_on_poke() {
        let mut config = Config::default();
        config.progress.cache_write_interval_secs = 600;
        config.progress.remote_sync_interval_secs = 600;
        let (tx, mut rx) = mpsc::channel(16);
        let timers = SessionTimers::start(&config, tx);

        timers.poke_controls();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        timers.poke_controls();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(rx.recv().await, Some(TimerTick::ControlsIdle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_ticks() {
        let mut config = Config::default();
        config.progress.cache_write_interval_secs = 0;
        let (tx, mut rx) = mpsc::channel(16);
        let _timers = SessionTimers::start(&config, tx);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(rx.recv().await, Some(TimerTick::CacheWrite));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timers = SessionTimers::start(&Config::default(), tx);
        timers.cancel_all();

        tokio::time::sleep(Duration::from_secs(60)).await;
        // Every sender was owned by an aborted task
        assert_eq!(rx.recv().await, None);
    }
}
