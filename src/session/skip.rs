//! Skip-segment tracking
//!
//! Offers each intro/recap/credits segment at most once per session.

use std::collections::HashSet;
use tracing::debug;

use crate::models::SkipSegment;

/// Larger forward steps between time updates are jumps, not playback
const MAX_PLAYBACK_STEP_SECS: f64 = 5.0;

/// Tracks which segments have already been skipped or played through
#[derive(Debug, Clone, Default)]
pub struct SkipSegmentTracker {
    segments: Vec<SkipSegment>,
    consumed: HashSet<usize>,
    /// Last time observed through normal playback
    last_time: Option<f64>,
}

impl SkipSegmentTracker {
    /// Segments with `end <= start` are dropped
    pub fn new(mut segments: Vec<SkipSegment>) -> Self {
        segments.retain(|s| s.start.is_finite() && s.end.is_finite() && s.end > s.start);
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            segments,
            consumed: HashSet::new(),
            last_time: None,
        }
    }

    pub fn segments(&self) -> &[SkipSegment] {
        &self.segments
    }

    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.contains(&index)
    }

    /// Observe a playback time update. A segment is consumed when playback
    /// crosses its end; jumps over it leave it on offer.
    pub fn update(&mut self, t: f64) {
        if let Some(previous) = self.last_time {
            let step = t - previous;
            if step > 0.0 && step <= MAX_PLAYBACK_STEP_SECS {
                for (i, segment) in self.segments.iter().enumerate() {
                    if previous < segment.end && t >= segment.end && self.consumed.insert(i) {
                        debug!(category = %segment.category, "segment played through");
                    }
                }
            }
        }
        self.last_time = Some(t);
    }

    /// A seek landed at `t`; the next update starts a new playback run
    pub fn seeked(&mut self, t: f64) {
        self.last_time = Some(t);
    }

    /// The unconsumed segment containing `t`, if any
    pub fn active(&self, t: f64) -> Option<&SkipSegment> {
        self.active_index(t).map(|i| &self.segments[i])
    }

    /// Skip the active segment: returns where to seek and consumes it
    pub fn skip(&mut self, t: f64) -> Option<f64> {
        let index = self.active_index(t)?;
        self.consumed.insert(index);
        let segment = &self.segments[index];
        debug!(category = %segment.category, to = segment.end, "skipping segment");
        Some(segment.end)
    }

    fn active_index(&self, t: f64) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .find(|(i, s)| !self.consumed.contains(i) && s.contains(t))
            .map(|(i, _)| i)
    }
}
