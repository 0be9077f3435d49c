//! Data structures shared across the playback runtime
//!
//! Organized by domain:
//! - **Content**: media kind and the `(content, season, episode)` key
//! - **Sources**: stream candidates and quality labels
//! - **Subtitles**: subtitle/caption tracks
//! - **Progress**: persisted viewing progress
//! - **Segments**: skippable ranges (intro, recap, credits)
//! - **Session**: the live playback aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::session::state::SessionState;

/// Ratio at which a record counts as watched
pub const COMPLETION_THRESHOLD: f64 = 0.93;

/// Ratio at which a stored position is ignored for resume purposes
pub const RESUME_BLOCK_THRESHOLD: f64 = 0.95;

// =============================================================================
// Content Models
// =============================================================================

/// Single feature vs. episodic content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "Movie"),
            MediaKind::Episode => write!(f, "Episode"),
        }
    }
}

/// Identity of one watchable item: `(content id, season, episode)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub content_id: String,
    pub season: Option<u16>,
    pub episode: Option<u16>,
}

impl ContentKey {
    pub fn movie(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn episode(content_id: impl Into<String>, season: u16, episode: u16) -> Self {
        Self {
            content_id: content_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match (self.season, self.episode) {
            (Some(_), Some(_)) => MediaKind::Episode,
            _ => MediaKind::Movie,
        }
    }

    /// Key used by progress storage backends
    pub fn storage_key(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("progress:{}:s{}:e{}", self.content_id, s, e),
            _ => format!("progress:{}", self.content_id),
        }
    }

    /// Inverse of [`ContentKey::storage_key`]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let rest = key.strip_prefix("progress:")?;
        let mut parts = rest.rsplitn(3, ':');
        let last = parts.next()?;
        if let (Some(ep), Some(season), Some(id)) = (
            last.strip_prefix('e'),
            parts.next().and_then(|p| p.strip_prefix('s')),
            parts.next(),
        ) {
            if let (Ok(s), Ok(e)) = (season.parse(), ep.parse()) {
                return Some(Self::episode(id, s, e));
            }
        }
        if rest.is_empty() {
            None
        } else {
            Some(Self::movie(rest))
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => write!(f, "{} S{:02}E{:02}", self.content_id, s, e),
            _ => write!(f, "{}", self.content_id),
        }
    }
}

// =============================================================================
// Source Models
// =============================================================================

/// Video quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    UHD4K,
    FHD1080p,
    HD720p,
    SD480p,
    #[default]
    Unknown,
}

impl Quality {
    /// Parse quality from a provider label (e.g., "4K", "1080p", "HLS 720p")
    pub fn from_label(s: &str) -> Self {
        let s_lower = s.to_lowercase();
        if s_lower.contains("4k") || s_lower.contains("2160p") || s_lower.contains("uhd") {
            return Quality::UHD4K;
        }
        if s_lower.contains("fhd") {
            return Quality::FHD1080p;
        }

        let re = regex::Regex::new(r"(\d{3,4})p\b").ok();
        if let Some(caps) = re.as_ref().and_then(|re| re.captures(&s_lower)) {
            let lines: u32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            return match lines {
                l if l >= 2160 => Quality::UHD4K,
                l if l >= 1080 => Quality::FHD1080p,
                l if l >= 720 => Quality::HD720p,
                l if l > 0 => Quality::SD480p,
                _ => Quality::Unknown,
            };
        }

        if s_lower.contains("hd") && !s_lower.contains("hdcam") {
            Quality::HD720p
        } else if s_lower.contains("sd") {
            Quality::SD480p
        } else {
            Quality::Unknown
        }
    }

    /// Quality ranking for sorting (higher = better)
    pub fn rank(&self) -> u8 {
        match self {
            Quality::UHD4K => 4,
            Quality::FHD1080p => 3,
            Quality::HD720p => 2,
            Quality::SD480p => 1,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::UHD4K => write!(f, "4K"),
            Quality::FHD1080p => write!(f, "1080p"),
            Quality::HD720p => write!(f, "720p"),
            Quality::SD480p => write!(f, "480p"),
            Quality::Unknown => write!(f, "???"),
        }
    }
}

impl Ord for Quality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// How a source is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Multi-variant playlist fetched incrementally (HLS, DASH)
    AdaptiveManifest,
    /// Single media file played directly
    Progressive,
}

impl ContainerKind {
    /// Infer the container from a URL's path extension
    pub fn infer(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".m3u8") || path.ends_with(".mpd") || path.contains("/manifest") {
            ContainerKind::AdaptiveManifest
        } else {
            ContainerKind::Progressive
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, ContainerKind::AdaptiveManifest)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::AdaptiveManifest => write!(f, "adaptive"),
            ContainerKind::Progressive => write!(f, "progressive"),
        }
    }
}

/// A candidate playable asset. Never mutated once selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSource {
    pub provider: String,
    pub url: String,
    pub container: ContainerKind,
    pub quality_label: String,
}

impl StreamSource {
    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        container: ContainerKind,
        quality_label: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            url: url.into(),
            container,
            quality_label: quality_label.into(),
        }
    }

    pub fn quality(&self) -> Quality {
        Quality::from_label(&self.quality_label)
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) {}",
            self.quality(),
            self.provider,
            self.container,
            self.url
        )
    }
}

// =============================================================================
// Subtitle Models
// =============================================================================

/// Subtitle vs. closed caption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleKind {
    #[default]
    Subtitle,
    Caption,
}

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubFormat {
    Srt,
    WebVtt,
    Ass,
}

impl SubFormat {
    /// Parse format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "vtt" | "webvtt" => SubFormat::WebVtt,
            "ass" | "ssa" => SubFormat::Ass,
            _ => SubFormat::Srt,
        }
    }

    /// Guess the format from a track URL
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.rsplit_once('.')
            .map(|(_, ext)| Self::from_extension(ext))
            .unwrap_or(SubFormat::Srt)
    }
}

impl fmt::Display for SubFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubFormat::Srt => write!(f, "SRT"),
            SubFormat::WebVtt => write!(f, "WebVTT"),
            SubFormat::Ass => write!(f, "ASS"),
        }
    }
}

/// A subtitle or caption track offered for the current content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub language: String,
    pub label: String,
    pub kind: SubtitleKind,
    #[serde(default)]
    pub active: bool,
}

impl SubtitleTrack {
    pub fn format(&self) -> SubFormat {
        SubFormat::from_url(&self.url)
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.active { "● " } else { "" };
        write!(f, "{}[{}] {}", marker, self.language, self.label)
    }
}

// =============================================================================
// Progress Models
// =============================================================================

/// Persisted viewing progress for one [`ContentKey`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub position: f64,
    pub duration: f64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
}

impl ProgressRecord {
    /// Build a record, deriving `completed` from the given threshold
    pub fn new(position: f64, duration: f64, updated_at: DateTime<Utc>, threshold: f64) -> Self {
        let mut record = Self {
            position,
            duration,
            updated_at,
            completed: false,
        };
        record.completed = record.ratio() >= threshold;
        record
    }

    /// `position / duration`, 0 for an invalid duration
    pub fn ratio(&self) -> f64 {
        if self.duration > 0.0 {
            self.position / self.duration
        } else {
            0.0
        }
    }

    pub fn is_valid(&self) -> bool {
        self.position.is_finite()
            && self.duration.is_finite()
            && self.position >= 0.0
            && self.duration > 0.0
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({:.0}%){}",
            format_duration(Duration::from_secs_f64(self.position.max(0.0))),
            format_duration(Duration::from_secs_f64(self.duration.max(0.0))),
            self.ratio() * 100.0,
            if self.completed { " ✓" } else { "" }
        )
    }
}

// =============================================================================
// Segment Models
// =============================================================================

/// Category of a skippable segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentCategory {
    Intro,
    Recap,
    Credits,
    Other(String),
}

impl fmt::Display for SegmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentCategory::Intro => write!(f, "Intro"),
            SegmentCategory::Recap => write!(f, "Recap"),
            SegmentCategory::Credits => write!(f, "Credits"),
            SegmentCategory::Other(label) => write!(f, "{}", label),
        }
    }
}

/// A labeled time range the viewer may skip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipSegment {
    pub start: f64,
    pub end: f64,
    pub category: SegmentCategory,
}

impl SkipSegment {
    pub fn new(start: f64, end: f64, category: SegmentCategory) -> Self {
        Self {
            start,
            end,
            category,
        }
    }

    /// Half-open containment: `start <= t < end`
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

// =============================================================================
// Session Model
// =============================================================================

/// The live aggregate for one watch attempt
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub key: ContentKey,
    pub source: Option<StreamSource>,
    current_time: f64,
    duration: f64,
    buffered: f64,
    pub rate: f64,
    pub volume: f64,
    pub muted: bool,
    pub state: SessionState,
}

impl PlaybackSession {
    /// Create a new session in `Idle`
    pub fn new(key: ContentKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            source: None,
            current_time: 0.0,
            duration: 0.0,
            buffered: 0.0,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            state: SessionState::Idle,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.key.kind()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn buffered(&self) -> f64 {
        self.buffered
    }

    /// Set current time, clamped into `[0, duration]` once duration is known
    pub fn set_current_time(&mut self, t: f64) {
        if !t.is_finite() {
            return;
        }
        self.current_time = self.clamp(t);
    }

    pub fn set_duration(&mut self, d: f64) {
        if d.is_finite() && d >= 0.0 {
            self.duration = d;
            self.current_time = self.clamp(self.current_time);
            self.buffered = self.clamp(self.buffered);
        }
    }

    pub fn set_buffered(&mut self, b: f64) {
        if b.is_finite() {
            self.buffered = self.clamp(b);
        }
    }

    fn clamp(&self, t: f64) -> f64 {
        if self.duration > 0.0 {
            t.clamp(0.0, self.duration)
        } else {
            t.max(0.0)
        }
    }

    /// `current_time / duration`, 0 while duration is unknown
    pub fn played_fraction(&self) -> f64 {
        if self.duration > 0.0 {
            self.current_time / self.duration
        } else {
            0.0
        }
    }

    /// `buffered / duration`, 0 while duration is unknown
    pub fn buffered_fraction(&self) -> f64 {
        if self.duration > 0.0 {
            self.buffered / self.duration
        } else {
            0.0
        }
    }
}

impl fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} / {}",
            self.key,
            self.state,
            format_duration(Duration::from_secs_f64(self.current_time)),
            format_duration(Duration::from_secs_f64(self.duration))
        )
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format a Duration as HH:MM:SS or MM:SS
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
