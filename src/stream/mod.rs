//! Streaming infrastructure
//!
//! - Resolver: provider candidates, ordered for playback
//! - Engine: attaches a source to the media output and recovers from errors
//! - Output: casting / picture-in-picture / fullscreen delegation
//! - Subtitles: track selection and SRT to WebVTT conversion

pub mod engine;
pub mod output;
pub mod resolver;
pub mod subtitles;

pub use engine::{AdaptiveStreamEngine, Demuxer, DemuxerFactory, EngineEvent, MediaOutput};
pub use output::{OutputBridge, OutputRuntime};
pub use resolver::{ResolvedSources, SourceResolver};
pub use subtitles::SubtitleTracks;
