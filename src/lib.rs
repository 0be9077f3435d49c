//! streamsession - client-side media playback session runtime
//!
//! Resolves a streaming source for a piece of content, drives adaptive
//! playback through the embedding runtime's media output, persists viewing
//! progress locally and remotely, and recovers from streaming errors by
//! falling back through the candidate list.
//!
//! # Modules
//!
//! - `models` - Content keys, sources, subtitle tracks, progress records, the session aggregate
//! - `api` - Provider and progress service clients
//! - `stream` - Source resolution, the adaptive engine, subtitles, output bridge
//! - `progress` - Local progress cache, storage backends, remote sync
//! - `session` - State machine, controller, input, skip segments, event loop
//! - `cli` / `commands` - The diagnostic binary

pub mod api;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use models::{
    ContainerKind, ContentKey, MediaKind, PlaybackSession, ProgressRecord, Quality,
    SegmentCategory, SkipSegment, StreamSource, SubFormat, SubtitleKind, SubtitleTrack,
};

pub use api::{HttpProgressApi, HttpProvider, ProgressApi, ProviderApi};
pub use config::Config;
pub use error::{ApiError, SessionError, StorageError};
pub use progress::{ProgressCache, RemoteSync};
pub use session::{SessionController, SessionEvent, SessionRuntime, SessionState};
pub use stream::{AdaptiveStreamEngine, OutputBridge, SourceResolver};
