//! Clients for external collaborators
//!
//! - Provider: stream candidates and subtitle tracks for a content id
//! - Progress: remote push/pull of viewing progress

pub mod progress;
pub mod provider;

pub use progress::{HttpProgressApi, ProgressApi};
pub use provider::{HttpProvider, ProviderApi, ProviderResponse, ResolveRequest};
