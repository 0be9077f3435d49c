//! Output bridge: casting, picture-in-picture and fullscreen
//!
//! The runtime stays the source of truth for what is actually active; the
//! bridge only remembers what was requested. Missing capabilities turn the
//! corresponding action into a no-op.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors reported by the runtime's output API
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output request rejected: {0}")]
    Rejected(String),
    #[error("No cast device selected")]
    NoDevice,
}

/// Output capabilities provided by the embedding runtime
pub trait OutputRuntime: Send + Sync {
    fn cast_available(&self) -> bool {
        false
    }
    fn pip_available(&self) -> bool {
        false
    }
    fn fullscreen_available(&self) -> bool {
        false
    }
    fn start_cast(&self, _url: &str) -> Result<(), OutputError> {
        Ok(())
    }
    fn stop_cast(&self) -> Result<(), OutputError> {
        Ok(())
    }
    fn enter_pip(&self) -> Result<(), OutputError> {
        Ok(())
    }
    fn exit_pip(&self) -> Result<(), OutputError> {
        Ok(())
    }
    fn set_fullscreen(&self, _on: bool) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Delegates output requests to an optional runtime
#[derive(Default)]
pub struct OutputBridge {
    runtime: Option<Arc<dyn OutputRuntime>>,
    cast_requested: bool,
    pip_requested: bool,
    fullscreen_requested: bool,
}

impl OutputBridge {
    pub fn new(runtime: Option<Arc<dyn OutputRuntime>>) -> Self {
        Self {
            runtime,
            ..Default::default()
        }
    }

    pub fn cast_available(&self) -> bool {
        self.runtime.as_ref().is_some_and(|r| r.cast_available())
    }

    pub fn pip_available(&self) -> bool {
        self.runtime.as_ref().is_some_and(|r| r.pip_available())
    }

    pub fn fullscreen_available(&self) -> bool {
        self.runtime.as_ref().is_some_and(|r| r.fullscreen_available())
    }

    pub fn cast_requested(&self) -> bool {
        self.cast_requested
    }

    pub fn pip_requested(&self) -> bool {
        self.pip_requested
    }

    pub fn fullscreen_requested(&self) -> bool {
        self.fullscreen_requested
    }

    /// Start casting `url`. `Ok(false)` when casting is unavailable.
    pub fn start_cast(&mut self, url: &str) -> Result<bool, OutputError> {
        let Some(runtime) = self.capable(|r| r.cast_available()) else {
            debug!("cast unavailable, ignoring request");
            return Ok(false);
        };
        runtime.start_cast(url)?;
        self.cast_requested = true;
        Ok(true)
    }

    pub fn stop_cast(&mut self) -> Result<bool, OutputError> {
        let Some(runtime) = self.capable(|r| r.cast_available()) else {
            return Ok(false);
        };
        runtime.stop_cast()?;
        self.cast_requested = false;
        Ok(true)
    }

    pub fn toggle_pip(&mut self) -> Result<bool, OutputError> {
        let Some(runtime) = self.capable(|r| r.pip_available()) else {
            debug!("picture-in-picture unavailable, ignoring request");
            return Ok(false);
        };
        if self.pip_requested {
            runtime.exit_pip()?;
        } else {
            runtime.enter_pip()?;
        }
        self.pip_requested = !self.pip_requested;
        Ok(true)
    }

    pub fn toggle_fullscreen(&mut self) -> Result<bool, OutputError> {
        let Some(runtime) = self.capable(|r| r.fullscreen_available()) else {
            return Ok(false);
        };
        runtime.set_fullscreen(!self.fullscreen_requested)?;
        self.fullscreen_requested = !self.fullscreen_requested;
        Ok(true)
    }

    /// Release everything that was requested (session teardown)
    pub fn release(&mut self) {
        if self.pip_requested {
            if let Err(e) = self.toggle_pip() {
                debug!(error = %e, "failed to exit picture-in-picture");
            }
        }
        if self.cast_requested {
            if let Err(e) = self.stop_cast() {
                debug!(error = %e, "failed to stop cast");
            }
        }
    }

    fn capable(
        &self,
        check: impl Fn(&dyn OutputRuntime) -> bool,
    ) -> Option<Arc<dyn OutputRuntime>> {
        self.runtime
            .as_ref()
            .filter(|r| check(r.as_ref()))
            .cloned()
    }
}
