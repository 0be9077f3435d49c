//! CLI - diagnostic front end for the session runtime
//!
//! Inspects and maintains the local progress cache and queries the stream
//! provider. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Saved position for an episode
//! streamsession progress show tt0903747 -s 1 -e 5
//!
//! # Drop everything past the retention window
//! streamsession progress sweep --json
//!
//! # Playback order of the provider's candidates
//! streamsession sources tt1877830
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::{ContentKey, Quality};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// No saved progress for the content
    NotFound = 4,
    /// No streams available
    NoStreams = 5,
    /// Progress store could not be read or written
    StorageError = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// streamsession - playback session runtime diagnostics
#[derive(Parser, Debug)]
#[command(
    name = "streamsession",
    version,
    about = "Inspect saved playback progress and stream candidates",
    after_help = "EXAMPLES:\n\
                  streamsession progress list              Recently watched\n\
                  streamsession progress clear tt1877830   Forget a position\n\
                  streamsession sources tt1877830 --json   Candidate order"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    /// Default tracing filter directive
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "streamsession=debug"
        } else {
            "streamsession=info"
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or maintain saved positions
    #[command(visible_alias = "p")]
    Progress(ProgressCmd),

    /// List stream candidates in playback order
    #[command(visible_alias = "src")]
    Sources(SourcesCmd),

    /// Show player key bindings
    Keys,
}

/// Content selector shared by commands that target one title
#[derive(Args, Debug, Clone)]
pub struct ContentArgs {
    /// Content ID (e.g., tt1877830)
    #[arg(required = true)]
    pub id: String,

    /// Season number (episodes only)
    #[arg(long, short = 's', requires = "episode")]
    pub season: Option<u16>,

    /// Episode number (episodes only)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,
}

impl ContentArgs {
    pub fn key(&self) -> ContentKey {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => ContentKey::episode(self.id.trim(), s, e),
            _ => ContentKey::movie(self.id.trim()),
        }
    }
}

// =============================================================================
// Progress Command
// =============================================================================

#[derive(Args, Debug)]
pub struct ProgressCmd {
    #[command(subcommand)]
    pub action: ProgressAction,
}

#[derive(Subcommand, Debug)]
pub enum ProgressAction {
    /// Show the resume position for one title
    Show(ContentArgs),

    /// Forget the saved position for one title
    Clear(ContentArgs),

    /// Remove records past the retention window
    Sweep,

    /// List saved positions, most recent first
    #[command(visible_alias = "ls")]
    List(ListCmd),
}

#[derive(Args, Debug)]
pub struct ListCmd {
    /// Maximum number of entries
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,

    /// Include finished titles
    #[arg(long, short = 'a')]
    pub all: bool,
}

// =============================================================================
// Sources Command
// =============================================================================

#[derive(Args, Debug)]
pub struct SourcesCmd {
    #[command(flatten)]
    pub content: ContentArgs,

    /// Title hint passed to the provider
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Minimum quality
    #[arg(long, short = 'Q', value_enum)]
    pub quality: Option<QualityFilter>,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Quality filter for streams
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFilter {
    #[value(name = "4k")]
    Q4k,
    #[value(name = "1080p")]
    Q1080p,
    #[value(name = "720p")]
    Q720p,
    #[value(name = "480p")]
    Q480p,
}

impl QualityFilter {
    pub fn min_quality(self) -> Quality {
        match self {
            QualityFilter::Q4k => Quality::UHD4K,
            QualityFilter::Q1080p => Quality::FHD1080p,
            QualityFilter::Q720p => Quality::HD720p,
            QualityFilter::Q480p => Quality::SD480p,
        }
    }
}

// =============================================================================
// Output Structures (JSON)
// =============================================================================

/// Standard JSON output wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOk {
    pub status: String,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Output helper that respects --json and --quiet flags
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print human-readable lines, or `data` as JSON in JSON mode
    pub fn print_table<T: Serialize>(&self, data: T, lines: &[String]) -> anyhow::Result<()> {
        if self.json {
            return self.print(data);
        }
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Content ID Validation
// =============================================================================

/// Content IDs are opaque but must be non-empty and free of whitespace
pub fn validate_content_id(id: &str) -> Result<&str, &'static str> {
    let id = id.trim();
    if id.is_empty() {
        Err("Content ID must not be empty")
    } else if id.chars().any(char::is_whitespace) {
        Err("Content ID must not contain whitespace")
    } else {
        Ok(id)
    }
}

// =============================================================================
// Tests
// =============================================================================
