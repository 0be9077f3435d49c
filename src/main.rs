//! streamsession - diagnostics for the playback session runtime
//!
//! # Usage
//!
//! ```bash
//! streamsession progress list
//! streamsession progress show tt0903747 -s 1 -e 5 --json
//! streamsession sources tt1877830 -Q 1080p
//! streamsession keys
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use streamsession::cli::{Cli, Command, ExitCode, Output};
use streamsession::commands;
use streamsession::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let exit_code = run_cli(cli).await;
    exit_code.into()
}

/// Logs go to stderr so stdout stays parseable
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = match &cli.config {
        Some(path) => Config::load_from(path).with_env_overrides(),
        None => Config::load(),
    };

    match cli.command {
        Command::Progress(cmd) => commands::progress_cmd(cmd.action, &config, &output),
        Command::Sources(cmd) => commands::sources_cmd(cmd, &config, &output).await,
        Command::Keys => commands::keys_cmd(&output),
    }
}
