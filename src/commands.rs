//! CLI Command Handlers
//!
//! Each handler takes CLI args, the loaded config and Output, returns ExitCode.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::api::{HttpProvider, ProviderApi};
use crate::cli::{
    validate_content_id, ContentArgs, ExitCode, ListCmd, Output, ProgressAction, SourcesCmd,
    StatusOk,
};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::{ApiError, SessionError};
use crate::models::{ContentKey, ProgressRecord, StreamSource};
use crate::progress::{FileStorage, ProgressCache};
use crate::session::input::key_bindings;
use crate::stream::SourceResolver;

/// Open the on-disk progress cache configured in `config`
pub fn open_cache(config: &Config) -> anyhow::Result<ProgressCache> {
    let path = config
        .progress
        .store_path
        .clone()
        .unwrap_or_else(FileStorage::default_path);
    let storage = FileStorage::open(&path)
        .with_context(|| format!("Failed to open progress store at {}", path.display()))?;
    Ok(ProgressCache::new(
        Box::new(storage),
        Arc::new(SystemClock),
        config.progress.clone(),
    ))
}

fn content_key(args: &ContentArgs, output: &Output) -> Result<ContentKey, ExitCode> {
    validate_content_id(&args.id).map_err(|e| output.error(e, ExitCode::InvalidArgs))?;
    Ok(args.key())
}

// =============================================================================
// Progress Command
// =============================================================================

#[derive(Serialize)]
struct ProgressEntry {
    key: ContentKey,
    #[serde(flatten)]
    record: ProgressRecord,
    resumable: bool,
}

#[derive(Serialize)]
struct SweepResult {
    removed: usize,
}

pub fn progress_cmd(action: ProgressAction, config: &Config, output: &Output) -> ExitCode {
    let mut cache = match open_cache(config) {
        Ok(cache) => cache,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::StorageError),
    };

    match action {
        ProgressAction::Show(args) => progress_show(&mut cache, &args, output),
        ProgressAction::Clear(args) => progress_clear(&mut cache, &args, output),
        ProgressAction::Sweep => progress_sweep(&mut cache, output),
        ProgressAction::List(cmd) => progress_list(&mut cache, &cmd, output),
    }
}

fn progress_show(cache: &mut ProgressCache, args: &ContentArgs, output: &Output) -> ExitCode {
    let key = match content_key(args, output) {
        Ok(key) => key,
        Err(code) => return code,
    };

    match cache.lookup(&key) {
        Ok(Some(record)) => {
            let entry = ProgressEntry {
                resumable: cache.is_resumable(&record),
                key,
                record,
            };
            let line = format!(
                "{}: {}{}",
                entry.key,
                entry.record,
                if entry.resumable { "" } else { " (starts over)" }
            );
            if let Err(e) = output.print_table(&entry, &[line]) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Ok(None) => output.error(format!("No saved progress for {}", key), ExitCode::NotFound),
        // Unreadable records are purged by the lookup
        Err(e @ SessionError::ResumeReadError(_)) => {
            output.error(e.to_string(), ExitCode::NotFound)
        }
        Err(e) => output.error(e.to_string(), ExitCode::StorageError),
    }
}

fn progress_clear(cache: &mut ProgressCache, args: &ContentArgs, output: &Output) -> ExitCode {
    let key = match content_key(args, output) {
        Ok(key) => key,
        Err(code) => return code,
    };

    match cache.clear(&key) {
        Ok(()) => {
            output.info(format!("Cleared saved position for {}", key));
            if output.json {
                if let Err(e) = output.print(StatusOk::default()) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            }
            ExitCode::Success
        }
        Err(e) => output.error(format!("Failed to clear {}: {}", key, e), ExitCode::StorageError),
    }
}

fn progress_sweep(cache: &mut ProgressCache, output: &Output) -> ExitCode {
    match cache.sweep() {
        Ok(removed) => {
            let line = format!("Removed {} expired record(s)", removed);
            if let Err(e) = output.print_table(SweepResult { removed }, &[line]) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(format!("Sweep failed: {}", e), ExitCode::StorageError),
    }
}

fn progress_list(cache: &mut ProgressCache, cmd: &ListCmd, output: &Output) -> ExitCode {
    let entries = match cache.entries() {
        Ok(entries) => entries,
        Err(e) => {
            return output.error(
                format!("Failed to read progress: {}", e),
                ExitCode::StorageError,
            )
        }
    };

    let entries: Vec<ProgressEntry> = entries
        .into_iter()
        .filter(|(_, record)| cmd.all || !record.completed)
        .take(cmd.limit)
        .map(|(key, record)| ProgressEntry {
            resumable: cache.is_resumable(&record),
            key,
            record,
        })
        .collect();

    if entries.is_empty() {
        output.info("Nothing in progress");
    }

    let lines: Vec<String> = entries
        .iter()
        .map(|e| format!("{:<28} {}", e.key.to_string(), e.record))
        .collect();
    if let Err(e) = output.print_table(&entries, &lines) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Sources Command
// =============================================================================

#[derive(Serialize)]
struct IndexedSource {
    index: usize,
    quality: String,
    #[serde(flatten)]
    source: StreamSource,
}

pub async fn sources_cmd(cmd: SourcesCmd, config: &Config, output: &Output) -> ExitCode {
    let key = match content_key(&cmd.content, output) {
        Ok(key) => key,
        Err(code) => return code,
    };
    let Some(base_url) = config.provider.base_url.clone() else {
        return output.error(
            "No provider configured (set provider.base_url or STREAMSESSION_PROVIDER_URL)",
            ExitCode::InvalidArgs,
        );
    };

    let provider = Arc::new(HttpProvider::new(base_url));
    let resolver = SourceResolver::new(provider.clone())
        .with_subtitle_languages(config.provider.subtitle_languages.clone());
    let mut request = crate::api::ResolveRequest::new(key.clone());
    if let Some(title) = &cmd.title {
        request = request.with_title(title);
    }

    output.info(format!("Finding streams for: {}", key));

    // Fetched here rather than through `resolve` so transport failures keep
    // their own exit code
    let response = match provider.resolve_sources(&request).await {
        Ok(response) => response,
        Err(e @ ApiError::Http(_)) => {
            return output.error(format!("Provider unreachable: {}", e), ExitCode::NetworkError)
        }
        Err(e) => return output.error(e.to_string(), ExitCode::NoStreams),
    };

    match resolver.resolve_response(&request, response) {
        Ok(resolved) => {
            let mut sources = resolved.sources;
            if let Some(filter) = cmd.quality {
                let min = filter.min_quality();
                sources.retain(|s| s.quality() >= min);
            }
            if sources.is_empty() {
                return output.error("No streams match the quality filter", ExitCode::NoStreams);
            }
            sources.truncate(cmd.limit);

            let indexed: Vec<IndexedSource> = sources
                .into_iter()
                .enumerate()
                .map(|(index, source)| IndexedSource {
                    index,
                    quality: source.quality().to_string(),
                    source,
                })
                .collect();
            let lines: Vec<String> = indexed
                .iter()
                .map(|s| format!("{:>2}. {}", s.index, s.source))
                .collect();

            if let Err(e) = output.print_table(&indexed, &lines) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(e.to_string(), ExitCode::NoStreams),
    }
}

// =============================================================================
// Keys Command
// =============================================================================

#[derive(Serialize)]
struct Binding {
    key: &'static str,
    action: &'static str,
}

pub fn keys_cmd(output: &Output) -> ExitCode {
    let bindings: Vec<Binding> = key_bindings()
        .iter()
        .map(|&(key, action)| Binding { key, action })
        .collect();
    let lines: Vec<String> = bindings
        .iter()
        .map(|b| format!("{:<12} {}", b.key, b.action))
        .collect();
    if let Err(e) = output.print_table(&bindings, &lines) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}
