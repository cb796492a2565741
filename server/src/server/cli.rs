use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use plexus_core::message::SwitchFile;
use plexus_core::{Inbound, Marker, Outbound, Severity, WholeDocumentSplitter, Worker, WorkerConfig};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use super::config;
use crate::plugins;

#[derive(Debug, Parser)]
#[command(
    name = "plexus",
    version,
    about = "Coordinates pluggable code intelligence handlers over line-delimited JSON on stdio",
    long_about = None
)]
pub(crate) struct CliArgs {
    /// JSON worker configuration. Falls back to $PLEXUS_CONFIG.
    #[arg(long, value_name = "FILE", value_parser = parse_sanitized_path)]
    pub(crate) config: Option<PathBuf>,

    /// Minimum debounce before an analysis pass, in milliseconds
    #[arg(long, value_name = "MS")]
    pub(crate) min_delay: Option<u64>,

    /// Upper bound for the adaptive debounce and the watchdog, in milliseconds
    #[arg(long, value_name = "MS")]
    pub(crate) max_delay: Option<u64>,

    /// Lowest severity to publish: info, warning or error
    #[arg(long, value_name = "LEVEL")]
    pub(crate) warning_level: Option<Severity>,

    /// Builtin handler to register at startup; repeatable
    #[arg(long = "handler", value_name = "ID")]
    pub(crate) handlers: Vec<String>,

    /// Run one analysis pass over a relative file path, print the markers and exit
    #[arg(long, value_name = "FILE")]
    pub(crate) analyze: Option<String>,

    /// Language of the analyzed file; guessed from the extension by default
    #[arg(long, value_name = "LANG", requires = "analyze")]
    pub(crate) language: Option<String>,

    /// With --analyze, print only errors, one per line
    #[arg(long, requires = "analyze")]
    pub(crate) errors_only: bool,
}

pub(crate) async fn try_cli_analyze(args: &CliArgs) -> anyhow::Result<Option<String>> {
    let Some(path) = args.analyze.as_deref() else {
        return Ok(None);
    };
    let content = read_file_content(path)?;
    let language = args
        .language
        .clone()
        .unwrap_or_else(|| language_for_path(path).to_string());
    let config = config::load(args)?;
    let markers = analyze_once(config, &args.handlers, path, &language, &content).await?;

    if args.errors_only {
        let errors: Vec<String> = markers
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .map(|m| format!("Line {}:{}: {}", m.pos.start.row + 1, m.pos.start.column + 1, m.message))
            .collect();
        if errors.is_empty() {
            return Ok(Some("No errors found".to_string()));
        }
        return Ok(Some(errors.join("\n")));
    }

    let output = serde_json::json!({
        "path": path,
        "language": language,
        "markers": markers,
    });
    Ok(Some(serde_json::to_string_pretty(&output)?))
}

/// Register `handlers` (every builtin when empty), open `content` and wait for its markers.
async fn analyze_once(
    config: WorkerConfig,
    handlers: &[String],
    path: &str,
    language: &str,
    content: &str,
) -> anyhow::Result<Vec<Marker>> {
    let catalog = plugins::catalog();
    let ids = if handlers.is_empty() {
        catalog.ids()
    } else {
        handlers.to_vec()
    };
    let wait = config.max_delay() * 2;
    let (worker, mut events) = Worker::new(config, Arc::new(WholeDocumentSplitter), catalog)?;
    for id in ids {
        worker.dispatch(Inbound::Register {
            handler_id: id,
            source: None,
        });
    }
    worker.dispatch(Inbound::SwitchFile(SwitchFile {
        path: path.to_string(),
        language: language.to_string(),
        text: content.to_string(),
        cursor: Default::default(),
        workspace_dir: None,
        is_console: false,
    }));

    timeout(wait, wait_for_markers(&mut events))
        .await
        .context("analysis did not finish in time")?
}

async fn wait_for_markers(events: &mut UnboundedReceiver<Outbound>) -> anyhow::Result<Vec<Marker>> {
    while let Some(event) = events.recv().await {
        match event {
            Outbound::Markers(markers) => return Ok(markers),
            Outbound::Registered { path, err: Some(err) } => {
                anyhow::bail!("failed to register handler `{path}`: {err}")
            }
            _ => {}
        }
    }
    anyhow::bail!("worker stopped before publishing markers")
}

pub(crate) fn language_for_path(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("ts") => "typescript",
        Some("py") => "python",
        Some("rs") => "rust",
        Some("html" | "htm") => "html",
        Some("css") => "css",
        Some("md") => "markdown",
        Some("json") => "json",
        _ => "text",
    }
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("Parent directory components ('..') are not allowed in file paths.");
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

pub(crate) fn is_safe_path(path: &str) -> bool {
    let path = Path::new(path);

    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return false;
    }

    let s = path.to_string_lossy();
    let suspicious = ['\0', '\n', '\r', '\t'];
    if s.chars().any(|c| suspicious.contains(&c)) {
        return false;
    }
    // Drive-letter prefixes such as `C:`
    if s.len() >= 2 && s.as_bytes()[1] == b':' {
        return false;
    }
    true
}

pub(crate) fn read_file_content(path: &str) -> anyhow::Result<String> {
    if !is_safe_path(path) {
        anyhow::bail!("Unsafe file path: {}", path);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path))
}
