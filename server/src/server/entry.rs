use std::sync::Arc;

use clap::Parser;
use plexus_core::{Inbound, WholeDocumentSplitter, Worker};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::cli::{CliArgs, try_cli_analyze};
use super::{config, transport};
use crate::plugins;

const DEFAULT_LOG_FILTER: &str = "info";

pub async fn run() {
    let args = CliArgs::parse();
    if let Some(output) = try_cli_analyze(&args).await.unwrap_or_else(|e| {
        eprintln!("plexus analyze error: {e:#}");
        std::process::exit(2);
    }) {
        println!("{}", output);
        return;
    }

    init_tracing();
    if let Err(err) = serve_stdio(&args).await {
        error!("server stopped: {err:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the message bus.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn serve_stdio(args: &CliArgs) -> anyhow::Result<()> {
    let config = config::load(args)?;
    let catalog = plugins::catalog();
    info!(handlers = ?catalog.ids(), min_delay_ms = config.min_delay_ms, "starting plexus");
    let (worker, events) = Worker::new(config, Arc::new(WholeDocumentSplitter), catalog)?;
    for id in &args.handlers {
        worker.dispatch(Inbound::Register {
            handler_id: id.clone(),
            source: None,
        });
    }
    transport::serve(worker, events, tokio::io::stdin(), tokio::io::stdout()).await
}
