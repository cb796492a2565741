//! Line-delimited JSON over a byte stream: one [`Inbound`] per input line, one [`Outbound`]
//! per output line.

use std::sync::Arc;

use anyhow::Context;
use plexus_core::{Inbound, Outbound, Worker};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Pump `input` into the worker and worker events into `output` until `input` closes.
///
/// Events already queued when the input ends are still written; results of work that is
/// still in flight are not waited for.
pub(crate) async fn serve<R, W>(
    worker: Arc<Worker>,
    mut events: UnboundedReceiver<Outbound>,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read from input")? {
                    Some(line) => handle_line(&worker, &line),
                    None => break,
                }
            }
            Some(event) = events.recv() => write_event(&mut output, &event).await?,
        }
    }
    info!("input closed, shutting down");
    while let Ok(event) = events.try_recv() {
        write_event(&mut output, &event).await?;
    }
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}

fn handle_line(worker: &Arc<Worker>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<Inbound>(line) {
        Ok(message) => worker.dispatch(message),
        Err(err) => warn!(error = %err, "rejected malformed message"),
    }
}

async fn write_event<W: AsyncWrite + Unpin>(output: &mut W, event: &Outbound) -> anyhow::Result<()> {
    let mut encoded = serde_json::to_vec(event).context("Failed to encode event")?;
    encoded.push(b'\n');
    output.write_all(&encoded).await.context("Failed to write event")?;
    output.flush().await.context("Failed to flush output")?;
    debug!(bytes = encoded.len(), "event written");
    Ok(())
}
