//! Sequential, in-order dispatch of one handler method across every matching handler.
//!
//! Each handler's future is awaited to completion before the next one is polled. A handler
//! that errors or panics contributes nothing; the iteration always reaches the end.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::HandlerError;
use crate::handler::{MatchTarget, Method, RegisteredHandler};

/// Last pipeline stage entered, shared with the watchdog for its report.
#[derive(Debug, Clone, Default)]
pub struct StageProbe(Arc<Mutex<String>>);

impl StageProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, stage: impl Into<String>) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *guard = stage.into();
    }

    pub fn current(&self) -> String {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub struct FanOut<'a> {
    handlers: Vec<Arc<RegisteredHandler>>,
    method: Method,
    probe: Option<&'a StageProbe>,
    timing: bool,
}

impl<'a> FanOut<'a> {
    /// Handlers from `handlers`, in order, that match `method` on `target`.
    pub fn matching(handlers: &[Arc<RegisteredHandler>], method: Method, target: &MatchTarget<'_>) -> Self {
        Self {
            handlers: handlers
                .iter()
                .filter(|h| h.matches(method, target))
                .cloned()
                .collect(),
            method,
            probe: None,
            timing: false,
        }
    }

    pub fn with_probe(mut self, probe: &'a StageProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Log per-handler timings at `info` instead of `debug`.
    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn handlers(&self) -> &[Arc<RegisteredHandler>] {
        &self.handlers
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke `call` on each handler in order and collect the successful results.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Vec<T>
    where
        F: FnMut(Arc<RegisteredHandler>) -> Fut,
        Fut: Future<Output = Result<T, HandlerError>>,
    {
        let mut results = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            if let Some(probe) = self.probe {
                probe.enter(format!("{}:{}", self.method, handler.name()));
            }
            let started = Instant::now();
            let outcome = AssertUnwindSafe(call(handler.clone())).catch_unwind().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if self.timing {
                info!(handler = handler.name(), method = %self.method, elapsed_ms, "handler finished");
            } else {
                debug!(handler = handler.name(), method = %self.method, elapsed_ms, "handler finished");
            }
            match outcome {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(HandlerError::Unsupported(method))) => {
                    debug!(handler = handler.name(), %method, "handler advertised a method it does not implement");
                }
                Ok(Err(err)) => {
                    warn!(handler = handler.name(), method = %self.method, error = %err, "handler failed");
                }
                Err(_) => {
                    warn!(handler = handler.name(), method = %self.method, error = %HandlerError::Panicked, "handler failed");
                }
            }
        }
        results
    }

    /// Last non-`None` result in registration order.
    pub async fn run_last<T, F, Fut>(&self, call: F) -> Option<T>
    where
        F: FnMut(Arc<RegisteredHandler>) -> Fut,
        Fut: Future<Output = Result<Option<T>, HandlerError>>,
    {
        self.run(call).await.into_iter().flatten().last()
    }

    /// All results concatenated in registration order.
    pub async fn run_concat<T, F, Fut>(&self, call: F) -> Vec<T>
    where
        F: FnMut(Arc<RegisteredHandler>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, HandlerError>>,
    {
        self.run(call).await.into_iter().flatten().collect()
    }
}
