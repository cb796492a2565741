//! Request/response calls from the worker (or a handler) out to the host.
//!
//! Each call gets a fresh correlation id; replies may arrive in any order and are matched
//! back through a shared pending table.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::HostError;
use crate::message::Outbound;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostRequest {
    Exec {
        command: String,
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
    },
    ReadFile {
        path: String,
    },
}

/// Outbound framing: `{id, kind, ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub request: HostRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostReply {
    pub err: Option<String>,
    pub result: Value,
}

type PendingTable = DashMap<u64, oneshot::Sender<HostReply>>;

/// Removes a call's entry once its caller stops waiting, answered or not.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct HostServices {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Arc<PendingTable>,
    next_id: Arc<AtomicU64>,
}

impl HostServices {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            outbound,
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Send `request` and wait for the matching reply without blocking anything else.
    pub async fn request(&self, request: HostRequest) -> Result<Value, HostError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };
        if self
            .outbound
            .send(Outbound::HostRequest(HostEnvelope { id, request }))
            .is_err()
        {
            return Err(HostError::Disconnected);
        }
        let reply = rx.await.map_err(|_| HostError::Disconnected)?;
        match reply.err {
            Some(err) => Err(HostError::Remote(err)),
            None => Ok(reply.result),
        }
    }

    pub async fn exec(&self, command: &str, args: &[&str], cwd: Option<&str>) -> Result<ExecOutput, HostError> {
        let value = self
            .request(HostRequest::Exec {
                command: command.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                cwd: cwd.map(str::to_string),
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, HostError> {
        let value = self.request(HostRequest::ReadFile { path: path.to_string() }).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Ask the host to surface an error to the user. Fire and forget.
    pub fn show_error(&self, message: impl Into<String>, timeout_ms: Option<u64>) {
        let _ = self.outbound.send(Outbound::ShowError {
            message: message.into(),
            timeout: timeout_ms,
        });
    }

    /// Route an inbound reply to its waiter. Returns `false` for unknown or already-settled ids.
    pub fn resolve(&self, id: u64, reply: HostReply) -> bool {
        match self.pending.remove(&id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => {
                debug!(id, "dropping host reply with no pending request");
                false
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_id(msg: Outbound) -> u64 {
        match msg {
            Outbound::HostRequest(env) => env.id,
            other => panic!("expected host request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replies_resolve_out_of_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = HostServices::new(tx);

        let h1 = host.clone();
        let first = tokio::spawn(async move { h1.read_file("/a").await });
        let h2 = host.clone();
        let second = tokio::spawn(async move { h2.read_file("/b").await });

        let id_a = envelope_id(rx.recv().await.unwrap());
        let id_b = envelope_id(rx.recv().await.unwrap());
        assert_ne!(id_a, id_b);
        assert_eq!(host.pending_len(), 2);

        assert!(host.resolve(
            id_b,
            HostReply {
                err: None,
                result: json!("second"),
            }
        ));
        assert!(host.resolve(
            id_a,
            HostReply {
                err: None,
                result: json!("first"),
            }
        ));

        let mut results = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        results.sort();
        assert_eq!(results, vec!["first", "second"]);
        assert_eq!(host.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_and_unknown_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = HostServices::new(tx);
        let h = host.clone();
        let call = tokio::spawn(async move { h.exec("ls", &["-la"], None).await });
        let msg = rx.recv().await.unwrap();
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire["data"]["kind"], "exec");
        assert_eq!(wire["data"]["command"], "ls");
        let id = envelope_id(msg);

        assert!(!host.resolve(
            id + 100,
            HostReply {
                err: None,
                result: Value::Null,
            }
        ));
        host.resolve(
            id,
            HostReply {
                err: Some("permission denied".into()),
                result: Value::Null,
            },
        );
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, HostError::Remote(ref m) if m == "permission denied"));
    }

    #[tokio::test]
    async fn test_closed_bus_reports_disconnected() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let host = HostServices::new(tx);
        let err = host.read_file("/x").await.unwrap_err();
        assert!(matches!(err, HostError::Disconnected));
        assert_eq!(host.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_call_leaves_no_pending_entry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = HostServices::new(tx);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), host.read_file("a.txt")).await;
        assert!(waited.is_err());
        assert_eq!(host.pending_len(), 0);

        let id = envelope_id(rx.recv().await.unwrap());
        let late = HostReply {
            err: None,
            result: json!("late"),
        };
        assert!(!host.resolve(id, late));
    }
}
