//! Transport Correlator
//!
//! Wraps the single native message channel with request ids, a pending
//! request table and a per-request timeout. Every `send` adds exactly one
//! pending entry and removes it again, whatever the outcome.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::envelope::{peek_request_id, RequestEnvelope, ResponseEnvelope};
use crate::git::error::{GitError, GitResult};

/// Default pending window for git operations
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound half of the native bridge (postMessage-style, fire and forget).
pub trait NativePort: Send + Sync {
    fn post_message(&self, message: String) -> Result<(), String>;
}

/// A native bridge as handed over by the host shell: the outbound port plus
/// the inbound message stream.
pub struct NativeChannel {
    pub port: Arc<dyn NativePort>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl NativeChannel {
    pub fn new(port: Arc<dyn NativePort>, inbound: mpsc::UnboundedReceiver<String>) -> Self {
        Self { port, inbound }
    }
}

impl std::fmt::Debug for NativeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeChannel").finish_non_exhaustive()
    }
}

struct PendingRequest {
    command: String,
    tx: oneshot::Sender<GitResult<Value>>,
}

type PendingTable = Arc<Mutex<HashMap<String, PendingRequest>>>;

fn lock_table(table: &PendingTable) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 请求结束（完成、超时或调用方放弃）时移除 pending 条目
struct PendingGuard<'a> {
    table: &'a PendingTable,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock_table(self.table).remove(self.request_id);
    }
}

pub struct Correlator {
    port: Option<Arc<dyn NativePort>>,
    pending: PendingTable,
    closed: Arc<AtomicBool>,
    timeout: Duration,
    listener: Option<JoinHandle<()>>,
}

impl Correlator {
    /// Bind to a native channel and start the inbound listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(channel: NativeChannel, timeout: Duration) -> Self {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let listener = tokio::spawn(listen(
            channel.inbound,
            pending.clone(),
            closed.clone(),
        ));

        Self {
            port: Some(channel.port),
            pending,
            closed,
            timeout,
            listener: Some(listener),
        }
    }

    /// A correlator with no channel. Every `send` fails immediately.
    pub fn detached(timeout: Duration) -> Self {
        Self {
            port: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(true)),
            timeout,
            listener: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some() && !self.closed.load(Ordering::Acquire)
    }

    /// Number of requests still waiting for a response
    pub fn pending_len(&self) -> usize {
        lock_table(&self.pending).len()
    }

    /// Send one command and wait for its correlated response.
    pub async fn send(&self, command: &str, params: Value) -> GitResult<Value> {
        let port = match &self.port {
            Some(port) if !self.closed.load(Ordering::Acquire) => port.clone(),
            Some(_) => {
                return Err(GitError::TransportUnavailable(
                    "native channel closed".to_string(),
                ))
            }
            None => {
                return Err(GitError::TransportUnavailable(
                    "native bridge not present".to_string(),
                ))
            }
        };

        let request_id = next_request_id();
        let envelope = RequestEnvelope {
            request_id: request_id.clone(),
            command: command.to_string(),
            params,
        };
        let payload = serde_json::to_string(&envelope)?;

        let (tx, rx) = oneshot::channel();
        lock_table(&self.pending).insert(
            request_id.clone(),
            PendingRequest {
                command: command.to_string(),
                tx,
            },
        );
        let _guard = PendingGuard {
            table: &self.pending,
            request_id: &request_id,
        };

        debug!("bridge -> {} ({})", command, request_id);
        port.post_message(payload)
            .map_err(GitError::TransportUnavailable)?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => {
                trace!("bridge <- {} ({}) ok={}", command, request_id, outcome.is_ok());
                outcome
            }
            Ok(Err(_)) => Err(GitError::TransportUnavailable(
                "response handler dropped".to_string(),
            )),
            Err(_) => {
                warn!(
                    "Native request {} ({}) timed out after {:?}",
                    command, request_id, self.timeout
                );
                Err(GitError::TransportTimeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// 毫秒时间戳 + 随机位（UUID v7）
fn next_request_id() -> String {
    Uuid::now_v7().to_string()
}

async fn listen(
    mut inbound: mpsc::UnboundedReceiver<String>,
    pending: PendingTable,
    closed: Arc<AtomicBool>,
) {
    while let Some(raw) = inbound.recv().await {
        route_response(&pending, &raw);
    }

    closed.store(true, Ordering::Release);
    let drained: Vec<PendingRequest> = lock_table(&pending).drain().map(|(_, p)| p).collect();
    if !drained.is_empty() {
        warn!(
            "Native channel closed with {} request(s) in flight",
            drained.len()
        );
    }
    for req in drained {
        let _ = req.tx.send(Err(GitError::TransportUnavailable(format!(
            "native channel closed before '{}' completed",
            req.command
        ))));
    }
}

fn route_response(pending: &PendingTable, raw: &str) {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Dropping unparseable bridge message: {}", e);
            return;
        }
    };

    let Some(request_id) = peek_request_id(&value).map(str::to_string) else {
        warn!("Dropping bridge message without requestId");
        return;
    };

    let Some(req) = lock_table(pending).remove(&request_id) else {
        debug!("Dropping unmatched or late response {}", request_id);
        return;
    };

    let outcome = match serde_json::from_value::<ResponseEnvelope>(value) {
        Ok(resp) if resp.success => Ok(resp.data.unwrap_or(Value::Null)),
        Ok(resp) => Err(GitError::operation(
            req.command.clone(),
            resp.error
                .unwrap_or_else(|| "Unknown native error".to_string()),
        )),
        Err(e) => Err(GitError::Protocol(format!(
            "Malformed response to '{}': {}",
            req.command, e
        ))),
    };

    // 调用方可能已超时离开
    let _ = req.tx.send(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Port that records outbound envelopes without answering.
    #[derive(Default)]
    struct QueuedPort {
        sent: Mutex<Vec<RequestEnvelope>>,
    }

    impl QueuedPort {
        fn take(&self) -> Vec<RequestEnvelope> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl NativePort for QueuedPort {
        fn post_message(&self, message: String) -> Result<(), String> {
            let env: RequestEnvelope = serde_json::from_str(&message).map_err(|e| e.to_string())?;
            self.sent.lock().unwrap().push(env);
            Ok(())
        }
    }

    struct BrokenPort;

    impl NativePort for BrokenPort {
        fn post_message(&self, _message: String) -> Result<(), String> {
            Err("postMessage is not a function".to_string())
        }
    }

    fn setup(timeout: Duration) -> (Arc<Correlator>, Arc<QueuedPort>, mpsc::UnboundedSender<String>) {
        let port = Arc::new(QueuedPort::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let correlator = Correlator::new(NativeChannel::new(port.clone(), rx), timeout);
        (Arc::new(correlator), port, tx)
    }

    async fn wait_for_sent(port: &QueuedPort, n: usize) -> Vec<RequestEnvelope> {
        let mut all = Vec::new();
        for _ in 0..100 {
            all.extend(port.take());
            if all.len() >= n {
                return all;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} outbound requests, got {}", n, all.len());
    }

    fn reply(id: &str, data: Value) -> String {
        serde_json::to_string(&ResponseEnvelope::ok(id, data)).unwrap()
    }

    #[tokio::test]
    async fn test_scrambled_responses_route_to_callers() {
        let (correlator, port, inbound) = setup(DEFAULT_REQUEST_TIMEOUT);

        let mut handles = Vec::new();
        for i in 0..5 {
            let c = correlator.clone();
            handles.push(tokio::spawn(async move {
                c.send("git_status", json!({ "n": i })).await
            }));
        }

        let mut sent = wait_for_sent(&port, 5).await;
        assert_eq!(correlator.pending_len(), 5);

        // 乱序回放
        sent.reverse();
        sent.swap(0, 2);
        for env in &sent {
            let n = env.params["n"].clone();
            inbound.send(reply(&env.request_id, json!({ "echo": n }))).unwrap();
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let data = handle.await.unwrap().unwrap();
            assert_eq!(data["echo"], i);
        }
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_evicts_pending_entry() {
        let (correlator, port, inbound) = setup(Duration::from_secs(30));

        let c = correlator.clone();
        let stale = tokio::spawn(async move { c.send("git_fetch", json!({})).await });
        let stale_env = wait_for_sent(&port, 1).await.remove(0);
        assert_eq!(correlator.pending_len(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        let err = stale.await.unwrap().unwrap_err();
        assert!(matches!(err, GitError::TransportTimeout { ref command, .. } if command == "git_fetch"));
        assert_eq!(correlator.pending_len(), 0);

        // 一个新请求不会被迟到的旧响应误解
        let c = correlator.clone();
        let fresh = tokio::spawn(async move { c.send("git_status", json!({})).await });
        let fresh_env = wait_for_sent(&port, 1).await.remove(0);
        inbound.send(reply(&stale_env.request_id, json!("stale"))).unwrap();
        inbound.send(reply(&fresh_env.request_id, json!("fresh"))).unwrap();

        assert_eq!(fresh.await.unwrap().unwrap(), json!("fresh"));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_failure_response_carries_native_message() {
        let (correlator, port, inbound) = setup(DEFAULT_REQUEST_TIMEOUT);
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send("git_merge", json!({})).await });
        let env = wait_for_sent(&port, 1).await.remove(0);

        let resp = ResponseEnvelope::fail(&env.request_id, "refusing to merge unrelated histories");
        inbound.send(serde_json::to_string(&resp).unwrap()).unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            GitError::operation("git_merge", "refusing to merge unrelated histories")
        );
    }

    #[tokio::test]
    async fn test_malformed_response_consumes_entry() {
        let (correlator, port, inbound) = setup(DEFAULT_REQUEST_TIMEOUT);
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send("git_log", json!({})).await });
        let env = wait_for_sent(&port, 1).await.remove(0);

        inbound
            .send(json!({ "requestId": env.request_id, "success": "maybe" }).to_string())
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, GitError::Protocol(_)));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_garbage_is_dropped() {
        let (correlator, port, inbound) = setup(DEFAULT_REQUEST_TIMEOUT);
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send("git_status", json!({})).await });
        let env = wait_for_sent(&port, 1).await.remove(0);

        inbound.send("not json".to_string()).unwrap();
        inbound.send(json!({ "success": true }).to_string()).unwrap();
        inbound.send(reply(&env.request_id, Value::Null)).unwrap();

        assert_eq!(call.await.unwrap().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_detached_rejects_without_pending_entry() {
        let correlator = Correlator::detached(DEFAULT_REQUEST_TIMEOUT);
        let err = correlator.send("git_init", json!({})).await.unwrap_err();
        assert!(matches!(err, GitError::TransportUnavailable(_)));
        assert_eq!(correlator.pending_len(), 0);
        assert!(!correlator.is_connected());
    }

    #[tokio::test]
    async fn test_post_failure_cleans_up() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let correlator = Correlator::new(
            NativeChannel::new(Arc::new(BrokenPort), rx),
            DEFAULT_REQUEST_TIMEOUT,
        );
        let err = correlator.send("git_init", json!({})).await.unwrap_err();
        assert!(matches!(err, GitError::TransportUnavailable(ref m) if m.contains("postMessage")));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_channel_close_fails_in_flight() {
        let (correlator, port, inbound) = setup(DEFAULT_REQUEST_TIMEOUT);
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send("git_push", json!({})).await });
        wait_for_sent(&port, 1).await;

        drop(inbound);
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, GitError::TransportUnavailable(_)));
        assert!(!correlator.is_connected());
    }
}
