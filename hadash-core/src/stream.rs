//! Resilient push-stream client.
//!
//! One `StreamClient` owns one logical server-push stream (metrics or
//! logs). It decodes each raw message into a typed [`StreamEvent`] and
//! forwards it in arrival order; malformed payloads are logged and dropped.
//! On connect failure or mid-stream disconnect it schedules exactly one
//! reconnect attempt after a fixed backoff and repeats indefinitely.
//! Exponential backoff is deliberately not used: for an operator tool a
//! predictable 5 second cadence is easier to reason about.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::{ClusterBackend, RawEventStream, SseEvent};
use crate::error::{DashError, DashResult};
use crate::types::{ClusterSnapshot, LogRecord};

/// Which logical stream a client is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Metrics,
    Logs,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Metrics => "metrics",
            StreamKind::Logs => "logs",
        }
    }
}

/// A decoded, validated push message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Snapshot(ClusterSnapshot),
    Logs(Vec<LogRecord>),
}

/// Current state of the push connection, published via `watch` so the
/// fallback poll can detect prolonged disconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

pub struct StreamClient {
    kind: StreamKind,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StreamClient {
    /// Spawn the connection task. Decoded events are delivered through
    /// `events`; dropping the receiver tears the client down.
    pub fn spawn(
        backend: Arc<dyn ClusterBackend>,
        kind: StreamKind,
        events: mpsc::UnboundedSender<StreamEvent>,
        reconnect_backoff: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(
            backend,
            kind,
            events,
            reconnect_backoff,
            state_tx,
            shutdown_rx,
        ));
        Self {
            kind,
            state_rx,
            shutdown_tx,
            handle,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ConnectionState::Open
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Tear the client down. Cancels any pending reconnect timer so a
    /// stale reconnect cannot revive a torn-down client.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn run(
    backend: Arc<dyn ClusterBackend>,
    kind: StreamKind,
    events: mpsc::UnboundedSender<StreamEvent>,
    reconnect_backoff: Duration,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match open(&*backend, kind).await {
            Ok(stream) => {
                let _ = state_tx.send(ConnectionState::Open);
                info!(stream = kind.as_str(), "push stream connected");
                let finished = pump(kind, stream, &events, &mut shutdown_rx).await;
                let _ = state_tx.send(ConnectionState::Closed);
                if finished == Pump::Stop {
                    return;
                }
            }
            Err(e) => {
                warn!(stream = kind.as_str(), error = %e, "failed to open push stream");
            }
        }

        // Exactly one reconnect attempt per disconnect, after a fixed
        // backoff. Shutdown during the wait cancels the reconnect.
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(reconnect_backoff) => {}
        }
    }
    let _ = state_tx.send(ConnectionState::Closed);
}

async fn open(backend: &dyn ClusterBackend, kind: StreamKind) -> DashResult<RawEventStream> {
    match kind {
        StreamKind::Metrics => backend.open_metrics_stream().await,
        StreamKind::Logs => backend.open_log_stream().await,
    }
}

#[derive(PartialEq)]
enum Pump {
    Reconnect,
    Stop,
}

/// Forward messages until the stream ends, errors, or shutdown is
/// requested. Arrival order is processing order; nothing is buffered ahead.
async fn pump(
    kind: StreamKind,
    mut stream: RawEventStream,
    events: &mpsc::UnboundedSender<StreamEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Pump {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => return Pump::Stop,
            message = stream.next() => match message {
                Some(Ok(raw)) => match decode(kind, &raw) {
                    Ok(event) => {
                        if events.send(event).is_err() {
                            // Consumer is gone; nothing left to do.
                            return Pump::Stop;
                        }
                    }
                    Err(e) => {
                        warn!(stream = kind.as_str(), error = %e, "dropping malformed stream payload");
                    }
                },
                Some(Err(e)) => {
                    warn!(stream = kind.as_str(), error = %e, "push stream transport error");
                    return Pump::Reconnect;
                }
                None => {
                    info!(stream = kind.as_str(), "push stream closed by server");
                    return Pump::Reconnect;
                }
            }
        }
    }
}

fn decode(kind: StreamKind, raw: &SseEvent) -> DashResult<StreamEvent> {
    let decode_err = |e: serde_json::Error| DashError::Decode {
        message: format!("{} payload: {e}", kind.as_str()),
    };
    match kind {
        StreamKind::Metrics => {
            let snapshot: ClusterSnapshot = serde_json::from_str(&raw.data).map_err(decode_err)?;
            Ok(StreamEvent::Snapshot(snapshot))
        }
        StreamKind::Logs => {
            let records: Vec<LogRecord> = serde_json::from_str(&raw.data).map_err(decode_err)?;
            Ok(StreamEvent::Logs(records))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use crate::types::{FailoverOutcome, FailoverTarget, JobDescriptor};
    use async_trait::async_trait;

    /// What the scripted backend does for one connection attempt.
    enum Connect {
        Refuse,
        Serve(Vec<DashResult<SseEvent>>),
        Hold(mpsc::UnboundedReceiver<DashResult<SseEvent>>),
    }

    struct ScriptedBackend {
        attempts: AtomicUsize,
        script: Mutex<VecDeque<Connect>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Connect>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClusterBackend for ScriptedBackend {
        async fn get_cluster_status(&self) -> DashResult<ClusterSnapshot> {
            Ok(ClusterSnapshot::default())
        }

        async fn open_metrics_stream(&self) -> DashResult<RawEventStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Connect::Serve(items)) => Ok(Box::pin(futures::stream::iter(items))),
                Some(Connect::Hold(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
                Some(Connect::Refuse) | None => Err(DashError::Transport {
                    message: "connection refused".to_string(),
                }),
            }
        }

        async fn open_log_stream(&self) -> DashResult<RawEventStream> {
            self.open_metrics_stream().await
        }

        async fn trigger_failover(
            &self,
            target: FailoverTarget,
            _force: bool,
        ) -> DashResult<FailoverOutcome> {
            Ok(FailoverOutcome::succeeded(target))
        }

        async fn list_running_jobs(&self) -> DashResult<Vec<JobDescriptor>> {
            Ok(Vec::new())
        }
    }

    fn metrics_event(json: &str) -> DashResult<SseEvent> {
        Ok(SseEvent {
            event: "metrics".to_string(),
            data: json.to_string(),
        })
    }

    /// Give spawned tasks a chance to run without advancing the clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_valid_and_drops_malformed_payloads() {
        let backend = ScriptedBackend::new(vec![Connect::Serve(vec![
            metrics_event(r#"{"cluster_health":{"status":"good","percentage":80.0}}"#),
            metrics_event("this is not json"),
            metrics_event(r#"{"cluster_health":{"status":"critical","percentage":20.0}}"#),
        ])]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = StreamClient::spawn(
            backend.clone(),
            StreamKind::Metrics,
            tx,
            Duration::from_secs(5),
        );
        settle().await;

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 2, "malformed payload must be skipped");
        assert!(matches!(received[0], StreamEvent::Snapshot(_)));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn schedules_exactly_one_reconnect_after_fixed_backoff() {
        let backend = ScriptedBackend::new(vec![Connect::Serve(vec![]), Connect::Refuse]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = StreamClient::spawn(
            backend.clone(),
            StreamKind::Metrics,
            tx,
            Duration::from_secs(5),
        );

        settle().await;
        assert_eq!(backend.attempts(), 1);

        tokio::time::advance(Duration::from_millis(4_999)).await;
        settle().await;
        assert_eq!(backend.attempts(), 1, "no reconnect before the backoff");

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(backend.attempts(), 2, "one reconnect after the backoff");

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_reconnect() {
        let backend = ScriptedBackend::new(vec![Connect::Serve(vec![])]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = StreamClient::spawn(
            backend.clone(),
            StreamKind::Metrics,
            tx,
            Duration::from_secs(5),
        );

        settle().await;
        assert_eq!(backend.attempts(), 1);

        client.shutdown().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(backend.attempts(), 1, "shutdown must suppress the reconnect");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_state_tracks_stream_lifecycle() {
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let backend = ScriptedBackend::new(vec![Connect::Hold(server_rx)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = StreamClient::spawn(
            backend.clone(),
            StreamKind::Metrics,
            tx,
            Duration::from_secs(5),
        );

        settle().await;
        assert!(client.is_connected());

        server_tx
            .send(metrics_event(r#"{"timestamp":"2026-08-24T10:00:00"}"#))
            .unwrap();
        settle().await;
        assert!(rx.try_recv().is_ok());

        // Server goes away; the client reports Closed while it waits out
        // the backoff.
        drop(server_tx);
        settle().await;
        assert!(!client.is_connected());

        client.shutdown().await;
    }
}
