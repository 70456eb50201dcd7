//! Interface to the monitoring backend.
//!
//! The dashboard core never talks to Hadoop directly; everything flows
//! through this trait so the TUI, the one-shot CLI commands, and the tests
//! can share one seam. [`crate::http::HttpBackend`] is the production
//! implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::DashResult;
use crate::types::{ClusterSnapshot, FailoverOutcome, FailoverTarget, JobDescriptor};

/// One server-push message before decoding: the event name and its raw
/// data payload. Decoding (and dropping malformed payloads) is the stream
/// client's job, not the transport's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// A long-lived, server-driven message sequence. Delivery is best-effort,
/// at-most-once per message; the consumer must tolerate gaps.
pub type RawEventStream = Pin<Box<dyn Stream<Item = DashResult<SseEvent>> + Send>>;

#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// One-shot status pull, used at startup and as disconnect fallback.
    async fn get_cluster_status(&self) -> DashResult<ClusterSnapshot>;

    /// Open the metrics push stream. Each message carries a
    /// [`ClusterSnapshot`]-shaped JSON fragment.
    async fn open_metrics_stream(&self) -> DashResult<RawEventStream>;

    /// Open the log push stream. Each message carries an ordered batch of
    /// log records as JSON.
    async fn open_log_stream(&self) -> DashResult<RawEventStream>;

    /// Trigger a manual failover. A single request/response; the command is
    /// idempotent from the caller's perspective, so a manual retry is safe.
    async fn trigger_failover(
        &self,
        target: FailoverTarget,
        force: bool,
    ) -> DashResult<FailoverOutcome>;

    /// Currently running YARN applications, pulled on demand.
    async fn list_running_jobs(&self) -> DashResult<Vec<JobDescriptor>>;
}
