//! HTTP implementation of [`ClusterBackend`] against the monitoring
//! service: plain JSON endpoints for one-shot pulls and commands, and
//! Server-Sent Events for the metrics and log push streams.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use url::Url;

use crate::backend::{ClusterBackend, RawEventStream, SseEvent};
use crate::error::{DashError, DashResult};
use crate::types::{isotime, ClusterSnapshot, FailoverOutcome, FailoverTarget, JobDescriptor};

pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> DashResult<Self> {
        // Validate eagerly so a bad URL fails at startup, not mid-stream.
        Url::parse(base_url).map_err(|e| DashError::Configuration {
            message: format!("invalid backend URL '{base_url}': {e}"),
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn open_sse(&self, path: &str) -> DashResult<RawEventStream> {
        let response = self
            .client
            .get(self.endpoint(path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let events = response
            .bytes_stream()
            .map_err(DashError::from)
            .scan(SseDecoder::new(), |decoder, chunk| {
                let batch: Vec<DashResult<SseEvent>> = match chunk {
                    Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(futures::stream::iter(batch)))
            })
            .flatten();

        Ok(Box::pin(events))
    }
}

#[async_trait]
impl ClusterBackend for HttpBackend {
    async fn get_cluster_status(&self) -> DashResult<ClusterSnapshot> {
        let response = self
            .client
            .get(self.endpoint("api/cluster/status"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<ClusterSnapshot>().await?)
    }

    async fn open_metrics_stream(&self) -> DashResult<RawEventStream> {
        self.open_sse("api/stream/metrics").await
    }

    async fn open_log_stream(&self) -> DashResult<RawEventStream> {
        self.open_sse("api/stream/logs").await
    }

    async fn trigger_failover(
        &self,
        target: FailoverTarget,
        force: bool,
    ) -> DashResult<FailoverOutcome> {
        let path = format!("api/ha/{}/failover", target.as_str());
        let operation = format!("{} failover", target.display_name());

        let response = self
            .client
            .post(self.endpoint(&path))
            .json(&serde_json::json!({ "force": force }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DashError::Command {
                operation,
                message: format!("backend returned {status}: {body}"),
            });
        }

        let raw: FailoverResponse = response.json().await?;
        let timestamp = raw
            .timestamp
            .as_deref()
            .and_then(isotime::parse)
            .unwrap_or_else(chrono::Utc::now);
        Ok(FailoverOutcome {
            target,
            success: raw.success,
            error: raw.error,
            timestamp,
        })
    }

    async fn list_running_jobs(&self) -> DashResult<Vec<JobDescriptor>> {
        let response = self
            .client
            .get(self.endpoint("api/yarn/applications"))
            .send()
            .await?
            .error_for_status()?;
        let raw: YarnApplications = response.json().await?;
        Ok(raw.apps.map(|wrapper| wrapper.app).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct FailoverResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// The ResourceManager REST shape: `{"apps": {"app": [...]}}`, where
/// `apps` is null when nothing is running.
#[derive(Debug, Deserialize)]
struct YarnApplications {
    #[serde(default)]
    apps: Option<YarnAppList>,
}

#[derive(Debug, Deserialize)]
struct YarnAppList {
    #[serde(default)]
    app: Vec<JobDescriptor>,
}

/// Incremental Server-Sent Events decoder.
///
/// Chunks from the transport can split anywhere, including inside a
/// multi-byte UTF-8 sequence, so the buffer holds raw bytes and only
/// complete lines are converted to text. A blank line dispatches the
/// accumulated event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut complete = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.take_line(line) {
                complete.push(event);
            }
        }
        complete
    }

    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Blank line terminates the event; events without data are
            // keep-alives and are not dispatched.
            let event = self.event.take().unwrap_or_else(|| "message".to_string());
            let data = std::mem::take(&mut self.data);
            if data.is_empty() {
                return None;
            }
            return Some(SseEvent {
                event,
                data: data.join("\n"),
            });
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry are meaningless for this client.
            _ => {}
        }
        None
    }
}
