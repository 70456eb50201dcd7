//! Core of the Hadoop HA operator dashboard: data model, bounded rolling
//! histories, the resilient push-stream client, the state reconciler, and
//! the manual failover state machine. Presentation lives in the `hadash`
//! binary crate; everything here is rendering-agnostic.

pub mod backend;
pub mod config;
pub mod error;
pub mod failover;
pub mod history;
pub mod http;
pub mod reconciler;
pub mod stream;
pub mod types;

pub use backend::{ClusterBackend, RawEventStream, SseEvent};
pub use config::DashConfig;
pub use error::{DashError, DashResult};
pub use failover::{FailoverController, FailoverPhase};
pub use history::History;
pub use http::HttpBackend;
pub use reconciler::Reconciler;
pub use stream::{ConnectionState, StreamClient, StreamEvent, StreamKind};
