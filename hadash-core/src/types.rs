//! Data model for the dashboard core.
//!
//! These types mirror the JSON the monitoring backend pushes over its
//! metrics stream. Every section of [`ClusterSnapshot`] is optional: a
//! payload only replaces the sections it carries, and the reconciler keeps
//! the last-known value for everything else.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp parsing that tolerates both RFC 3339 and the backend's naive
/// `datetime.isoformat()` strings (no timezone suffix).
pub(crate) mod isotime {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}

/// Overall cluster health as classified by the backend.
///
/// The backend reports `excellent`/`good`/`warning`/`critical`; older
/// payloads use `healthy`/`degraded`. Both spellings map onto this enum and
/// anything unrecognized becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
    #[default]
    Unknown,
}

impl From<String> for HealthStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "healthy" | "excellent" | "good" => HealthStatus::Healthy,
            "degraded" | "warning" => HealthStatus::Degraded,
            "critical" => HealthStatus::Critical,
            _ => HealthStatus::Unknown,
        }
    }
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }
}

/// HA role reported for one member of an active/standby pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum HaRole {
    Active,
    Standby,
    #[default]
    Unknown,
}

impl From<String> for HaRole {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "active" => HaRole::Active,
            "standby" => HaRole::Standby,
            _ => HaRole::Unknown,
        }
    }
}

impl HaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HaRole::Active => "active",
            HaRole::Standby => "standby",
            HaRole::Unknown => "unknown",
        }
    }
}

/// Overall health summary: a status badge plus a 0-100 score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub percentage: f64,
}

/// Health of one active/standby service pair.
///
/// Response times are reported in seconds by the backend; the display
/// contract wants whole milliseconds, hence the accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaGroupStatus {
    pub active_healthy: bool,
    pub standby_healthy: bool,
    pub active_state: HaRole,
    pub standby_state: HaRole,
    pub active_response_time: f64,
    pub standby_response_time: f64,
}

impl HaGroupStatus {
    pub fn active_response_ms(&self) -> u64 {
        (self.active_response_time.max(0.0) * 1000.0).round() as u64
    }

    pub fn standby_response_ms(&self) -> u64 {
        (self.standby_response_time.max(0.0) * 1000.0).round() as u64
    }

    /// A pair is intact when both members are healthy and exactly one is
    /// active while the other stands by.
    pub fn is_intact(&self) -> bool {
        self.active_healthy
            && self.standby_healthy
            && self.active_state == HaRole::Active
            && self.standby_state == HaRole::Standby
    }
}

/// Cluster-wide resource counters from the ResourceManager.
///
/// Ratios are always computed on demand, never stored, so a stale
/// percentage can't outlive the counters it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceUsage {
    pub total_memory: u64,
    pub allocated_memory: u64,
    pub total_vcores: u64,
    pub allocated_vcores: u64,
    pub active_nodes: u64,
    pub running_apps: u64,
}

fn usage_pct(allocated: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((allocated as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

impl ResourceUsage {
    pub fn memory_usage_pct(&self) -> f64 {
        usage_pct(self.allocated_memory, self.total_memory)
    }

    pub fn vcore_usage_pct(&self) -> f64 {
        usage_pct(self.allocated_vcores, self.total_vcores)
    }
}

/// Healthy/total counts for one node class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeClassHealth {
    pub healthy: u64,
    pub total: u64,
}

impl NodeClassHealth {
    /// Clamps `healthy` to `total` so the invariant `healthy <= total`
    /// holds even if the source miscounts.
    pub fn new(healthy: u64, total: u64) -> Self {
        Self {
            healthy: healthy.min(total),
            total,
        }
    }

    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }
}

/// Per-class node health as reported by the backend's flat counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeHealth {
    pub healthy_datanodes: u64,
    pub total_datanodes: u64,
    pub healthy_nodemanagers: u64,
    pub total_nodemanagers: u64,
    pub healthy_journalnodes: u64,
    pub total_journalnodes: u64,
}

impl NodeHealth {
    pub fn datanodes(&self) -> NodeClassHealth {
        NodeClassHealth::new(self.healthy_datanodes, self.total_datanodes)
    }

    pub fn nodemanagers(&self) -> NodeClassHealth {
        NodeClassHealth::new(self.healthy_nodemanagers, self.total_nodemanagers)
    }

    pub fn journalnodes(&self) -> NodeClassHealth {
        NodeClassHealth::new(self.healthy_journalnodes, self.total_journalnodes)
    }
}

/// Named auxiliary service -> healthy flag.
///
/// The backend sends a flat map of `<service>_healthy` booleans mixed with
/// response-time fields; only the health flags are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuxServiceHealth(pub BTreeMap<String, bool>);

impl<'de> Deserialize<'de> for AuxServiceHealth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut services = BTreeMap::new();
        for (key, value) in raw {
            if let (Some(name), Some(healthy)) = (key.strip_suffix("_healthy"), value.as_bool()) {
                services.insert(name.to_string(), healthy);
            }
        }
        Ok(AuxServiceHealth(services))
    }
}

/// The authoritative current-state value for the whole dashboard.
///
/// Incoming payloads (stream fragments and fallback polls) have this same
/// shape; [`ClusterSnapshot::merge_from`] replaces the sections a payload
/// carries and leaves the rest untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    #[serde(deserialize_with = "isotime::deserialize_opt")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(alias = "cluster_health")]
    pub health: Option<HealthSummary>,
    #[serde(alias = "namenode_metrics")]
    pub namenode: Option<HaGroupStatus>,
    #[serde(alias = "resourcemanager_metrics")]
    pub resourcemanager: Option<HaGroupStatus>,
    #[serde(alias = "performance_metrics")]
    pub resource_usage: Option<ResourceUsage>,
    #[serde(alias = "node_metrics")]
    pub node_health: Option<NodeHealth>,
    #[serde(alias = "service_metrics")]
    pub aux_services: Option<AuxServiceHealth>,
}

impl ClusterSnapshot {
    /// Fold `update` into `self`: every section the update carries is a
    /// full replacement, every absent section keeps its last-known value.
    pub fn merge_from(&mut self, update: ClusterSnapshot) {
        let ClusterSnapshot {
            timestamp,
            health,
            namenode,
            resourcemanager,
            resource_usage,
            node_health,
            aux_services,
        } = update;

        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
        if health.is_some() {
            self.health = health;
        }
        if namenode.is_some() {
            self.namenode = namenode;
        }
        if resourcemanager.is_some() {
            self.resourcemanager = resourcemanager;
        }
        if resource_usage.is_some() {
            self.resource_usage = resource_usage;
        }
        if node_health.is_some() {
            self.node_health = node_health;
        }
        if aux_services.is_some() {
            self.aux_services = aux_services;
        }
    }

    pub fn ha_group(&self, target: FailoverTarget) -> Option<&HaGroupStatus> {
        match target {
            FailoverTarget::Namenode => self.namenode.as_ref(),
            FailoverTarget::Resourcemanager => self.resourcemanager.as_ref(),
        }
    }
}

/// One sample of the performance time series, produced per received
/// resource-bearing payload and keyed on the payload's own timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub memory_usage_pct: f64,
    pub vcore_usage_pct: f64,
    pub active_nodes: u64,
    pub running_apps: u64,
}

impl TimeSeriesPoint {
    pub fn from_usage(timestamp: DateTime<Utc>, usage: &ResourceUsage) -> Self {
        Self {
            timestamp,
            label: timestamp.format("%H:%M:%S").to_string(),
            memory_usage_pct: usage.memory_usage_pct(),
            vcore_usage_pct: usage.vcore_usage_pct(),
            active_nodes: usage.active_nodes,
            running_apps: usage.running_apps,
        }
    }
}

/// Severity of a streamed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl From<String> for LogLevel {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warning" | "warn" => LogLevel::Warning,
            _ => LogLevel::Info,
        }
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// One line from the backend's log stream. Append-only once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(deserialize_with = "isotime::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// The two services an operator can fail over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverTarget {
    Namenode,
    Resourcemanager,
}

impl FailoverTarget {
    pub const ALL: [FailoverTarget; 2] =
        [FailoverTarget::Namenode, FailoverTarget::Resourcemanager];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverTarget::Namenode => "namenode",
            FailoverTarget::Resourcemanager => "resourcemanager",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FailoverTarget::Namenode => "NameNode",
            FailoverTarget::Resourcemanager => "ResourceManager",
        }
    }
}

impl fmt::Display for FailoverTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FailoverTarget {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "namenode" | "nn" => Ok(FailoverTarget::Namenode),
            "resourcemanager" | "rm" => Ok(FailoverTarget::Resourcemanager),
            other => Err(format!(
                "unknown failover target '{other}' (expected 'namenode' or 'resourcemanager')"
            )),
        }
    }
}

/// Result of a single failover command call, success or failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverOutcome {
    pub target: FailoverTarget,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FailoverOutcome {
    pub fn succeeded(target: FailoverTarget) -> Self {
        Self {
            target,
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(target: FailoverTarget, error: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Immutable audit entry, created exactly once per settled failover attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverRecord {
    #[serde(rename = "type")]
    pub target: FailoverTarget,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<FailoverOutcome> for FailoverRecord {
    fn from(outcome: FailoverOutcome) -> Self {
        Self {
            target: outcome.target,
            success: outcome.success,
            error_message: outcome.error,
            timestamp: outcome.timestamp,
        }
    }
}

/// One running YARN application, pulled on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    pub id: String,
    pub user: String,
    pub name: String,
    pub queue: String,
    pub state: String,
    #[serde(rename = "finalStatus")]
    pub final_status: String,
    pub progress: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_deserializes_backend_field_names() {
        let payload = serde_json::json!({
            "timestamp": "2026-08-24T10:15:30.123456",
            "cluster_health": { "status": "good", "percentage": 85.0 },
            "namenode_metrics": {
                "active_healthy": true,
                "standby_healthy": true,
                "active_state": "active",
                "standby_state": "standby",
                "active_response_time": 0.042,
                "standby_response_time": 0.055
            },
            "performance_metrics": {
                "total_memory": 16384,
                "allocated_memory": 4096,
                "total_vcores": 16,
                "allocated_vcores": 4,
                "active_nodes": 3,
                "running_apps": 2
            },
            "node_metrics": {
                "healthy_datanodes": 3,
                "total_datanodes": 3,
                "healthy_journalnodes": 2,
                "total_journalnodes": 3
            },
            "service_metrics": {
                "historyserver_healthy": true,
                "hive_healthy": false,
                "hive_response_time": 1.2
            }
        });

        let snapshot: ClusterSnapshot = serde_json::from_value(payload).unwrap();

        let health = snapshot.health.as_ref().unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.percentage, 85.0);

        let nn = snapshot.namenode.as_ref().unwrap();
        assert!(nn.is_intact());
        assert_eq!(nn.active_response_ms(), 42);

        let usage = snapshot.resource_usage.as_ref().unwrap();
        assert_eq!(usage.memory_usage_pct(), 25.0);

        let nodes = snapshot.node_health.as_ref().unwrap();
        assert!(nodes.datanodes().all_healthy());
        assert!(!nodes.journalnodes().all_healthy());

        let services = &snapshot.aux_services.as_ref().unwrap().0;
        assert_eq!(services.get("historyserver"), Some(&true));
        assert_eq!(services.get("hive"), Some(&false));
        assert!(!services.contains_key("hive_response_time"));

        assert!(snapshot.resourcemanager.is_none());
        assert!(snapshot.timestamp.is_some());
    }

    #[test]
    fn usage_pct_guards_zero_total() {
        let usage = ResourceUsage {
            total_memory: 0,
            allocated_memory: 0,
            ..Default::default()
        };
        assert_eq!(usage.memory_usage_pct(), 0.0);
        assert_eq!(usage.vcore_usage_pct(), 0.0);
    }

    #[test]
    fn usage_pct_clamps_overallocation() {
        let usage = ResourceUsage {
            total_memory: 1024,
            allocated_memory: 2048,
            ..Default::default()
        };
        assert_eq!(usage.memory_usage_pct(), 100.0);
    }

    #[test]
    fn merge_keeps_absent_sections() {
        let mut state = ClusterSnapshot::default();
        state.health = Some(HealthSummary {
            status: HealthStatus::Healthy,
            percentage: 90.0,
        });
        state.resource_usage = Some(ResourceUsage {
            total_memory: 8192,
            allocated_memory: 1024,
            ..Default::default()
        });

        let update = ClusterSnapshot {
            health: Some(HealthSummary {
                status: HealthStatus::Degraded,
                percentage: 60.0,
            }),
            ..Default::default()
        };
        state.merge_from(update);

        assert_eq!(state.health.as_ref().unwrap().status, HealthStatus::Degraded);
        // resource_usage was absent from the update and must survive.
        assert_eq!(
            state.resource_usage.as_ref().unwrap().total_memory,
            8192
        );
    }

    #[test]
    fn node_class_health_clamps_miscounts() {
        let class = NodeClassHealth::new(5, 3);
        assert_eq!(class.healthy, 3);
        assert_eq!(class.total, 3);
    }

    #[test]
    fn health_status_maps_backend_spellings() {
        assert_eq!(HealthStatus::from("excellent".to_string()), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from("warning".to_string()), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from("critical".to_string()), HealthStatus::Critical);
        assert_eq!(HealthStatus::from("who-knows".to_string()), HealthStatus::Unknown);
    }

    #[test]
    fn failover_target_parses_short_names() {
        assert_eq!("nn".parse::<FailoverTarget>().unwrap(), FailoverTarget::Namenode);
        assert_eq!(
            "resourcemanager".parse::<FailoverTarget>().unwrap(),
            FailoverTarget::Resourcemanager
        );
        assert!("datanode".parse::<FailoverTarget>().is_err());
    }

    #[test]
    fn log_record_parses_naive_timestamp() {
        let record: LogRecord = serde_json::from_value(serde_json::json!({
            "timestamp": "2026-08-24T10:15:30.000001",
            "level": "warning",
            "message": "standby lag rising"
        }))
        .unwrap();
        assert_eq!(record.level, LogLevel::Warning);
    }
}
