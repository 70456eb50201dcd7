//! State reconciliation: folds incoming snapshot fragments and log batches
//! into the single current-state value and the rolling histories.
//!
//! The reconciler is the sole writer of the [`ClusterSnapshot`] and of the
//! time-series and log buffers (single-writer rule). Consumers subscribe
//! through a `watch` channel for the snapshot and take point-in-time
//! copies of the buffers; they are never handed the live storage.

use tokio::sync::watch;

use crate::history::History;
use crate::types::{ClusterSnapshot, LogRecord, TimeSeriesPoint};

pub struct Reconciler {
    current: ClusterSnapshot,
    snapshot_tx: watch::Sender<ClusterSnapshot>,
    time_series: History<TimeSeriesPoint>,
    logs: History<LogRecord>,
}

impl Reconciler {
    pub fn new(time_series_capacity: usize, log_capacity: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(ClusterSnapshot::default());
        Self {
            current: ClusterSnapshot::default(),
            snapshot_tx,
            time_series: History::new(time_series_capacity),
            logs: History::new(log_capacity),
        }
    }

    /// Fold one incoming payload (stream fragment or fallback poll) into
    /// the current state.
    ///
    /// Present sections fully replace their predecessors; absent sections
    /// keep their last-known value, so a sparse tick never blanks the
    /// display. If the payload carries resource usage, exactly one
    /// time-series point is appended, keyed on the payload's own
    /// timestamp. A point identical to the newest buffered one (same
    /// timestamp, same values) is a duplicate delivery and is not
    /// appended again; a same-timestamp point with different values is
    /// a correction and still lands.
    pub fn apply_snapshot(&mut self, update: ClusterSnapshot) {
        let sample = match (&update.resource_usage, update.timestamp) {
            (Some(usage), Some(timestamp)) => Some(TimeSeriesPoint::from_usage(timestamp, usage)),
            (Some(usage), None) => Some(TimeSeriesPoint::from_usage(chrono::Utc::now(), usage)),
            (None, _) => None,
        };

        self.current.merge_from(update);

        if let Some(point) = sample {
            let duplicate = self.time_series.latest().is_some_and(|last| *last == point);
            if !duplicate {
                self.time_series.append(point);
            }
        }

        self.snapshot_tx.send_replace(self.current.clone());
    }

    /// Append an ordered batch of log records. Batches from the log stream
    /// are append-only; ordering within a batch is preserved.
    pub fn apply_log_batch(&mut self, records: Vec<LogRecord>) {
        for record in records {
            self.logs.append(record);
        }
    }

    /// Subscribe to reconciled state; the receiver observes every change.
    pub fn subscribe(&self) -> watch::Receiver<ClusterSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn current(&self) -> &ClusterSnapshot {
        &self.current
    }

    /// Point-in-time copy of the performance time series, oldest first.
    pub fn time_series(&self) -> Vec<TimeSeriesPoint> {
        self.time_series.snapshot()
    }

    /// Point-in-time copy of the log lines, oldest first.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.snapshot()
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HealthStatus, HealthSummary, LogLevel, ResourceUsage};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn usage_update(ts_secs: u32, allocated: u64, total: u64) -> ClusterSnapshot {
        ClusterSnapshot {
            timestamp: Some(Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, ts_secs).unwrap()),
            resource_usage: Some(ResourceUsage {
                total_memory: total,
                allocated_memory: allocated,
                total_vcores: total,
                allocated_vcores: allocated,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn missing_sections_keep_last_known_value() {
        let mut reconciler = Reconciler::new(50, 100);
        reconciler.apply_snapshot(ClusterSnapshot {
            health: Some(HealthSummary {
                status: HealthStatus::Healthy,
                percentage: 95.0,
            }),
            ..Default::default()
        });
        reconciler.apply_snapshot(usage_update(1, 10, 100));

        let current = reconciler.current();
        assert_eq!(current.health.as_ref().unwrap().percentage, 95.0);
        assert!(current.resource_usage.is_some());
    }

    #[test]
    fn one_point_per_resource_bearing_payload() {
        let mut reconciler = Reconciler::new(50, 100);
        reconciler.apply_snapshot(usage_update(1, 25, 100));
        reconciler.apply_snapshot(ClusterSnapshot::default());
        reconciler.apply_snapshot(usage_update(2, 30, 100));

        let series = reconciler.time_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].memory_usage_pct, 25.0);
        assert_eq!(series[1].memory_usage_pct, 30.0);
    }

    #[test]
    fn duplicate_delivery_appends_once() {
        let mut reconciler = Reconciler::new(50, 100);
        reconciler.apply_snapshot(usage_update(1, 25, 100));
        reconciler.apply_snapshot(usage_update(1, 25, 100));
        assert_eq!(reconciler.time_series().len(), 1);
    }

    #[test]
    fn same_timestamp_with_different_values_is_not_a_duplicate() {
        let mut reconciler = Reconciler::new(50, 100);
        reconciler.apply_snapshot(usage_update(1, 25, 100));
        reconciler.apply_snapshot(usage_update(1, 40, 100));

        let series = reconciler.time_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].memory_usage_pct, 40.0);
    }

    #[test]
    fn zero_total_reports_zero_percent() {
        let mut reconciler = Reconciler::new(50, 100);
        reconciler.apply_snapshot(usage_update(1, 0, 0));

        let series = reconciler.time_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].memory_usage_pct, 0.0);
        assert_eq!(series[0].vcore_usage_pct, 0.0);
        assert!(series[0].memory_usage_pct.is_finite());
    }

    #[test]
    fn series_window_keeps_most_recent_points() {
        let mut reconciler = Reconciler::new(50, 100);
        for i in 0..60 {
            reconciler.apply_snapshot(usage_update(i, u64::from(i), 100));
        }
        let series = reconciler.time_series();
        assert_eq!(series.len(), 50);
        assert_eq!(series[0].memory_usage_pct, 10.0);
        assert_eq!(series[49].memory_usage_pct, 59.0);
    }

    #[test]
    fn subscribers_observe_every_replacement() {
        let mut reconciler = Reconciler::new(50, 100);
        let rx = reconciler.subscribe();
        reconciler.apply_snapshot(ClusterSnapshot {
            health: Some(HealthSummary {
                status: HealthStatus::Degraded,
                percentage: 60.0,
            }),
            ..Default::default()
        });
        assert_eq!(
            rx.borrow().health.as_ref().unwrap().status,
            HealthStatus::Degraded
        );
    }

    #[test]
    fn log_batches_append_in_order_and_evict_fifo() {
        let mut reconciler = Reconciler::new(50, 1000);
        let batch: Vec<LogRecord> = (0..1001)
            .map(|i| LogRecord {
                timestamp: Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap(),
                level: LogLevel::Info,
                message: format!("line {i}"),
            })
            .collect();
        reconciler.apply_log_batch(batch);

        let logs = reconciler.logs();
        assert_eq!(logs.len(), 1000);
        assert_eq!(logs[0].message, "line 1");
        assert_eq!(logs[999].message, "line 1000");
    }
}
