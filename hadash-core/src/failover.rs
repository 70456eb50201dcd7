//! Manual failover workflow: per target, an explicit
//! `Idle -> Triggering -> Idle` state machine.
//!
//! The phase is the single source of truth; UI control enablement is a
//! pure function of it. While a target is `Triggering` a second trigger is
//! rejected, which is the only concurrency guard (the backend command is
//! idempotent and never retried automatically). The command call runs on a
//! spawned task and reports back through an outcome channel; settling the
//! outcome unconditionally returns the target to `Idle` and appends
//! exactly one audit record, whether the call succeeded, was rejected, or
//! failed in transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::ClusterBackend;
use crate::error::{DashError, DashResult};
use crate::history::History;
use crate::types::{FailoverOutcome, FailoverRecord, FailoverTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverPhase {
    #[default]
    Idle,
    Triggering,
}

pub struct FailoverController {
    backend: Arc<dyn ClusterBackend>,
    namenode: FailoverPhase,
    resourcemanager: FailoverPhase,
    history: History<FailoverRecord>,
    outcome_tx: mpsc::UnboundedSender<FailoverOutcome>,
}

impl FailoverController {
    /// Returns the controller and the receiver on which settled command
    /// outcomes arrive. The owner must feed each received outcome back
    /// through [`FailoverController::settle`].
    pub fn new(
        backend: Arc<dyn ClusterBackend>,
        history_capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<FailoverOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                namenode: FailoverPhase::Idle,
                resourcemanager: FailoverPhase::Idle,
                history: History::new(history_capacity),
                outcome_tx,
            },
            outcome_rx,
        )
    }

    pub fn phase(&self, target: FailoverTarget) -> FailoverPhase {
        match target {
            FailoverTarget::Namenode => self.namenode,
            FailoverTarget::Resourcemanager => self.resourcemanager,
        }
    }

    /// Whether the trigger control for `target` should be enabled. Pure
    /// function of the current phase.
    pub fn is_idle(&self, target: FailoverTarget) -> bool {
        self.phase(target) == FailoverPhase::Idle
    }

    fn set_phase(&mut self, target: FailoverTarget, phase: FailoverPhase) {
        match target {
            FailoverTarget::Namenode => self.namenode = phase,
            FailoverTarget::Resourcemanager => self.resourcemanager = phase,
        }
    }

    /// Transition `target` from Idle to Triggering and launch the backend
    /// command. Rejected while a trigger for the same target is already in
    /// flight; the other target is unaffected.
    ///
    /// The spawned call always produces exactly one outcome on the
    /// channel: a transport failure is folded into a failed outcome rather
    /// than surfacing as a missing one.
    pub fn trigger(&mut self, target: FailoverTarget, force: bool) -> DashResult<()> {
        if !self.is_idle(target) {
            return Err(DashError::Command {
                operation: format!("{} failover", target.display_name()),
                message: "a failover for this target is already in flight".to_string(),
            });
        }
        self.set_phase(target, FailoverPhase::Triggering);
        info!(target = target.as_str(), force, "triggering failover");

        let backend = Arc::clone(&self.backend);
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = match backend.trigger_failover(target, force).await {
                Ok(outcome) => outcome,
                Err(e) => FailoverOutcome::failed(target, e.to_string()),
            };
            // Receiver gone means the dashboard is shutting down.
            let _ = outcome_tx.send(outcome);
        });
        Ok(())
    }

    /// Settle a completed command: return the target to Idle and append
    /// the audit record. Runs on every exit path, success or failure.
    pub fn settle(&mut self, outcome: FailoverOutcome) -> FailoverRecord {
        self.set_phase(outcome.target, FailoverPhase::Idle);
        if outcome.success {
            info!(target = outcome.target.as_str(), "failover completed");
        } else {
            warn!(
                target = outcome.target.as_str(),
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "failover failed"
            );
        }
        let record = FailoverRecord::from(outcome);
        self.history.append(record.clone());
        record
    }

    /// Point-in-time copy of the audit trail, oldest first.
    pub fn history(&self) -> Vec<FailoverRecord> {
        self.history.snapshot()
    }

    /// Local-only operation; the backend is unaffected.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawEventStream;
    use crate::types::{ClusterSnapshot, JobDescriptor};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Reply {
        Success,
        Rejected(&'static str),
        TransportFailure,
    }

    struct CommandBackend {
        replies: Mutex<HashMap<FailoverTarget, Reply>>,
    }

    impl CommandBackend {
        fn new(replies: Vec<(FailoverTarget, Reply)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl ClusterBackend for CommandBackend {
        async fn get_cluster_status(&self) -> DashResult<ClusterSnapshot> {
            Ok(ClusterSnapshot::default())
        }

        async fn open_metrics_stream(&self) -> DashResult<RawEventStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn open_log_stream(&self) -> DashResult<RawEventStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn trigger_failover(
            &self,
            target: FailoverTarget,
            _force: bool,
        ) -> DashResult<FailoverOutcome> {
            match self.replies.lock().unwrap().get(&target) {
                Some(Reply::Success) | None => Ok(FailoverOutcome::succeeded(target)),
                Some(Reply::Rejected(reason)) => Ok(FailoverOutcome::failed(target, *reason)),
                Some(Reply::TransportFailure) => Err(DashError::Transport {
                    message: "connection reset".to_string(),
                }),
            }
        }

        async fn list_running_jobs(&self) -> DashResult<Vec<JobDescriptor>> {
            Ok(Vec::new())
        }
    }

    async fn trigger_and_settle(
        controller: &mut FailoverController,
        outcomes: &mut mpsc::UnboundedReceiver<FailoverOutcome>,
        target: FailoverTarget,
        force: bool,
    ) -> FailoverRecord {
        controller.trigger(target, force).unwrap();
        assert_eq!(controller.phase(target), FailoverPhase::Triggering);
        let outcome = outcomes.recv().await.unwrap();
        controller.settle(outcome)
    }

    #[tokio::test]
    async fn success_returns_to_idle_with_one_record() {
        let backend = CommandBackend::new(vec![(FailoverTarget::Namenode, Reply::Success)]);
        let (mut controller, mut outcomes) = FailoverController::new(backend, 20);

        let record =
            trigger_and_settle(&mut controller, &mut outcomes, FailoverTarget::Namenode, false)
                .await;

        assert!(record.success);
        assert!(controller.is_idle(FailoverTarget::Namenode));
        assert_eq!(controller.history().len(), 1);
    }

    #[tokio::test]
    async fn rejection_records_error_and_reenables_controls() {
        let backend = CommandBackend::new(vec![(
            FailoverTarget::Namenode,
            Reply::Rejected("quorum unavailable"),
        )]);
        let (mut controller, mut outcomes) = FailoverController::new(backend, 20);

        let record =
            trigger_and_settle(&mut controller, &mut outcomes, FailoverTarget::Namenode, false)
                .await;

        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("quorum unavailable"));
        assert_eq!(record.target, FailoverTarget::Namenode);
        assert!(controller.is_idle(FailoverTarget::Namenode));

        let newest = controller.history().pop().unwrap();
        assert_eq!(newest, record);
    }

    #[tokio::test]
    async fn transport_failure_settles_like_any_other_outcome() {
        let backend = CommandBackend::new(vec![(
            FailoverTarget::Resourcemanager,
            Reply::TransportFailure,
        )]);
        let (mut controller, mut outcomes) = FailoverController::new(backend, 20);

        let record = trigger_and_settle(
            &mut controller,
            &mut outcomes,
            FailoverTarget::Resourcemanager,
            true,
        )
        .await;

        assert!(!record.success);
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection reset"));
        assert!(controller.is_idle(FailoverTarget::Resourcemanager));
        assert_eq!(controller.history().len(), 1);
    }

    #[tokio::test]
    async fn double_trigger_is_rejected_while_in_flight() {
        let backend = CommandBackend::new(vec![(FailoverTarget::Namenode, Reply::Success)]);
        let (mut controller, mut outcomes) = FailoverController::new(backend, 20);

        controller.trigger(FailoverTarget::Namenode, false).unwrap();
        let second = controller.trigger(FailoverTarget::Namenode, false);
        assert!(matches!(second, Err(DashError::Command { .. })));

        // The other target is independent.
        controller
            .trigger(FailoverTarget::Resourcemanager, false)
            .unwrap();

        // Exactly one outcome per launched command.
        let first = outcomes.recv().await.unwrap();
        controller.settle(first);
        let other = outcomes.recv().await.unwrap();
        controller.settle(other);
        assert_eq!(controller.history().len(), 2);
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test]
    async fn clear_history_is_local_only() {
        let backend = CommandBackend::new(vec![]);
        let (mut controller, mut outcomes) = FailoverController::new(backend, 20);
        trigger_and_settle(&mut controller, &mut outcomes, FailoverTarget::Namenode, false).await;
        assert_eq!(controller.history().len(), 1);
        controller.clear_history();
        assert!(controller.history().is_empty());
        // Controls stay usable after clearing.
        assert!(controller.is_idle(FailoverTarget::Namenode));
    }
}
