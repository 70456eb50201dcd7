//! Application state for the dashboard TUI.
//!
//! Everything runs on one cooperative event loop: decoded stream updates,
//! tick-driven fallback polls, settled failover commands, and key input
//! all pass through [`App::handle_event`], so no two handlers can
//! interleave mid-update. The render layer reads this state and never
//! mutates it.

use std::sync::Arc;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc;

use hadash_core::types::{FailoverOutcome, FailoverTarget, JobDescriptor};
use hadash_core::{
    ClusterBackend, DashConfig, DashResult, FailoverController, HttpBackend, Reconciler,
    StreamClient, StreamEvent, StreamKind,
};

use super::events::{Event, EventHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTab {
    Overview,
    Logs,
    Failover,
    Jobs,
    Help,
}

impl AppTab {
    pub const ALL: [AppTab; 5] = [
        AppTab::Overview,
        AppTab::Logs,
        AppTab::Failover,
        AppTab::Jobs,
        AppTab::Help,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AppTab::Overview => "Overview",
            AppTab::Logs => "Logs",
            AppTab::Failover => "Failover",
            AppTab::Jobs => "Jobs",
            AppTab::Help => "Help",
        }
    }

    pub fn index(&self) -> usize {
        AppTab::ALL.iter().position(|tab| tab == self).unwrap_or(0)
    }
}

/// Yes/no confirmation before a failover is launched.
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    pub target: FailoverTarget,
    pub force: bool,
    pub selected: bool, // true = Yes, false = No
}

pub struct App {
    config: DashConfig,
    backend: Arc<dyn ClusterBackend>,
    pub reconciler: Reconciler,
    pub failover: FailoverController,
    metrics_client: Option<StreamClient>,
    logs_client: Option<StreamClient>,

    pub current_tab: AppTab,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub error_message: Option<String>,

    pub selected_target: FailoverTarget,
    pub confirm_dialog: Option<ConfirmDialog>,

    pub auto_scroll_logs: bool,
    pub log_list_state: ListState,

    pub jobs: Vec<JobDescriptor>,
    pub jobs_table_state: TableState,

    last_poll: Instant,
}

impl App {
    /// Connect to the configured backend and start the push streams.
    pub async fn connect(config: DashConfig) -> DashResult<(Self, EventHandler)> {
        let backend = Arc::new(HttpBackend::new(&config.backend_url)?);
        Self::with_backend(config, backend).await
    }

    pub async fn with_backend(
        config: DashConfig,
        backend: Arc<dyn ClusterBackend>,
    ) -> DashResult<(Self, EventHandler)> {
        let mut reconciler = Reconciler::new(config.time_series_capacity, config.log_capacity);
        let (failover, outcome_rx) =
            FailoverController::new(Arc::clone(&backend), config.failover_history_capacity);

        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let metrics_client = StreamClient::spawn(
            Arc::clone(&backend),
            StreamKind::Metrics,
            stream_tx.clone(),
            config.reconnect_backoff(),
        );
        let logs_client = StreamClient::spawn(
            Arc::clone(&backend),
            StreamKind::Logs,
            stream_tx,
            config.reconnect_backoff(),
        );

        // Startup pull so the first frame has data even before the stream
        // delivers anything.
        let mut error_message = None;
        match backend.get_cluster_status().await {
            Ok(snapshot) => reconciler.apply_snapshot(snapshot),
            Err(e) => error_message = Some(format!("Initial status fetch failed: {e}")),
        }

        let handler = EventHandler::new(config.tick_rate(), stream_rx, outcome_rx);
        let auto_scroll_logs = config.auto_scroll_logs;
        let app = Self {
            config,
            backend,
            reconciler,
            failover,
            metrics_client: Some(metrics_client),
            logs_client: Some(logs_client),
            current_tab: AppTab::Overview,
            should_quit: false,
            status_message: None,
            error_message,
            selected_target: FailoverTarget::Namenode,
            confirm_dialog: None,
            auto_scroll_logs,
            log_list_state: ListState::default(),
            jobs: Vec::new(),
            jobs_table_state: TableState::default(),
            last_poll: Instant::now(),
        };
        Ok((app, handler))
    }

    pub fn config(&self) -> &DashConfig {
        &self.config
    }

    pub fn metrics_connected(&self) -> bool {
        self.metrics_client
            .as_ref()
            .is_some_and(StreamClient::is_connected)
    }

    pub fn logs_connected(&self) -> bool {
        self.logs_client
            .as_ref()
            .is_some_and(StreamClient::is_connected)
    }

    /// Tear down the push streams, cancelling any pending reconnects.
    pub async fn shutdown(&mut self) {
        if let Some(client) = self.metrics_client.take() {
            client.shutdown().await;
        }
        if let Some(client) = self.logs_client.take() {
            client.shutdown().await;
        }
    }

    pub async fn handle_event(&mut self, event: Event) -> DashResult<()> {
        match event {
            Event::Tick => self.handle_tick().await,
            Event::Stream(StreamEvent::Snapshot(snapshot)) => {
                self.reconciler.apply_snapshot(snapshot);
            }
            Event::Stream(StreamEvent::Logs(records)) => {
                let before = self.reconciler.log_count();
                let appended = records.len();
                self.reconciler.apply_log_batch(records);
                if self.auto_scroll_logs {
                    self.scroll_logs_to_tail();
                } else {
                    let evicted = (before + appended).saturating_sub(self.reconciler.log_count());
                    self.shift_log_selection(evicted);
                }
            }
            Event::FailoverSettled(outcome) => self.handle_failover_settled(outcome),
            Event::Key(key) => self.handle_key_event(key).await?,
        }
        Ok(())
    }

    /// While the metrics stream is down, fall back to a periodic one-shot
    /// status pull so the display keeps moving.
    async fn handle_tick(&mut self) {
        if self.metrics_connected() {
            return;
        }
        if self.last_poll.elapsed() < self.config.fallback_poll() {
            return;
        }
        self.last_poll = Instant::now();
        match self.backend.get_cluster_status().await {
            Ok(snapshot) => {
                self.reconciler.apply_snapshot(snapshot);
                self.status_message = Some("Stream down; showing polled status".to_string());
            }
            Err(e) => {
                self.error_message = Some(format!("Status poll failed: {e}"));
            }
        }
    }

    fn handle_failover_settled(&mut self, outcome: FailoverOutcome) {
        let record = self.failover.settle(outcome);
        if record.success {
            self.status_message = Some(format!("{} failover completed", record.target));
            self.error_message = None;
        } else {
            self.error_message = Some(format!(
                "{} failover failed: {}",
                record.target,
                record.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    async fn handle_key_event(&mut self, key: KeyEvent) -> DashResult<()> {
        if self.confirm_dialog.is_some() {
            self.handle_dialog_key(key);
            return Ok(());
        }

        // Global keybindings
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) => {
                self.should_quit = true;
                return Ok(());
            }
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return Ok(());
            }
            (KeyCode::Char('r'), KeyModifiers::NONE) => {
                self.refresh().await;
                return Ok(());
            }
            (KeyCode::Char('?'), _) => {
                self.current_tab = AppTab::Help;
                return Ok(());
            }
            _ => {}
        }

        match key.code {
            KeyCode::Char('1') => self.current_tab = AppTab::Overview,
            KeyCode::Char('2') => self.current_tab = AppTab::Logs,
            KeyCode::Char('3') => self.current_tab = AppTab::Failover,
            KeyCode::Char('4') => {
                self.current_tab = AppTab::Jobs;
                self.refresh_jobs().await;
            }
            KeyCode::Char('5') => self.current_tab = AppTab::Help,
            _ => match self.current_tab {
                AppTab::Logs => self.handle_logs_key(key),
                AppTab::Failover => self.handle_failover_key(key),
                AppTab::Jobs => self.handle_jobs_key(key),
                AppTab::Overview | AppTab::Help => {}
            },
        }
        Ok(())
    }

    async fn refresh(&mut self) {
        match self.backend.get_cluster_status().await {
            Ok(snapshot) => {
                self.reconciler.apply_snapshot(snapshot);
                self.status_message = Some("Status refreshed".to_string());
            }
            Err(e) => {
                self.error_message = Some(format!("Refresh failed: {e}"));
            }
        }
        if self.current_tab == AppTab::Jobs {
            self.refresh_jobs().await;
        }
    }

    async fn refresh_jobs(&mut self) {
        match self.backend.list_running_jobs().await {
            Ok(jobs) => {
                if self.jobs_table_state.selected().is_none() && !jobs.is_empty() {
                    self.jobs_table_state.select(Some(0));
                }
                self.jobs = jobs;
            }
            Err(e) => {
                self.error_message = Some(format!("Failed to list applications: {e}"));
            }
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        let count = self.reconciler.log_count();
        match key.code {
            KeyCode::Char('a') => {
                self.auto_scroll_logs = !self.auto_scroll_logs;
                if self.auto_scroll_logs {
                    self.scroll_logs_to_tail();
                }
            }
            KeyCode::Up => {
                // Manual scrolling takes over from the tail-follow.
                self.auto_scroll_logs = false;
                let selected = self.log_list_state.selected().unwrap_or(count.saturating_sub(1));
                self.log_list_state.select(Some(selected.saturating_sub(1)));
            }
            KeyCode::Down => {
                self.auto_scroll_logs = false;
                if count > 0 {
                    let selected = self.log_list_state.selected().unwrap_or(0);
                    self.log_list_state
                        .select(Some((selected + 1).min(count - 1)));
                }
            }
            KeyCode::End => {
                self.auto_scroll_logs = true;
                self.scroll_logs_to_tail();
            }
            _ => {}
        }
    }

    fn scroll_logs_to_tail(&mut self) {
        let count = self.reconciler.log_count();
        if count > 0 {
            self.log_list_state.select(Some(count - 1));
        }
    }

    /// Evictions shift every surviving record toward the head; move a
    /// manual selection with them so it keeps pointing at the same record.
    /// If the selected record itself was evicted, the selection lands on
    /// the oldest surviving one.
    fn shift_log_selection(&mut self, evicted: usize) {
        if evicted == 0 {
            return;
        }
        if let Some(selected) = self.log_list_state.selected() {
            self.log_list_state
                .select(Some(selected.saturating_sub(evicted)));
        }
    }

    fn handle_failover_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
                self.selected_target = match self.selected_target {
                    FailoverTarget::Namenode => FailoverTarget::Resourcemanager,
                    FailoverTarget::Resourcemanager => FailoverTarget::Namenode,
                };
            }
            KeyCode::Char('f') | KeyCode::Enter => self.open_failover_dialog(false),
            KeyCode::Char('F') => self.open_failover_dialog(true),
            KeyCode::Char('c') => {
                self.failover.clear_history();
                self.status_message = Some("Failover history cleared".to_string());
            }
            _ => {}
        }
    }

    fn open_failover_dialog(&mut self, force: bool) {
        let target = self.selected_target;
        if !self.failover.is_idle(target) {
            self.error_message = Some(format!("{target} failover already in flight"));
            return;
        }
        self.confirm_dialog = Some(ConfirmDialog {
            target,
            force,
            selected: false,
        });
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let Some(dialog) = &mut self.confirm_dialog else {
            return;
        };
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                dialog.selected = !dialog.selected;
            }
            KeyCode::Enter => {
                if let Some(dialog) = self.confirm_dialog.take() {
                    if dialog.selected {
                        self.start_failover(dialog.target, dialog.force);
                    }
                }
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.confirm_dialog = None;
            }
            _ => {}
        }
    }

    fn start_failover(&mut self, target: FailoverTarget, force: bool) {
        match self.failover.trigger(target, force) {
            Ok(()) => {
                let kind = if force { "Force failover" } else { "Failover" };
                self.status_message = Some(format!("{kind} of {target} requested"));
                self.error_message = None;
            }
            Err(e) => {
                self.error_message = Some(e.to_string());
            }
        }
    }

    fn handle_jobs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => {
                if let Some(selected) = self.jobs_table_state.selected() {
                    self.jobs_table_state.select(Some(selected.saturating_sub(1)));
                }
            }
            KeyCode::Down => {
                if let Some(selected) = self.jobs_table_state.selected() {
                    if selected < self.jobs.len().saturating_sub(1) {
                        self.jobs_table_state.select(Some(selected + 1));
                    }
                } else if !self.jobs.is_empty() {
                    self.jobs_table_state.select(Some(0));
                }
            }
            _ => {}
        }
    }
}
