use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use hadash_core::types::FailoverOutcome;
use hadash_core::{DashError, DashResult, StreamEvent};

/// Events that drive the dashboard.
///
/// User input, timer ticks, decoded push-stream updates, and settled
/// failover commands all arrive through this one type, so the application
/// processes everything on a single cooperative loop and no two handlers
/// can interleave mid-update.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Tick,
    Stream(StreamEvent),
    FailoverSettled(FailoverOutcome),
}

/// Merges terminal input, tick timing, and the background channels into a
/// single event sequence for the main loop.
pub struct EventHandler {
    stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
    outcome_rx: mpsc::UnboundedReceiver<FailoverOutcome>,
    last_tick: Instant,
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(
        tick_rate: Duration,
        stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
        outcome_rx: mpsc::UnboundedReceiver<FailoverOutcome>,
    ) -> Self {
        Self {
            stream_rx,
            outcome_rx,
            last_tick: Instant::now(),
            tick_rate,
        }
    }

    /// Next event to process. Pending background updates are drained
    /// before input is polled so a busy stream is never starved by the
    /// keyboard; within each channel, arrival order is processing order.
    pub async fn next(&mut self) -> DashResult<Event> {
        if let Ok(event) = self.stream_rx.try_recv() {
            return Ok(Event::Stream(event));
        }
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            return Ok(Event::FailoverSettled(outcome));
        }

        let timeout = self
            .tick_rate
            .checked_sub(self.last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).map_err(|e| DashError::Internal {
            message: format!("failed to poll terminal events: {e}"),
        })? {
            if let CrosstermEvent::Key(key) = event::read().map_err(|e| DashError::Internal {
                message: format!("failed to read terminal event: {e}"),
            })? {
                return Ok(Event::Key(key));
            }
        }

        if self.last_tick.elapsed() >= self.tick_rate {
            self.last_tick = Instant::now();
            return Ok(Event::Tick);
        }

        // Nothing ready; yield briefly so background tasks can run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Event::Tick)
    }
}
