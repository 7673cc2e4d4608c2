//! Heartbeat Keep-Alive
//!
//! Emits periodic ping requests to keep the streaming connection from
//! idling out, and detects dead connections when no acknowledgment arrives
//! within the timeout. A timeout is reported as an event; the connection
//! actor treats it like any other receive failure and reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping frames.
    pub ping_interval: Duration,
    /// How long to wait for an acknowledgment before declaring the
    /// connection dead.
    pub ack_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(30),
        }
    }
}

/// Events emitted by the heartbeat monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Request to put a ping frame on the wire.
    SendPing,
    /// No acknowledgment within the timeout; the connection is dead.
    Timeout,
}

/// Liveness state shared between the monitor and the receive loop.
///
/// Any inbound frame counts as liveness: the receive loop calls
/// [`HeartbeatState::record_ack`] for every frame it sees, not just
/// explicit pongs, so a busy connection never pings into a timeout.
#[derive(Debug)]
pub struct HeartbeatState {
    last_ack: RwLock<Instant>,
    awaiting_ack: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create fresh liveness state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_ack: RwLock::new(Instant::now()),
            awaiting_ack: AtomicBool::new(false),
        }
    }

    /// Record inbound traffic as an acknowledgment.
    pub fn record_ack(&self) {
        *self.last_ack.write() = Instant::now();
        self.awaiting_ack.store(false, Ordering::SeqCst);
    }

    /// Mark that a ping went out and an acknowledgment is expected.
    pub fn mark_ping_sent(&self) {
        self.awaiting_ack.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack.load(Ordering::SeqCst)
    }

    /// Time since the last acknowledgment.
    #[must_use]
    pub fn time_since_ack(&self) -> Duration {
        self.last_ack.read().elapsed()
    }

    /// Reset for a new connection session.
    pub fn reset(&self) {
        *self.last_ack.write() = Instant::now();
        self.awaiting_ack.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn backdate_ack(&self, by: Duration) {
        if let Some(past) = Instant::now().checked_sub(by) {
            *self.last_ack.write() = past;
        }
    }
}

/// Heartbeat monitor task.
///
/// Runs per connection session: spawned after the transport opens,
/// cancelled when the session ends. Emits [`HeartbeatEvent::SendPing`] on
/// every interval tick and [`HeartbeatEvent::Timeout`] (then exits) when an
/// outstanding ping goes unacknowledged past the timeout.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Create a new monitor.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        state: Arc<HeartbeatState>,
        event_tx: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run the monitoring loop until cancelled or a timeout fires.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.ping_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("heartbeat monitor cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if self.tick().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// One interval tick: timeout check, then a ping request.
    ///
    /// Returns `Err(())` when the loop should exit.
    async fn tick(&self) -> Result<(), ()> {
        if self.state.is_awaiting_ack() {
            let elapsed = self.state.time_since_ack();
            if elapsed > self.config.ack_timeout {
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = self.config.ack_timeout.as_millis(),
                    "heartbeat timeout"
                );
                let _ = self.event_tx.send(HeartbeatEvent::Timeout).await;
                return Err(());
            }
        }

        if self.event_tx.send(HeartbeatEvent::SendPing).await.is_err() {
            tracing::debug!("heartbeat channel closed, stopping monitor");
            return Err(());
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.ack_timeout, Duration::from_secs(30));
    }

    #[test]
    fn ack_clears_outstanding_ping() {
        let state = HeartbeatState::new();
        state.mark_ping_sent();
        assert!(state.is_awaiting_ack());

        state.record_ack();
        assert!(!state.is_awaiting_ack());
    }

    #[test]
    fn reset_clears_state() {
        let state = HeartbeatState::new();
        state.mark_ping_sent();

        state.reset();
        assert!(!state.is_awaiting_ack());
        assert!(state.time_since_ack() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn monitor_emits_ping_requests() {
        let config = HeartbeatConfig {
            ping_interval: Duration::from_millis(50),
            ack_timeout: Duration::from_secs(1),
        };
        let state = Arc::new(HeartbeatState::new());
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();

        let monitor = HeartbeatMonitor::new(config, Arc::clone(&state), event_tx, cancel.clone());
        let handle = tokio::spawn(monitor.run());

        let event = tokio::time::timeout(Duration::from_millis(200), event_rx.recv())
            .await
            .expect("should receive event")
            .expect("channel should stay open");
        assert_eq!(event, HeartbeatEvent::SendPing);

        cancel.cancel();
        handle.await.expect("task should complete");
    }

    #[tokio::test]
    async fn monitor_detects_timeout() {
        let config = HeartbeatConfig {
            ping_interval: Duration::from_millis(50),
            ack_timeout: Duration::from_millis(100),
        };
        let state = Arc::new(HeartbeatState::new());
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();

        state.mark_ping_sent();
        state.backdate_ack(Duration::from_millis(200));

        let monitor = HeartbeatMonitor::new(config, Arc::clone(&state), event_tx, cancel.clone());
        let handle = tokio::spawn(monitor.run());

        let mut received_timeout = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), event_rx.recv()).await
        {
            if event == HeartbeatEvent::Timeout {
                received_timeout = true;
                break;
            }
        }
        assert!(received_timeout, "should receive timeout event");

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_millis(100), handle).await;
    }

    #[tokio::test]
    async fn acked_ping_does_not_time_out() {
        let config = HeartbeatConfig {
            ping_interval: Duration::from_millis(20),
            ack_timeout: Duration::from_millis(60),
        };
        let state = Arc::new(HeartbeatState::new());
        let (event_tx, mut event_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let monitor = HeartbeatMonitor::new(config, Arc::clone(&state), event_tx, cancel.clone());
        let handle = tokio::spawn(monitor.run());

        // Ack every ping promptly; no timeout should surface.
        let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await {
                Ok(Some(HeartbeatEvent::SendPing)) => {
                    state.mark_ping_sent();
                    state.record_ack();
                }
                Ok(Some(HeartbeatEvent::Timeout)) => panic!("unexpected timeout"),
                Ok(None) | Err(_) => break,
            }
        }

        cancel.cancel();
        handle.await.expect("task should complete");
    }

    #[tokio::test]
    async fn monitor_stops_on_cancellation() {
        let config = HeartbeatConfig {
            ping_interval: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
        };
        let state = Arc::new(HeartbeatState::new());
        let (event_tx, _event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();

        let monitor = HeartbeatMonitor::new(config, state, event_tx, cancel.clone());
        let handle = tokio::spawn(monitor.run());

        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "monitor should shut down on cancellation");
    }
}
