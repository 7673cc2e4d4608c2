//! Streaming Connection Actor
//!
//! Owns one WebSocket connection to the price stream: connect/disconnect,
//! the receive loop, heartbeat keep-alive, automatic reconnection with
//! backoff, and pending/confirmed subscription management.
//!
//! # Ownership model
//!
//! All mutable state (connection state, subscription sets, the send queue,
//! retry counters) lives inside the [`FeedConnection::run`] task. External
//! callers hold a cloneable [`FeedHandle`] whose commands are delivered over
//! an unbounded channel and applied on the actor task, so transitions are
//! serialized no matter which task issues them.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect/subscribe──► Connecting ──open──► Connected
//!       ▲                                 ▲                    │
//!       │                                 └──backoff──┐        │ failure
//!       └────────── disconnect ◄──────────── Reconnecting ◄────┘
//! ```
//!
//! A transport failure is a *soft* teardown: confirmed subscriptions are
//! demoted back to pending and re-sent after the next open. An explicit
//! `disconnect` is *hard*: confirmed subscriptions and queued frames are
//! always dropped, pending only when `clear_pending` is set.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedEvent, PriceStream};
use crate::domain::streaming::{ConnectionState, Symbol};
use crate::domain::subscription::SubscriptionSet;
use crate::infrastructure::finnhub::backoff::{BackoffConfig, BackoffPolicy};
use crate::infrastructure::finnhub::codec::{FeedMessage, JsonCodec};
use crate::infrastructure::finnhub::heartbeat::{
    HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor, HeartbeatState,
};
use crate::infrastructure::finnhub::messages::ControlFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the streaming connection.
#[derive(Debug, Clone)]
pub struct FeedConnectionConfig {
    /// WebSocket URL including the token query parameter.
    pub url: String,
    /// Reconnect backoff parameters.
    pub backoff: BackoffConfig,
    /// Heartbeat keep-alive parameters.
    pub heartbeat: HeartbeatConfig,
    /// Settle period after open before subscribe frames go out, to avoid
    /// racing the transport.
    pub subscribe_settle: Duration,
    /// Fixed delay between flush retries while the connection settles.
    pub flush_retry_delay: Duration,
    /// Flush retries before giving up until the next trigger.
    pub max_flush_attempts: u32,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl FeedConnectionConfig {
    /// Create a configuration for `url` with default tuning.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: BackoffConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            subscribe_settle: Duration::from_millis(500),
            flush_retry_delay: Duration::from_millis(250),
            max_flush_attempts: 5,
            event_capacity: 1_024,
        }
    }
}

// =============================================================================
// Commands and Handle
// =============================================================================

/// Commands delivered from handles to the actor task.
#[derive(Debug)]
enum Command {
    Connect,
    Disconnect { clear_pending: bool },
    Subscribe { symbols: Vec<Symbol> },
    Unsubscribe { symbols: Vec<Symbol> },
}

/// Cloneable handle to a running [`FeedConnection`].
///
/// Commands are fire-and-forget; their effects surface on the event stream.
/// Subscribe to events *before* expecting transitions; the broadcast
/// channel only delivers to receivers that exist at send time.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<FeedEvent>,
}

impl PriceStream for FeedHandle {
    fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    fn disconnect(&self, clear_pending: bool) {
        let _ = self.cmd_tx.send(Command::Disconnect { clear_pending });
    }

    fn subscribe(&self, symbols: Vec<Symbol>) {
        let _ = self.cmd_tx.send(Command::Subscribe { symbols });
    }

    fn unsubscribe(&self, symbols: Vec<Symbol>) {
        let _ = self.cmd_tx.send(Command::Unsubscribe { symbols });
    }

    fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }
}

// =============================================================================
// Session outcomes
// =============================================================================

/// Why a connected session (or connect attempt) ended.
enum SessionEnd {
    /// Shutdown token fired; the actor exits.
    Cancelled,
    /// Every handle was dropped; nothing can command the actor again.
    HandlesDropped,
    /// Explicit disconnect; back to idle without reconnecting.
    HardDisconnect,
    /// Transport-level failure; eligible for reconnect.
    Failure(String),
}

/// Why a backoff wait ended.
enum BackoffOutcome {
    Elapsed,
    ConnectNow,
    HardDisconnect,
    Cancelled,
    HandlesDropped,
}

// =============================================================================
// Connection Actor
// =============================================================================

/// The streaming connection actor.
///
/// Construct with [`FeedConnection::new`], spawn [`FeedConnection::run`],
/// and drive it through the returned [`FeedHandle`].
pub struct FeedConnection {
    config: FeedConnectionConfig,
    codec: JsonCodec,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<FeedEvent>,
    cancel: CancellationToken,
    state: ConnectionState,
    subscriptions: SubscriptionSet,
    send_queue: VecDeque<ControlFrame>,
    backoff: BackoffPolicy,
}

impl FeedConnection {
    /// Create the actor and its first handle.
    #[must_use]
    pub fn new(config: FeedConnectionConfig, cancel: CancellationToken) -> (Self, FeedHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let backoff = BackoffPolicy::new(config.backoff.clone());

        let handle = FeedHandle {
            cmd_tx,
            event_tx: event_tx.clone(),
        };

        let connection = Self {
            config,
            codec: JsonCodec::new(),
            cmd_rx,
            event_tx,
            cancel,
            state: ConnectionState::Disconnected,
            subscriptions: SubscriptionSet::new(),
            send_queue: VecDeque::new(),
            backoff,
        };

        (connection, handle)
    }

    /// Run the actor until cancelled or all handles are dropped.
    pub async fn run(mut self) {
        loop {
            if !self.idle().await {
                return;
            }

            // A connect was requested: run connect/reconnect sessions until
            // hard disconnect, exhaustion, or shutdown.
            self.backoff.reset();
            loop {
                self.set_state(ConnectionState::Connecting);
                match self.run_session().await {
                    SessionEnd::Cancelled | SessionEnd::HandlesDropped => return,
                    SessionEnd::HardDisconnect => break,
                    SessionEnd::Failure(reason) => {
                        tracing::warn!(%reason, "stream connection lost");
                        // Wire subscriptions died with the transport; requeue
                        // them so the next session re-subscribes.
                        self.subscriptions.demote_confirmed();
                        self.set_state(ConnectionState::Disconnected);

                        if let Some(delay) = self.backoff.next_delay() {
                            let attempt = self.backoff.attempt_count();
                            tracing::info!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "scheduling reconnect"
                            );
                            self.set_state(ConnectionState::Reconnecting);
                            match self.wait_backoff(delay).await {
                                BackoffOutcome::Elapsed => {}
                                BackoffOutcome::ConnectNow => self.backoff.reset(),
                                BackoffOutcome::HardDisconnect => break,
                                BackoffOutcome::Cancelled | BackoffOutcome::HandlesDropped => {
                                    return;
                                }
                            }
                        } else {
                            let attempts = self.backoff.attempt_count();
                            tracing::error!(
                                attempts,
                                "reconnect attempts exhausted; waiting for manual connect"
                            );
                            self.emit(FeedEvent::ReconnectsExhausted { attempts });
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Idle until a command asks for a connection.
    ///
    /// Returns `false` when the actor should exit.
    async fn idle(&mut self) -> bool {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return false,
                    Some(Command::Connect) => return true,
                    Some(Command::Subscribe { symbols }) => {
                        // Subscribing while idle triggers a connect attempt
                        // whenever anything is waiting to go on the wire.
                        let _ = self.subscriptions.request(symbols);
                        if self.subscriptions.has_pending() {
                            return true;
                        }
                    }
                    Some(Command::Unsubscribe { symbols }) => self.apply_unsubscribe(&symbols),
                    Some(Command::Disconnect { clear_pending }) => {
                        self.apply_disconnect(clear_pending);
                    }
                },
            }
        }
    }

    /// One connect attempt plus, on success, the connected session.
    async fn run_session(&mut self) -> SessionEnd {
        tracing::info!(url = %self.config.url, "connecting to price stream");
        let cancel = self.cancel.clone();

        let url = self.config.url.clone();
        let connect = connect_async(&url);
        tokio::pin!(connect);

        // Commands stay live while the transport opens so a disconnect can
        // cancel an in-flight connect.
        let ws = loop {
            tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                result = &mut connect => match result {
                    Ok((ws, _response)) => break ws,
                    Err(e) => return SessionEnd::Failure(format!("connect failed: {e}")),
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return SessionEnd::HandlesDropped,
                    Some(Command::Connect) => {} // already connecting
                    Some(Command::Subscribe { symbols }) => {
                        let _ = self.subscriptions.request(symbols);
                    }
                    Some(Command::Unsubscribe { symbols }) => self.apply_unsubscribe(&symbols),
                    Some(Command::Disconnect { clear_pending }) => {
                        self.apply_disconnect(clear_pending);
                        return SessionEnd::HardDisconnect;
                    }
                },
            }
        };

        let (mut sink, mut source) = ws.split();
        self.set_state(ConnectionState::Connected);
        self.backoff.reset();

        // Frames queued while disconnected go out first.
        if let Err(reason) = self.flush_send_queue(&mut sink).await {
            return SessionEnd::Failure(reason);
        }

        // Per-session heartbeat monitor.
        let heartbeat_state = Arc::new(HeartbeatState::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel(10);
        let heartbeat_cancel = cancel.child_token();
        tokio::spawn(
            HeartbeatMonitor::new(
                self.config.heartbeat.clone(),
                Arc::clone(&heartbeat_state),
                heartbeat_tx,
                heartbeat_cancel.clone(),
            )
            .run(),
        );

        // Subscription flush: settle first, then flush pending; flushes
        // requested before the settle period retry on a fixed linear delay.
        let ready_at = tokio::time::Instant::now() + self.config.subscribe_settle;
        let flush_timer = tokio::time::sleep_until(ready_at);
        tokio::pin!(flush_timer);
        let mut flush_armed = true;
        let mut flush_attempts: u32 = 0;

        let end = loop {
            tokio::select! {
                () = cancel.cancelled() => break SessionEnd::Cancelled,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => break SessionEnd::HandlesDropped,
                    Some(Command::Connect) => {} // already connected
                    Some(Command::Subscribe { symbols }) => {
                        let _ = self.subscriptions.request(symbols);
                        if let Err(reason) = self
                            .try_flush(
                                &mut sink,
                                ready_at,
                                flush_timer.as_mut(),
                                &mut flush_armed,
                                &mut flush_attempts,
                            )
                            .await
                        {
                            break SessionEnd::Failure(reason);
                        }
                    }
                    Some(Command::Unsubscribe { symbols }) => {
                        if let Err(reason) =
                            self.unsubscribe_connected(&symbols, &mut sink).await
                        {
                            break SessionEnd::Failure(reason);
                        }
                    }
                    Some(Command::Disconnect { clear_pending }) => {
                        let _ = sink.send(Message::Close(None)).await;
                        self.apply_disconnect(clear_pending);
                        break SessionEnd::HardDisconnect;
                    }
                },
                event = heartbeat_rx.recv() => match event {
                    Some(HeartbeatEvent::SendPing) => {
                        heartbeat_state.mark_ping_sent();
                        if let Err(reason) = self.transmit(&mut sink, &ControlFrame::Ping).await {
                            break SessionEnd::Failure(reason);
                        }
                    }
                    Some(HeartbeatEvent::Timeout) => {
                        break SessionEnd::Failure("heartbeat timeout".to_string());
                    }
                    None => {}
                },
                () = &mut flush_timer, if flush_armed => {
                    flush_armed = false;
                    if let Err(reason) = self
                        .try_flush(
                            &mut sink,
                            ready_at,
                            flush_timer.as_mut(),
                            &mut flush_armed,
                            &mut flush_attempts,
                        )
                        .await
                    {
                        break SessionEnd::Failure(reason);
                    }
                },
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        heartbeat_state.record_ack();
                        self.handle_frame(&text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        heartbeat_state.record_ack();
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => self.handle_frame(&text),
                            Err(_) => tracing::warn!("dropping non-utf8 binary frame"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        heartbeat_state.record_ack();
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => heartbeat_state.record_ack(),
                    Some(Ok(Message::Close(_))) => {
                        break SessionEnd::Failure("server closed the connection".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::Failure(format!("websocket error: {e}")),
                    None => break SessionEnd::Failure("websocket stream ended".to_string()),
                },
            }
        };

        heartbeat_cancel.cancel();
        drop(source);
        end
    }

    /// Sleep out a backoff delay while keeping commands live.
    async fn wait_backoff(&mut self, delay: Duration) -> BackoffOutcome {
        let cancel = self.cancel.clone();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return BackoffOutcome::Cancelled,
                () = &mut sleep => return BackoffOutcome::Elapsed,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return BackoffOutcome::HandlesDropped,
                    // Manual connect cancels the scheduled retry and goes now.
                    Some(Command::Connect) => return BackoffOutcome::ConnectNow,
                    Some(Command::Subscribe { symbols }) => {
                        let _ = self.subscriptions.request(symbols);
                    }
                    Some(Command::Unsubscribe { symbols }) => self.apply_unsubscribe(&symbols),
                    Some(Command::Disconnect { clear_pending }) => {
                        self.apply_disconnect(clear_pending);
                        return BackoffOutcome::HardDisconnect;
                    }
                },
            }
        }
    }

    /// Flush pending subscriptions if the session is ready for them.
    ///
    /// Before the settle deadline the flush re-arms itself on a fixed
    /// linear delay, up to the attempt cap, then gives up until the next
    /// subscribe or session.
    async fn try_flush(
        &mut self,
        sink: &mut WsSink,
        ready_at: tokio::time::Instant,
        mut timer: Pin<&mut tokio::time::Sleep>,
        armed: &mut bool,
        attempts: &mut u32,
    ) -> Result<(), String> {
        if !self.subscriptions.has_pending() {
            return Ok(());
        }

        if tokio::time::Instant::now() < ready_at {
            if *attempts >= self.config.max_flush_attempts {
                tracing::warn!(
                    attempts = *attempts,
                    "giving up on subscription flush until the next trigger"
                );
                return Ok(());
            }
            *attempts += 1;
            timer
                .as_mut()
                .reset(tokio::time::Instant::now() + self.config.flush_retry_delay);
            *armed = true;
            return Ok(());
        }

        let symbols = self.subscriptions.take_pending();
        for symbol in &symbols {
            self.transmit(
                sink,
                &ControlFrame::Subscribe {
                    symbol: symbol.clone(),
                },
            )
            .await?;
        }
        *attempts = 0;

        tracing::debug!(count = symbols.len(), "flushed pending subscriptions");
        self.emit(FeedEvent::Subscribed { symbols });
        Ok(())
    }

    /// Handle unsubscribe while connected: update sets, notify upstream.
    async fn unsubscribe_connected(
        &mut self,
        symbols: &[Symbol],
        sink: &mut WsSink,
    ) -> Result<(), String> {
        let tracked: Vec<Symbol> = symbols
            .iter()
            .filter(|s| self.subscriptions.is_tracked(s))
            .cloned()
            .collect();
        let _ = self.subscriptions.remove(symbols);

        for symbol in tracked {
            self.transmit(sink, &ControlFrame::Unsubscribe { symbol })
                .await?;
        }
        Ok(())
    }

    /// Handle unsubscribe while no sink is available: update sets and queue
    /// the directives for the next session.
    fn apply_unsubscribe(&mut self, symbols: &[Symbol]) {
        let tracked: Vec<Symbol> = symbols
            .iter()
            .filter(|s| self.subscriptions.is_tracked(s))
            .cloned()
            .collect();
        let _ = self.subscriptions.remove(symbols);

        for symbol in tracked {
            self.send_queue
                .push_back(ControlFrame::Unsubscribe { symbol });
        }
    }

    /// Hard-disconnect bookkeeping shared by every state.
    fn apply_disconnect(&mut self, clear_pending: bool) {
        self.send_queue.clear();
        if clear_pending {
            self.subscriptions.clear_all();
        } else {
            self.subscriptions.clear_confirmed();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Drain the send queue onto the wire.
    async fn flush_send_queue(&mut self, sink: &mut WsSink) -> Result<(), String> {
        while let Some(frame) = self.send_queue.pop_front() {
            self.transmit(sink, &frame).await?;
        }
        Ok(())
    }

    /// Put one control frame on the wire.
    ///
    /// Errors are logged and returned; the caller ends the session and lets
    /// connection-level retry take over; frames are never retried
    /// individually.
    async fn transmit(&self, sink: &mut WsSink, frame: &ControlFrame) -> Result<(), String> {
        let json = self
            .codec
            .encode(frame)
            .map_err(|e| format!("failed to encode frame: {e}"))?;

        sink.send(Message::Text(json.into())).await.map_err(|e| {
            let reason = format!("failed to send frame: {e}");
            tracing::warn!(%reason, "transmit error");
            reason
        })
    }

    /// Decode one inbound frame and emit the resulting events.
    ///
    /// Decode failures are logged and dropped; the receive loop continues.
    fn handle_frame(&mut self, text: &str) {
        match self.codec.decode(text) {
            Ok(FeedMessage::Trades(ticks)) => {
                for tick in ticks {
                    self.emit(FeedEvent::Price(tick.into_price_update()));
                }
            }
            Ok(FeedMessage::Heartbeat) => {}
            Ok(FeedMessage::SubscribeStatus(status)) => {
                if !status.confirmed.is_empty() {
                    tracing::debug!(symbols = ?status.confirmed, "subscriptions acknowledged");
                }
                for rejection in status.failed {
                    tracing::warn!(
                        symbol = %rejection.symbol,
                        reason = %rejection.reason,
                        "subscription rejected upstream"
                    );
                    let _ = self.subscriptions.reject(&rejection.symbol);
                    self.emit(FeedEvent::SubscriptionRejected {
                        symbol: rejection.symbol,
                        reason: rejection.reason,
                    });
                }
            }
            Ok(FeedMessage::Error(message)) => {
                tracing::warn!(%message, "upstream error message");
                self.emit(FeedEvent::Error(message));
            }
            Ok(FeedMessage::Unrecognized(value)) => {
                tracing::trace!(%value, "ignoring unrecognized frame");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
            }
        }
    }

    /// Transition the connection state and emit the change.
    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = self.state.as_str(), to = state.as_str(), "state change");
            self.state = state;
            self.emit(FeedEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: FeedEvent) {
        let _ = self.event_tx.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================
