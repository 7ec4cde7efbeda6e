//! Connection state machine and automatic reconnection.
//!
//! One [`ConnectionManager`] owns one logical connection to the game server.
//! It tracks the state machine below, republishes every transition and every
//! decoded server event on a broadcast channel, and drives the retry policy
//! when the transport drops underneath an established session.
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Reconnecting
//!                     \-> Failed               \-> Disconnected (retries exhausted)
//! ```
//!
//! Retries apply to the connection only. A failed explicit `connect()` lands
//! in `Failed` and stays there until the caller decides; a failed `invoke()`
//! is reported once and never replayed.

use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertSink};
use crate::error::TransportError;
use crate::retry::RetryPolicy;
use crate::transport::{ChannelSignal, HubChannel, ServerEvent, SignalReceiver};

const EVENT_BUFFER: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// An explicit `connect()` failed; nothing is being retried.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_transitioning(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// What subscribers see: every state transition (with the reconnect attempt
/// count at that moment) and every server-pushed event, in arrival order.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    StateChanged { state: ConnectionState, attempt: u32 },
    ServerEvent(ServerEvent),
}

struct Shared {
    channel: Arc<dyn HubChannel>,
    policy: Arc<dyn RetryPolicy>,
    alerts: Arc<dyn AlertSink>,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut guard = self.state.write();
            let changed = *guard != next;
            *guard = next;
            changed
        };
        if changed {
            let attempt = self.attempts.load(Ordering::SeqCst);
            info!(state = %next, attempt, "connection state changed");
            let _ = self.events_tx.send(ConnectionEvent::StateChanged { state: next, attempt });
        }
    }

    fn publish_reconnecting(&self, attempt: u32) {
        self.attempts.store(attempt, Ordering::SeqCst);
        let _ = self.events_tx.send(ConnectionEvent::StateChanged {
            state: ConnectionState::Reconnecting,
            attempt,
        });
        self.alerts.show(
            Alert::warning(format!(
                "Connection to game server lost. Reconnecting (attempt {})...",
                attempt + 1
            ))
            .sticky(),
        );
    }

    fn mark_connected(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
    }

    /// Runs the retry loop after an unexpected drop. Returns the signal
    /// receiver of the fresh session, or `None` once the policy gives up or
    /// the caller disconnected meanwhile.
    async fn reconnect(&self) -> Option<SignalReceiver> {
        let mut attempt = 0u32;
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Reconnecting);
        self.alerts.show(
            Alert::warning("Connection to game server lost. Reconnecting (attempt 1)...")
                .sticky(),
        );

        loop {
            let Some(delay) = self.policy.next_delay(attempt) else {
                warn!(attempt, "reconnect attempts exhausted");
                self.set_state(ConnectionState::Disconnected);
                self.alerts.show(
                    Alert::error("Connection to game server lost and could not be reestablished")
                        .titled("Fatal error")
                        .sticky(),
                );
                return None;
            };
            tokio::time::sleep(delay).await;

            // An explicit disconnect() while we were sleeping wins.
            if self.state() != ConnectionState::Reconnecting {
                return None;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            match self.channel.open(tx).await {
                Ok(()) => {
                    if self.state() != ConnectionState::Reconnecting {
                        // disconnect() raced the open; drop the fresh session.
                        self.channel.close().await;
                        return None;
                    }
                    self.mark_connected();
                    self.alerts.clear();
                    return Some(rx);
                }
                Err(err) => {
                    attempt += 1;
                    warn!(attempt, error = %err, "reconnect attempt failed");
                    self.publish_reconnecting(attempt);
                }
            }
        }
    }
}

/// Pumps one session's signals; rolls into replacement sessions produced by
/// the reconnect loop, and parks on the next explicit connect otherwise.
async fn supervise(shared: Arc<Shared>, mut sessions: mpsc::UnboundedReceiver<SignalReceiver>) {
    while let Some(mut rx) = sessions.recv().await {
        loop {
            match rx.recv().await {
                Some(ChannelSignal::Event(event)) => {
                    let _ = shared.events_tx.send(ConnectionEvent::ServerEvent(event));
                }
                Some(ChannelSignal::Closed) => {
                    if shared.state() != ConnectionState::Disconnected {
                        shared.set_state(ConnectionState::Disconnected);
                        shared.alerts.show(
                            Alert::error("Connection to game server closed")
                                .titled("Fatal error")
                                .sticky(),
                        );
                    }
                    break;
                }
                signal => {
                    // Some(Dropped) or None; a silently closed signal
                    // channel counts as a drop too.
                    let reason = match signal {
                        Some(ChannelSignal::Dropped { reason }) => reason,
                        _ => "signal channel closed".to_string(),
                    };
                    if shared.state() != ConnectionState::Connected {
                        // Explicit disconnect already handled the transition.
                        break;
                    }
                    warn!(reason = %reason, "connection dropped");
                    match shared.reconnect().await {
                        Some(new_rx) => rx = new_rx,
                        None => break,
                    }
                }
            }
        }
    }
}

pub struct ConnectionManager {
    shared: Arc<Shared>,
    connect_gate: Mutex<()>,
    sessions_tx: mpsc::UnboundedSender<SignalReceiver>,
}

impl ConnectionManager {
    /// Builds a manager over `channel`. Must be called from within a Tokio
    /// runtime; the supervisor task starts immediately.
    pub fn new(
        channel: Arc<dyn HubChannel>,
        policy: Arc<dyn RetryPolicy>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Shared {
            channel,
            policy,
            alerts,
            state: RwLock::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            events_tx,
        });
        let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
        tokio::spawn(supervise(shared.clone(), sessions_rx));
        ConnectionManager {
            shared,
            connect_gate: Mutex::new(()),
            sessions_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Subscribes to state transitions and server events, in arrival order.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Establishes the connection. Idempotent: racing callers share one
    /// underlying transport start, and connecting while connected is a no-op.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let _gate = self.connect_gate.lock().await;
        match self.shared.state() {
            ConnectionState::Connected | ConnectionState::Reconnecting => return Ok(()),
            _ => {}
        }

        self.shared.set_state(ConnectionState::Connecting);
        let (tx, rx) = mpsc::unbounded_channel();
        match self.shared.channel.open(tx).await {
            Ok(()) => {
                if self.shared.state() != ConnectionState::Connecting {
                    // disconnect() raced the open; drop the fresh session.
                    self.shared.channel.close().await;
                    return Ok(());
                }
                self.shared.mark_connected();
                let _ = self.sessions_tx.send(rx);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "connection attempt failed");
                self.shared.set_state(ConnectionState::Failed);
                Err(err)
            }
        }
    }

    /// Tears the connection down without triggering any retry.
    pub async fn disconnect(&self) {
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.channel.close().await;
        debug!("disconnected");
    }

    /// Invokes a hub method, connecting first if necessary. The invocation
    /// itself is attempted exactly once; replaying a game action could apply
    /// it twice, so retrying is the caller's decision.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        if !self.state().is_connected() {
            self.connect().await?;
        }
        self.shared.channel.invoke(method, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::retry::StepRetryPolicy;
    use crate::test_support::{wait_until, MockChannel, RecordingAlertSink};
    use std::time::Duration;

    fn manager(
        channel: &Arc<MockChannel>,
        alerts: &Arc<RecordingAlertSink>,
    ) -> ConnectionManager {
        ConnectionManager::new(
            channel.clone(),
            Arc::new(StepRetryPolicy),
            alerts.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_share_one_transport_start() {
        let channel = Arc::new(MockChannel::new().with_open_delay(Duration::from_millis(50)));
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = Arc::new(manager(&channel, &alerts));

        let a = {
            let m = manager.clone();
            tokio::spawn(async move { m.connect().await })
        };
        let b = {
            let m = manager.clone();
            tokio::spawn(async move { m.connect().await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(channel.open_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_lands_in_failed_without_retry() {
        let channel = Arc::new(MockChannel::new().with_failing_opens(1));
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
        assert_eq!(manager.state(), ConnectionState::Failed);

        // No retry machinery kicks in for an explicit connect failure.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(channel.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_triggers_reconnect_and_resets_attempts() {
        let channel = Arc::new(MockChannel::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);

        manager.connect().await.unwrap();
        // Fail a few reconnect attempts before letting one through.
        channel.set_failing_opens(5);
        channel.emit_drop("simulated drop");

        // initial + 5 failures + success
        let opens = channel.clone();
        wait_until(move || opens.open_count() == 7).await;
        wait_until(|| manager.state() == ConnectionState::Connected).await;
        assert_eq!(channel.open_count(), 7);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(alerts.cleared() > 0, "reconnect banner should be cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_go_disconnected_with_fatal_alert() {
        let channel = Arc::new(MockChannel::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);

        manager.connect().await.unwrap();
        channel.set_failing_opens(u32::MAX);
        channel.emit_drop("simulated drop");

        wait_until(|| manager.state() == ConnectionState::Disconnected).await;
        let shown = alerts.shown();
        let last = shown.last().unwrap();
        assert_eq!(last.kind, AlertKind::Error);
        assert!(last.sticky);
        // 30 retry attempts plus the initial connect.
        assert_eq!(channel.open_count(), 31);
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_connects_first_when_disconnected() {
        let channel = Arc::new(MockChannel::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);

        manager.invoke("RefreshState", vec![]).await.unwrap();
        assert_eq!(channel.open_count(), 1);
        assert_eq!(channel.invocations().len(), 1);
        assert_eq!(channel.invocations()[0].0, "RefreshState");
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_disconnect_stops_the_session() {
        let channel = Arc::new(MockChannel::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);

        manager.connect().await.unwrap();
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        // The dangling session signal must not resurrect the connection.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(channel.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_events_reach_subscribers_in_order() {
        let channel = Arc::new(MockChannel::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let manager = manager(&channel, &alerts);
        let mut events = manager.subscribe();

        manager.connect().await.unwrap();
        channel.emit_event("OnStateUpdated", vec![serde_json::json!("{}")]);
        channel.emit_event("OnError", vec![]);

        let mut seen = Vec::new();
        while seen.len() < 4 {
            match events.recv().await.unwrap() {
                ConnectionEvent::StateChanged { state, .. } => seen.push(state.to_string()),
                ConnectionEvent::ServerEvent(event) => seen.push(event.name),
            }
        }
        assert_eq!(seen, vec!["connecting", "connected", "OnStateUpdated", "OnError"]);
    }
}
