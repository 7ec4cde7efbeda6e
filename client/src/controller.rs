//! Session orchestration.
//!
//! One [`GameController`] per logical session bridges the connection
//! manager, the six projections and outbound intents. It is explicitly
//! constructed and explicitly owned — pass it (or clones of its `Arc`ed
//! internals) to whatever needs it; there is no global instance.

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

use cards56_protocol::{events, methods, ErrorEvent, HubMethod, RegisteredPlayer};

use crate::alert::{Alert, AlertSink, TracingAlertSink};
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::error::{ClientError, TransportError};
use crate::login::{LoginParams, LoginParamsPatch, ParamStore};
use crate::retry::StepRetryPolicy;
use crate::states::{
    Bidding, GameProgress, LocalPlayer, PlayHistory, Seating, TableMeta,
};
use crate::transport::{HubChannel, ServerEvent, WsChannel};

const EVENT_BUFFER: usize = 128;

/// Which projections an applied state update actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectionChanges {
    pub table_meta: bool,
    pub local_player: bool,
    pub game_progress: bool,
    pub seating: bool,
    pub bidding: bool,
    pub play_history: bool,
}

impl ProjectionChanges {
    pub fn any(self) -> bool {
        self.table_meta
            || self.local_player
            || self.game_progress
            || self.seating
            || self.bidding
            || self.play_history
    }
}

/// What the UI layer observes.
#[derive(Debug, Clone)]
pub enum GameEvent {
    Connection { state: ConnectionState, attempt: u32 },
    StateApplied { changes: ProjectionChanges },
    ServerError(ErrorEvent),
    Registered(RegisteredPlayer),
}

struct Projections {
    table_meta: RwLock<Arc<TableMeta>>,
    local_player: RwLock<Arc<LocalPlayer>>,
    game_progress: RwLock<Arc<GameProgress>>,
    seating: RwLock<Arc<Seating>>,
    bidding: RwLock<Arc<Bidding>>,
    play_history: RwLock<Arc<PlayHistory>>,
}

impl Default for Projections {
    fn default() -> Self {
        Projections {
            table_meta: RwLock::new(Arc::new(TableMeta::default())),
            local_player: RwLock::new(Arc::new(LocalPlayer::default())),
            game_progress: RwLock::new(Arc::new(GameProgress::default())),
            seating: RwLock::new(Arc::new(Seating::default())),
            bidding: RwLock::new(Arc::new(Bidding::default())),
            play_history: RwLock::new(Arc::new(PlayHistory::default())),
        }
    }
}

struct Shared {
    manager: ConnectionManager,
    alerts: Arc<dyn AlertSink>,
    store: Arc<dyn ParamStore>,
    login: RwLock<LoginParams>,
    player_id: RwLock<Option<String>>,
    projections: Projections,
    events_tx: broadcast::Sender<GameEvent>,
}

/// Cloning shares the same session; the underlying state is one instance.
#[derive(Clone)]
pub struct GameController {
    shared: Arc<Shared>,
}

impl GameController {
    /// Builds a controller against the hub at `hub_url` with the default
    /// websocket transport, retry policy and log-only alerts.
    pub fn new(hub_url: &str, store: Arc<dyn ParamStore>) -> Result<GameController, ClientError> {
        let url = Url::parse(hub_url)?;
        let channel = Arc::new(WsChannel::new(url));
        Ok(Self::with_channel(channel, store, Arc::new(TracingAlertSink)))
    }

    /// Builds a controller over any transport. Must run inside a Tokio
    /// runtime; the inbound event pump starts immediately.
    pub fn with_channel(
        channel: Arc<dyn HubChannel>,
        store: Arc<dyn ParamStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> GameController {
        let manager =
            ConnectionManager::new(channel, Arc::new(StepRetryPolicy), alerts.clone());
        let inbound = manager.subscribe();
        let login = LoginParams::create(store.as_ref());
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        let shared = Arc::new(Shared {
            manager,
            alerts,
            store,
            login: RwLock::new(login),
            player_id: RwLock::new(None),
            projections: Projections::default(),
            events_tx,
        });

        tokio::spawn(pump(shared.clone(), inbound));
        GameController { shared }
    }

    // ---- connection ----

    /// Connects to the hub. A failed initial connect is surfaced as a fatal
    /// notice and returned; only post-connect drops are retried.
    pub async fn connect(&self) -> Result<(), TransportError> {
        match self.shared.manager.connect().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shared.alerts.show(
                    Alert::error(format!("Could not connect to game server: {err}"))
                        .titled("Fatal error")
                        .sticky(),
                );
                Err(err)
            }
        }
    }

    pub async fn disconnect(&self) {
        self.shared.manager.disconnect().await;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.manager.state()
    }

    /// Subscribes to controller events, in application order.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.shared.events_tx.subscribe()
    }

    // ---- projections ----

    pub fn table_meta(&self) -> Arc<TableMeta> {
        self.shared.projections.table_meta.read().clone()
    }

    pub fn local_player(&self) -> Arc<LocalPlayer> {
        self.shared.projections.local_player.read().clone()
    }

    pub fn game_progress(&self) -> Arc<GameProgress> {
        self.shared.projections.game_progress.read().clone()
    }

    pub fn seating(&self) -> Arc<Seating> {
        self.shared.projections.seating.read().clone()
    }

    pub fn bidding(&self) -> Arc<Bidding> {
        self.shared.projections.bidding.read().clone()
    }

    pub fn play_history(&self) -> Arc<PlayHistory> {
        self.shared.projections.play_history.read().clone()
    }

    // ---- identity ----

    pub fn login_params(&self) -> LoginParams {
        self.shared.login.read().clone()
    }

    pub fn player_id(&self) -> Option<String> {
        self.shared.player_id.read().clone()
    }

    /// Merges a change into the login parameters. A real change is persisted
    /// and invalidates the current seat: the player is unregistered so the
    /// next registration starts clean instead of leaving a ghost seat.
    pub async fn update_login_params(&self, patch: LoginParamsPatch) -> (LoginParams, bool) {
        let (next, changed) = {
            let mut guard = self.shared.login.write();
            let (next, changed) =
                LoginParams::update(&guard, patch, self.shared.store.as_ref());
            if changed {
                *guard = next.clone();
            }
            (next, changed)
        };
        if changed {
            info!("login params changed, unregistering current player");
            if let Err(err) = self.unregister_player().await {
                warn!(error = %err, "unregister after login change failed");
            }
        }
        (next, changed)
    }

    // ---- outbound intents ----

    pub async fn register_player(&self) -> Result<(), TransportError> {
        self.shared.register_player().await
    }

    pub async fn unregister_player(&self) -> Result<(), TransportError> {
        *self.shared.player_id.write() = None;
        self.invoke_unit(methods::UNREGISTER_PLAYER, vec![]).await
    }

    pub async fn place_bid(&self, bid: i64) -> Result<(), TransportError> {
        self.invoke_unit(methods::PLACE_BID, vec![json!(bid)]).await
    }

    pub async fn pass_bid(&self) -> Result<(), TransportError> {
        self.invoke_unit(methods::PASS_BID, vec![]).await
    }

    pub async fn select_trump(&self, card: &str) -> Result<(), TransportError> {
        self.invoke_unit(methods::SELECT_TRUMP, vec![json!(card)]).await
    }

    pub async fn play_card(&self, card: &str, reveal_delay_ms: i64) -> Result<(), TransportError> {
        self.invoke_unit(methods::PLAY_CARD, vec![json!(card), json!(reveal_delay_ms)])
            .await
    }

    pub async fn show_trump(&self, reveal_delay_ms: i64) -> Result<(), TransportError> {
        self.invoke_unit(methods::SHOW_TRUMP, vec![json!(reveal_delay_ms)]).await
    }

    pub async fn start_next_game(&self) -> Result<(), TransportError> {
        self.invoke_unit(methods::START_NEXT_GAME, vec![]).await
    }

    pub async fn refresh_state(&self) -> Result<(), TransportError> {
        self.invoke_unit(methods::REFRESH_STATE, vec![]).await
    }

    pub async fn forfeit_game(&self) -> Result<(), TransportError> {
        self.invoke_unit(methods::FORFEIT_GAME, vec![]).await
    }

    async fn invoke_unit(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError> {
        self.shared.manager.invoke(method, args).await.map(|_| ())
    }
}

impl Shared {
    async fn register_player(&self) -> Result<(), TransportError> {
        let login = self.login.read().clone();
        let player_id = self.player_id.read().clone().unwrap_or_default();
        self.manager
            .invoke(
                methods::REGISTER_PLAYER,
                vec![
                    json!(player_id),
                    json!(login.user_name),
                    json!(login.language),
                    json!(login.watch),
                ],
            )
            .await
            .map(|_| ())
    }

    /// Applies one raw state push to all six projections. A payload that
    /// does not parse is discarded whole — projections are never fed a
    /// half-parsed blob.
    fn process_state(&self, payload: &str) {
        let parsed: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "discarding malformed state update");
                return;
            }
        };
        if !parsed.is_object() {
            warn!("discarding non-object state update");
            return;
        }

        // A fresh authoritative update supersedes any stale notice.
        self.alerts.clear();

        let p = &self.projections;
        let changes = ProjectionChanges {
            table_meta: apply(&p.table_meta, &parsed, TableMeta::update),
            local_player: apply(&p.local_player, &parsed, LocalPlayer::update),
            game_progress: apply(&p.game_progress, &parsed, GameProgress::update),
            seating: apply(&p.seating, &parsed, Seating::update),
            bidding: apply(&p.bidding, &parsed, Bidding::update),
            play_history: apply(&p.play_history, &parsed, PlayHistory::update),
        };
        if changes.any() {
            debug!(?changes, "state update applied");
        }
        let _ = self.events_tx.send(GameEvent::StateApplied { changes });
    }

    fn handle_error(&self, args: &[Value]) {
        let event = ErrorEvent {
            error_code: args.first().and_then(Value::as_i64).unwrap_or(0),
            method: HubMethod::from_i64(args.get(1).and_then(Value::as_i64).unwrap_or(0)),
            message: args
                .get(2)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            data: args.get(3).cloned().unwrap_or(Value::Null),
        };
        error!(
            code = event.error_code,
            method = %event.method,
            data = %event.data,
            "server error: {}",
            event.message
        );
        self.alerts.show(Alert::error(event.message.clone()));
        let _ = self.events_tx.send(GameEvent::ServerError(event));
    }

    async fn handle_registered(&self, args: Vec<Value>) {
        let Some(payload) = args.into_iter().next() else {
            warn!("registration event without payload");
            return;
        };
        let player: RegisteredPlayer = match serde_json::from_value(payload) {
            Ok(player) => player,
            Err(err) => {
                warn!(error = %err, "discarding malformed registration payload");
                return;
            }
        };

        *self.player_id.write() = Some(player.player_id.clone());
        info!(player_id = %player.player_id, "player registered");

        if player.table_name.is_empty() {
            let login = self.login.read().clone();
            let args = vec![json!(login.table_type_num()), json!(login.table_name)];
            if let Err(err) = self.manager.invoke(methods::JOIN_TABLE, args).await {
                warn!(error = %err, "JoinTable failed");
            }
        } else {
            info!(table = %player.table_name, "already seated, skipping join");
        }
        let _ = self.events_tx.send(GameEvent::Registered(player));
    }

    async fn handle_server_event(&self, event: ServerEvent) {
        match event.name.as_str() {
            events::ON_STATE_UPDATED => {
                match event.args.first().and_then(Value::as_str) {
                    Some(payload) => self.process_state(payload),
                    None => warn!("state update event without payload"),
                }
            }
            events::ON_ERROR => self.handle_error(&event.args),
            events::ON_REGISTER_PLAYER_COMPLETED => self.handle_registered(event.args).await,
            other => debug!(event = other, "ignoring unknown server event"),
        }
    }
}

fn apply<T>(
    slot: &RwLock<Arc<T>>,
    raw: &Value,
    update: impl Fn(&Arc<T>, &Value) -> (Arc<T>, bool),
) -> bool {
    let mut guard = slot.write();
    let (next, changed) = update(&guard, raw);
    *guard = next;
    changed
}

/// Processes inbound events strictly in arrival order, each to completion.
async fn pump(shared: Arc<Shared>, mut inbound: broadcast::Receiver<ConnectionEvent>) {
    loop {
        match inbound.recv().await {
            Ok(ConnectionEvent::StateChanged { state, attempt }) => {
                let _ = shared
                    .events_tx
                    .send(GameEvent::Connection { state, attempt });
                if state == ConnectionState::Connected {
                    // The registration handshake runs once per successful
                    // connection, including reconnects.
                    if let Err(err) = shared.register_player().await {
                        warn!(error = %err, "RegisterPlayer failed");
                    }
                }
            }
            Ok(ConnectionEvent::ServerEvent(event)) => {
                shared.handle_server_event(event).await;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "controller event pump lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
