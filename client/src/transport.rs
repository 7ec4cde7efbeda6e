//! Transport seam and its websocket implementation.
//!
//! [`HubChannel`] is the narrow interface the connection manager drives:
//! open a session, invoke named methods, close. Inbound traffic flows back
//! through the [`SignalSender`] handed to `open`, so the channel itself
//! stays policy-free — reconnect decisions live in the manager.

use async_trait::async_trait;
use cards56_protocol::{ClientFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;

const CONNECT_TIMEOUT_MS: u64 = 10_000;
const INVOKE_TIMEOUT_MS: u64 = 30_000;

/// A server-pushed event with its positional arguments.
#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub name: String,
    pub args: Vec<Value>,
}

/// Everything a live session reports back to its owner.
#[derive(Debug, Clone)]
pub enum ChannelSignal {
    Event(ServerEvent),
    /// The transport failed underneath us.
    Dropped { reason: String },
    /// The server ended the session cleanly.
    Closed,
}

pub type SignalSender = mpsc::UnboundedSender<ChannelSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<ChannelSignal>;

#[async_trait]
pub trait HubChannel: Send + Sync + 'static {
    /// Establishes a session. Signals flow through `sink` until it ends.
    async fn open(&self, sink: SignalSender) -> Result<(), TransportError>;

    /// Invokes a hub method and awaits its completion.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError>;

    /// Tears down the current session, if any.
    async fn close(&self);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// Websocket-backed [`HubChannel`] speaking the JSON frame envelope.
pub struct WsChannel {
    url: Url,
    next_id: AtomicU64,
    session: Mutex<Option<Session>>,
}

#[derive(Clone)]
struct Session {
    out_tx: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
}

impl WsChannel {
    pub fn new(url: Url) -> Self {
        WsChannel {
            url,
            next_id: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn handle_text(text: &str, pending: &PendingMap, sink: &SignalSender) {
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::Completion { id, result, error }) => {
                let Some(reply) = pending.lock().remove(&id) else {
                    debug!(id, "completion for unknown invocation");
                    return;
                };
                let outcome = match error {
                    Some(reason) => Err(TransportError::Rejected { reason }),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let _ = reply.send(outcome);
            }
            Ok(ServerFrame::Event { name, args }) => {
                let _ = sink.send(ChannelSignal::Event(ServerEvent { name, args }));
            }
            Err(err) => {
                debug!(error = %err, "skipping unrecognized frame");
            }
        }
    }

    fn fail_pending(pending: &PendingMap, reason: &str) {
        for (_, reply) in pending.lock().drain() {
            let _ = reply.send(Err(TransportError::ConnectionClosed {
                reason: reason.to_string(),
            }));
        }
    }

    fn run_writer(
        mut ws_sink: futures::stream::SplitSink<WsStream, Message>,
        mut out_rx: mpsc::UnboundedReceiver<Message>,
        sink: SignalSender,
    ) {
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(err) = ws_sink.send(msg).await {
                    warn!(error = %err, "websocket send failed");
                    let _ = sink.send(ChannelSignal::Dropped {
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        });
    }

    fn run_reader(
        mut ws_source: futures::stream::SplitStream<WsStream>,
        out_tx: mpsc::UnboundedSender<Message>,
        pending: PendingMap,
        sink: SignalSender,
    ) {
        tokio::spawn(async move {
            loop {
                match ws_source.next().await {
                    Some(Ok(Message::Text(text))) => Self::handle_text(&text, &pending, &sink),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = out_tx.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Close(_))) => {
                        Self::fail_pending(&pending, "server closed the connection");
                        let _ = sink.send(ChannelSignal::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        Self::fail_pending(&pending, "connection lost");
                        let _ = sink.send(ChannelSignal::Dropped {
                            reason: err.to_string(),
                        });
                        break;
                    }
                    None => {
                        Self::fail_pending(&pending, "connection lost");
                        let _ = sink.send(ChannelSignal::Dropped {
                            reason: "stream ended".to_string(),
                        });
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl HubChannel for WsChannel {
    async fn open(&self, sink: SignalSender) -> Result<(), TransportError> {
        let connect = connect_async(self.url.as_str());
        let (ws, _) = timeout(std::time::Duration::from_millis(CONNECT_TIMEOUT_MS), connect)
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: CONNECT_TIMEOUT_MS,
            })?
            .map_err(|err| TransportError::ConnectionFailed {
                reason: err.to_string(),
            })?;

        let (ws_sink, ws_source) = ws.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        *self.session.lock() = Some(Session {
            out_tx: out_tx.clone(),
            pending: pending.clone(),
        });

        Self::run_writer(ws_sink, out_rx, sink.clone());
        Self::run_reader(ws_source, out_tx, pending, sink);
        Ok(())
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        let session = self
            .session
            .lock()
            .clone()
            .ok_or(TransportError::NotConnected)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        session.pending.lock().insert(id, reply_tx);

        let frame = ClientFrame::Invocation {
            id,
            method: method.to_string(),
            args,
        };
        let text = serde_json::to_string(&frame).map_err(|err| TransportError::WebSocket {
            reason: err.to_string(),
        })?;

        if session.out_tx.send(Message::Text(text)).is_err() {
            session.pending.lock().remove(&id);
            return Err(TransportError::NotConnected);
        }

        match timeout(std::time::Duration::from_millis(INVOKE_TIMEOUT_MS), reply_rx).await {
            Err(_) => {
                session.pending.lock().remove(&id);
                Err(TransportError::Timeout {
                    timeout_ms: INVOKE_TIMEOUT_MS,
                })
            }
            Ok(Err(_)) => Err(TransportError::ConnectionClosed {
                reason: "connection lost before reply".to_string(),
            }),
            Ok(Ok(outcome)) => outcome,
        }
    }

    async fn close(&self) {
        if let Some(session) = self.session.lock().take() {
            let _ = session.out_tx.send(Message::Close(None));
            Self::fail_pending(&session.pending, "client disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invoke_without_session_is_not_connected() {
        let channel = WsChannel::new(Url::parse("ws://localhost:9/hub").unwrap());
        let err = channel.invoke("RefreshState", vec![]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn completion_resolves_matching_invocation() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (sink, _rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        pending.lock().insert(4, reply_tx);

        WsChannel::handle_text(
            r#"{"type":"completion","id":4,"result":{"ok":true}}"#,
            &pending,
            &sink,
        );
        assert_eq!(reply_rx.await.unwrap().unwrap(), json!({"ok": true}));
        assert!(pending.lock().is_empty());
    }

    #[tokio::test]
    async fn completion_error_becomes_rejection() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (sink, _rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        pending.lock().insert(9, reply_tx);

        WsChannel::handle_text(
            r#"{"type":"completion","id":9,"error":"not your turn"}"#,
            &pending,
            &sink,
        );
        let err = reply_rx.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::Rejected { reason } if reason == "not your turn"));
    }

    #[tokio::test]
    async fn events_flow_through_the_sink() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (sink, mut rx) = mpsc::unbounded_channel();

        WsChannel::handle_text(
            r#"{"type":"event","name":"OnStateUpdated","args":["{}"]}"#,
            &pending,
            &sink,
        );
        match rx.recv().await.unwrap() {
            ChannelSignal::Event(event) => {
                assert_eq!(event.name, "OnStateUpdated");
                assert_eq!(event.args, vec![json!("{}")]);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_frames_are_skipped() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (sink, mut rx) = mpsc::unbounded_channel();

        WsChannel::handle_text("not json at all", &pending, &sink);
        WsChannel::handle_text(r#"{"type":"gossip"}"#, &pending, &sink);
        assert!(rx.try_recv().is_err());
    }
}
