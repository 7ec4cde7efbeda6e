//! Client-side state reconciliation and synchronization for the 56 Cards
//! game.
//!
//! The server owns the rules and pushes an opaque state blob on every
//! change; this crate keeps a resilient connection to it, distills each
//! push into six change-detected projections, and forwards player intents.
//! Rendering, persistence backends and notification display are seams
//! ([`AlertSink`], [`ParamStore`], [`HubChannel`]) so the core runs
//! headless.

pub mod alert;
pub mod connection;
pub mod controller;
pub mod error;
pub mod login;
pub mod retry;
pub mod states;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use alert::{Alert, AlertKind, AlertSink, TracingAlertSink};
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use controller::{GameController, GameEvent, ProjectionChanges};
pub use error::{ClientError, TransportError};
pub use login::{FileParamStore, LoginParams, LoginParamsPatch, MemoryParamStore, ParamStore};
pub use retry::{BackoffRetryPolicy, RetryPolicy, StepRetryPolicy};
pub use transport::{ChannelSignal, HubChannel, ServerEvent, SignalSender, WsChannel};
