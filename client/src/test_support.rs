//! Test doubles shared across the crate's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::alert::{Alert, AlertSink};
use crate::error::TransportError;
use crate::transport::{ChannelSignal, HubChannel, ServerEvent, SignalSender};

/// Scriptable in-process [`HubChannel`]: counts opens, records invocations,
/// and lets tests push events and drops through the live sink.
pub struct MockChannel {
    opens: AtomicU32,
    failing_opens: AtomicU32,
    open_delay: Duration,
    sink: Mutex<Option<SignalSender>>,
    invocations: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockChannel {
    pub fn new() -> Self {
        MockChannel {
            opens: AtomicU32::new(0),
            failing_opens: AtomicU32::new(0),
            open_delay: Duration::ZERO,
            sink: Mutex::new(None),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Makes every `open` take this long, to widen race windows.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Fails the next `count` opens. `u32::MAX` fails forever.
    pub fn with_failing_opens(self, count: u32) -> Self {
        self.failing_opens.store(count, Ordering::SeqCst);
        self
    }

    pub fn set_failing_opens(&self, count: u32) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<(String, Vec<Value>)> {
        self.invocations.lock().clone()
    }

    pub fn invocations_named(&self, method: &str) -> Vec<Vec<Value>> {
        self.invocations
            .lock()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn invocation_count(&self, method: &str) -> usize {
        self.invocations_named(method).len()
    }

    pub fn emit_event(&self, name: &str, args: Vec<Value>) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(ChannelSignal::Event(ServerEvent {
                name: name.to_string(),
                args,
            }));
        }
    }

    pub fn emit_drop(&self, reason: &str) {
        if let Some(sink) = self.sink.lock().take() {
            let _ = sink.send(ChannelSignal::Dropped {
                reason: reason.to_string(),
            });
        }
    }

    pub fn emit_closed(&self) {
        if let Some(sink) = self.sink.lock().take() {
            let _ = sink.send(ChannelSignal::Closed);
        }
    }
}

#[async_trait]
impl HubChannel for MockChannel {
    async fn open(&self, sink: SignalSender) -> Result<(), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        let remaining = self.failing_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failing_opens.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(TransportError::ConnectionFailed {
                reason: "mock open failure".to_string(),
            });
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        if self.sink.lock().is_none() {
            return Err(TransportError::NotConnected);
        }
        self.invocations.lock().push((method.to_string(), args));
        Ok(Value::Null)
    }

    async fn close(&self) {
        self.sink.lock().take();
    }
}

/// Captures alerts instead of logging them.
#[derive(Default)]
pub struct RecordingAlertSink {
    shown: Mutex<Vec<Alert>>,
    cleared: AtomicU32,
}

impl RecordingAlertSink {
    pub fn shown(&self) -> Vec<Alert> {
        self.shown.lock().clone()
    }

    pub fn cleared(&self) -> u32 {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl AlertSink for RecordingAlertSink {
    fn show(&self, alert: Alert) {
        self.shown.lock().push(alert);
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `cond` until it holds, panicking after a generous virtual-time
/// deadline. Meant for tests running under `start_paused`.
pub async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(300);
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met before deadline");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
