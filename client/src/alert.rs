//! User-facing notification seam.
//!
//! The connection and controller layers report through an [`AlertSink`]
//! without knowing how (or whether) anything is rendered. Sticky alerts stay
//! up until explicitly cleared; the rest are expected to auto-dismiss.

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub sticky: bool,
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Alert {
        Alert {
            kind: AlertKind::Info,
            title: String::new(),
            message: message.into(),
            sticky: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Alert {
        Alert {
            kind: AlertKind::Warning,
            title: "Warning".to_string(),
            message: message.into(),
            sticky: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Alert {
        Alert {
            kind: AlertKind::Error,
            title: "Error".to_string(),
            message: message.into(),
            sticky: false,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Alert {
        self.title = title.into();
        self
    }

    /// Marks the alert as persistent until the next `clear()`.
    pub fn sticky(mut self) -> Alert {
        self.sticky = true;
        self
    }
}

pub trait AlertSink: Send + Sync {
    fn show(&self, alert: Alert);
    fn clear(&self);
}

/// Default sink for headless use: alerts land in the log.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn show(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Info => info!(title = %alert.title, "{}", alert.message),
            AlertKind::Warning => warn!(title = %alert.title, "{}", alert.message),
            AlertKind::Error => error!(title = %alert.title, "{}", alert.message),
        }
    }

    fn clear(&self) {
        debug!("alert cleared");
    }
}
