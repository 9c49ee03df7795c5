//! Transient user-facing messages emitted by every mutation outcome.
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub color: Severity,
}

/// Snackbar payload: `{ open, message, variant: "alert", alert: { color }, close }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub open: bool,
    pub message: String,
    pub variant: String,
    pub alert: Alert,
    /// Whether the toast shows a dismiss button.
    pub close: bool,
}

impl Notification {
    fn alert(color: Severity, message: impl Into<String>) -> Self {
        Self {
            open: true,
            message: message.into(),
            variant: "alert".to_string(),
            alert: Alert { color },
            close: false,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::alert(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::alert(Severity::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::alert(Severity::Info, message)
    }

    pub fn severity(&self) -> Severity {
        self.alert.color
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

/// Writes notifications to the log. Used by the CLI, where there is no toast surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity() {
            Severity::Error => error!(message = %notification.message, "notification"),
            Severity::Success | Severity::Info => {
                info!(message = %notification.message, "notification")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_snackbar_shape() {
        let n = Notification::success("Lead created successfully.");
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({
                "open": true,
                "message": "Lead created successfully.",
                "variant": "alert",
                "alert": { "color": "success" },
                "close": false
            })
        );
        assert_eq!(Notification::info("Uploading file...").severity(), Severity::Info);
    }
}
