//! User-facing session notices and the sinks that deliver them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which notice is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Expiring,
    Expired,
}

/// Content of a session notification. Presentation is up to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    /// Whole minutes left, rounded up.
    pub remaining_minutes: u64,
    pub remaining_secs: u64,
}

impl SessionNotice {
    /// Notice shown once per idle cycle ahead of expiry.
    pub fn expiring(remaining_ms: i64) -> Self {
        let remaining_secs = u64::try_from(remaining_ms.max(0)).unwrap_or(0).div_ceil(1000);
        let remaining_minutes = remaining_secs.div_ceil(60);
        let unit = if remaining_minutes == 1 { "minute" } else { "minutes" };
        Self {
            kind: NoticeKind::Expiring,
            title: "Session expiring soon".to_string(),
            message: format!(
                "You will be logged out in {} {} due to inactivity.",
                remaining_minutes, unit
            ),
            remaining_minutes,
            remaining_secs,
        }
    }

    /// Notice shown right before the timeout handler runs.
    pub fn expired() -> Self {
        Self {
            kind: NoticeKind::Expired,
            title: "Session expired".to_string(),
            message: "You have been logged out due to inactivity.".to_string(),
            remaining_minutes: 0,
            remaining_secs: 0,
        }
    }

    /// Event name used on the update channel.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            NoticeKind::Expiring => "session_expiring",
            NoticeKind::Expired => "session_expired",
        }
    }
}

/// Host notification mechanism.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &SessionNotice);
}

impl<F> Notifier for F
where
    F: Fn(&SessionNotice) + Send + Sync,
{
    fn notify(&self, notice: &SessionNotice) {
        self(notice)
    }
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &SessionNotice) {
        tracing::info!(
            kind = ?notice.kind,
            remaining_minutes = notice.remaining_minutes,
            "{}: {}",
            notice.title,
            notice.message
        );
    }
}

/// Builds the `{type, data, timestamp}` JSON envelope used on update channels.
pub fn update_message(update_type: &str, data: &impl Serialize) -> Option<String> {
    let message = serde_json::json!({
        "type": update_type,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    serde_json::to_string(&message).ok()
}

/// Publishes notices as JSON on a broadcast channel (e.g. for WebSocket clients).
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<String>,
}

impl BroadcastNotifier {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: &SessionNotice) {
        if let Some(json) = update_message(notice.event_type(), notice) {
            // No subscribers is fine
            let _ = self.tx.send(json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiring_rounds_minutes_up() {
        let notice = SessionNotice::expiring(60_000);
        assert_eq!(notice.remaining_minutes, 1);
        assert_eq!(notice.remaining_secs, 60);
        assert!(notice.message.contains("1 minute "));

        let notice = SessionNotice::expiring(61_000);
        assert_eq!(notice.remaining_minutes, 2);
        assert!(notice.message.contains("2 minutes"));

        let notice = SessionNotice::expiring(-5);
        assert_eq!(notice.remaining_minutes, 0);
    }

    #[test]
    fn test_expired_notice() {
        let notice = SessionNotice::expired();
        assert_eq!(notice.kind, NoticeKind::Expired);
        assert_eq!(notice.event_type(), "session_expired");
        assert_eq!(notice.remaining_secs, 0);
    }

    #[test]
    fn test_broadcast_notifier_sends_envelope() {
        let (tx, mut rx) = broadcast::channel(4);
        let notifier = BroadcastNotifier::new(tx);

        notifier.notify(&SessionNotice::expiring(120_000));

        let raw = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "session_expiring");
        assert_eq!(value["data"]["remaining_minutes"], 2);
        assert_eq!(value["data"]["kind"], "expiring");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_closure_notifier() {
        let seen = std::sync::Mutex::new(Vec::new());
        let notifier = |notice: &SessionNotice| seen.lock().unwrap().push(notice.kind);

        notifier.notify(&SessionNotice::expired());
        assert_eq!(*seen.lock().unwrap(), vec![NoticeKind::Expired]);
    }
}
