//! Shared application state for the HTTP server.

use crate::config::MonitorConfig;
use crate::database::Database;
use crate::error::MonitorError;
use crate::monitor::SessionMonitor;
use crate::notify::{update_message, BroadcastNotifier};
use crate::sync::SqliteMedium;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

/// Application state shared across all handlers.
///
/// Plays the host role for the monitor: it holds the "logged in" flag the
/// timeout handler clears, and relays notices to WebSocket clients.
pub struct AppState {
    /// Broadcast channel for WebSocket updates.
    pub broadcast_tx: broadcast::Sender<String>,
    pub database: Arc<Database>,
    pub monitor: SessionMonitor,
    logged_in: AtomicBool,
    /// Bumped by every login and logout. Held while the monitor is started
    /// or stopped, so session transitions never interleave.
    session: Mutex<u64>,
}

impl AppState {
    /// Creates app state with a monitor sharing `database` as its medium.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        broadcast_tx: broadcast::Sender<String>,
        database: Arc<Database>,
    ) -> Result<Arc<Self>, MonitorError> {
        let monitor = SessionMonitor::new(
            Arc::new(SqliteMedium::new(Arc::clone(&database))),
            Arc::new(BroadcastNotifier::new(broadcast_tx.clone())),
        )?;

        Ok(Arc::new(Self {
            broadcast_tx,
            database,
            monitor,
            logged_in: AtomicBool::new(false),
            session: Mutex::new(0),
        }))
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Sends an update to all connected WebSocket clients.
    pub fn broadcast(&self, update_type: &str, data: &impl Serialize) {
        if let Some(json) = update_message(update_type, data) {
            let _ = self.broadcast_tx.send(json);
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn session(&self) -> MutexGuard<'_, u64> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs in and (re)starts the monitor with the persisted configuration.
    pub fn start_session(self: &Arc<Self>) -> MonitorConfig {
        let config = MonitorConfig::from_database(&self.database);
        let weak: Weak<Self> = Arc::downgrade(self);

        let mut session = self.session();
        *session += 1;
        let token = *session;

        self.logged_in.store(true, Ordering::SeqCst);
        self.monitor.start(config.clone(), move || {
            if let Some(state) = weak.upgrade() {
                state.expire_session(token);
            }
        });
        config
    }

    /// Logs out explicitly.
    pub fn end_session(&self) {
        let mut session = self.session();
        *session += 1;
        self.monitor.stop();
        if self.logged_in.swap(false, Ordering::SeqCst) {
            self.broadcast("session_logout", &serde_json::json!({ "reason": "user" }));
        }
    }

    /// Timeout handler: clears the session and tells clients to go to login.
    ///
    /// Does nothing if another login or logout happened since `token` was
    /// issued.
    fn expire_session(&self, token: u64) {
        let mut session = self.session();
        if *session != token {
            tracing::debug!(token, current = *session, "Ignoring timeout of a replaced session");
            return;
        }
        *session += 1;

        // Activity arriving after logout must not start a new idle cycle
        self.monitor.stop();
        self.logged_in.store(false, Ordering::SeqCst);
        tracing::info!("Credentials cleared after inactivity timeout");
        self.broadcast(
            "session_logout",
            &serde_json::json!({ "reason": "inactivity" }),
        );
    }
}
