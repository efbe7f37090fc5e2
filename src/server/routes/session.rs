//! Login state and monitor status endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::monitor::{CoordinatorSnapshot, InputCounts};
use crate::server::state::AppState;

#[derive(Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub monitoring: bool,
    pub context: String,
    pub config: Option<MonitorConfig>,
    pub timers: Option<CoordinatorSnapshot>,
    pub input: Option<InputCounts>,
}

impl SessionStatus {
    pub fn current(state: &AppState) -> Self {
        Self {
            logged_in: state.is_logged_in(),
            monitoring: state.monitor.is_running(),
            context: state.monitor.context_id().to_string(),
            config: state.monitor.config(),
            timers: state.monitor.snapshot(),
            input: state.monitor.input_counts(),
        }
    }
}

/// GET /api/session - Current login and timer state.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(SessionStatus::current(&state))
}

/// POST /api/session/start - Log in and start monitoring.
pub async fn start_session(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    state.start_session();
    Json(SessionStatus::current(&state))
}

/// POST /api/session/stop - Log out and stop monitoring.
pub async fn stop_session(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    state.end_session();
    Json(SessionStatus::current(&state))
}
