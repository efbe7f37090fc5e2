//! Activity intake endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::monitor::InputKind;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub kind: InputKind,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    /// The event started a new idle cycle.
    pub accepted: bool,
    pub monitoring: bool,
}

/// POST /api/activity - Report a raw input event, e.g. `{"kind": "key_down"}`.
pub async fn post_activity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivityRequest>,
) -> Json<ActivityResponse> {
    let accepted = state.monitor.record_activity(request.kind);
    Json(ActivityResponse {
        accepted,
        monitoring: state.monitor.is_running(),
    })
}
