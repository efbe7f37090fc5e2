//! Configuration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::is_valid_setting;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub settings: Vec<ConfigSetting>,
}

#[derive(Debug, Serialize)]
pub struct ConfigSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigUpdate {
    pub value: String,
}

/// GET /api/config - Get all configuration settings
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigResponse>, StatusCode> {
    match state.database.get_all_config() {
        Ok(config) => {
            let settings = config
                .into_iter()
                .map(|(key, value, description)| ConfigSetting {
                    key,
                    value,
                    description,
                })
                .collect();

            Ok(Json(ConfigResponse { settings }))
        }
        Err(e) => {
            tracing::error!(?e, "Failed to fetch config");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// PUT /api/config/:key - Update one setting
///
/// A running monitor is re-initialized so the new value takes effect.
/// Values that do not parse for the key's type are rejected.
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(update): Json<ConfigUpdate>,
) -> StatusCode {
    if !is_valid_setting(&key, &update.value) {
        tracing::warn!(key = %key, value = %update.value, "Rejected invalid setting");
        return StatusCode::BAD_REQUEST;
    }

    match state.database.set_config(&key, update.value.trim()) {
        Ok(true) => {
            tracing::info!(key = %key, value = %update.value, "Setting updated");
            if state.monitor.is_running() && state.is_logged_in() {
                state.start_session();
            }
            StatusCode::NO_CONTENT
        }
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!(?e, key = %key, "Failed to update setting");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use tokio::sync::broadcast;

    fn app_state() -> Arc<AppState> {
        let (tx, _) = broadcast::channel(16);
        AppState::new(tx, Arc::new(Database::open_in_memory().unwrap())).unwrap()
    }

    async fn put(state: &Arc<AppState>, key: &str, value: &str) -> StatusCode {
        put_config(
            State(Arc::clone(state)),
            Path(key.to_string()),
            Json(ConfigUpdate {
                value: value.to_string(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn test_put_config_restarts_running_monitor() {
        let state = app_state();
        state.start_session();
        assert_eq!(state.monitor.config().unwrap().timeout_minutes, 30.0);

        assert_eq!(
            put(&state, "session_timeout_minutes", "15").await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            state.database.get_config("session_timeout_minutes").unwrap().as_deref(),
            Some("15")
        );
        assert_eq!(state.monitor.config().unwrap().timeout_minutes, 15.0);
        assert!(state.is_logged_in());
    }

    #[tokio::test]
    async fn test_put_config_while_logged_out_only_persists() {
        let state = app_state();

        assert_eq!(
            put(&state, "session_warning_minutes", "2").await,
            StatusCode::NO_CONTENT
        );
        assert!(!state.monitor.is_running());
        assert_eq!(state.start_session().warning_minutes, 2.0);
    }

    #[tokio::test]
    async fn test_put_config_rejects_unknown_and_invalid() {
        let state = app_state();
        state.start_session();

        assert_eq!(put(&state, "no_such_key", "1").await, StatusCode::NOT_FOUND);
        assert_eq!(
            put(&state, "session_timeout_minutes", "abc").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            state.database.get_config("session_timeout_minutes").unwrap().as_deref(),
            Some("30")
        );
        assert_eq!(state.monitor.config().unwrap().timeout_minutes, 30.0);
    }

    #[tokio::test]
    async fn test_get_config_lists_defaults() {
        let state = app_state();
        let Json(response) = get_config(State(state)).await.unwrap();
        assert!(response
            .settings
            .iter()
            .any(|s| s.key == "session_timeout_minutes" && s.value == "30"));
    }
}
