//! API endpoints for connection settings and the polling toggle.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};

use crate::settings::{Settings, SettingsError};

use super::routes::AppState;

/// Create the settings API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

/// Create the polling toggle routes.
pub fn polling_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_polling).put(update_polling))
}

/// Response for settings endpoints. The API key itself is never echoed back.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub base_url: String,
    pub has_api_key: bool,
    pub configured: bool,
}

impl From<Settings> for SettingsResponse {
    fn from(settings: Settings) -> Self {
        Self {
            configured: settings.is_configured(),
            has_api_key: !settings.api_key.is_empty(),
            base_url: settings.base_url,
        }
    }
}

/// Request to update the connection settings.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Remote API root. Empty string clears it and stops polling.
    #[serde(default)]
    pub base_url: String,
    /// Bearer token. Omit to keep the current key, send "" to clear it.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollingState {
    pub enabled: bool,
}

/// GET /api/settings
async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(state.settings.get().await.into())
}

/// PUT /api/settings
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let current = state.settings.get().await;
    let new_settings = Settings {
        base_url: req.base_url,
        api_key: req.api_key.unwrap_or(current.api_key),
    };

    state
        .settings
        .update(new_settings)
        .await
        .map_err(|e| match e {
            SettingsError::InvalidBaseUrl(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    Ok(Json(state.settings.get().await.into()))
}

/// GET /api/polling
async fn get_polling(State(state): State<Arc<AppState>>) -> Json<PollingState> {
    Json(PollingState {
        enabled: state.poller.is_enabled(),
    })
}

/// PUT /api/polling
async fn update_polling(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PollingState>,
) -> Json<PollingState> {
    state.poller.set_enabled(req.enabled);
    Json(PollingState {
        enabled: state.poller.is_enabled(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::tests::test_state;

    #[tokio::test]
    async fn test_update_settings_keeps_key_when_omitted() {
        let state = test_state("").await;

        let Json(resp) = update_settings(
            State(Arc::clone(&state)),
            Json(UpdateSettingsRequest {
                base_url: "https://api.example.com/".into(),
                api_key: Some("sk-1".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.base_url, "https://api.example.com");
        assert!(resp.has_api_key);
        assert!(resp.configured);

        let Json(resp) = update_settings(
            State(Arc::clone(&state)),
            Json(UpdateSettingsRequest {
                base_url: "https://other.example.com".into(),
                api_key: None,
            }),
        )
        .await
        .unwrap();
        assert!(resp.has_api_key);
        assert_eq!(state.settings.get().await.api_key, "sk-1");
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_bad_request() {
        let state = test_state("").await;
        let (status, _) = update_settings(
            State(state),
            Json(UpdateSettingsRequest {
                base_url: "not a url".into(),
                api_key: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_polling_toggle() {
        let state = test_state("http://remote.test").await;
        let Json(current) = get_polling(State(Arc::clone(&state))).await;
        assert!(!current.enabled);

        let Json(updated) =
            update_polling(State(Arc::clone(&state)), Json(PollingState { enabled: true })).await;
        assert!(updated.enabled);
        assert!(state.poller.is_enabled());
    }
}
