//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::generate::{Generator, SubmitError, SubmitRequest};
use crate::poller::{Poller, PollerHandle};
use crate::settings::{SettingsStore, SharedSettingsStore};
use crate::storage::{FileStorage, SharedStorage};
use crate::task::{SharedTaskStore, TaskStore, VeoTask};
use crate::veo::{VeoApi, VeoClient, DEFAULT_MODEL, MODELS};

use super::settings as settings_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Persisted task collection
    pub tasks: SharedTaskStore,
    /// Persisted connection settings
    pub settings: SharedSettingsStore,
    pub generator: Generator,
    /// Background status poller
    pub poller: PollerHandle,
}

impl AppState {
    /// Wire the stores, remote client and poller together.
    ///
    /// Must be called inside a Tokio runtime; the poller starts immediately.
    pub fn new(config: Config, storage: SharedStorage, api: Arc<dyn VeoApi>) -> Self {
        let tasks = Arc::new(TaskStore::new(Arc::clone(&storage)));
        let settings = Arc::new(SettingsStore::new(storage));
        let generator = Generator::new(Arc::clone(&tasks), Arc::clone(&settings), Arc::clone(&api));
        let poller = Poller::spawn(
            Arc::clone(&tasks),
            Arc::clone(&settings),
            api,
            config.poll_interval,
            config.polling_enabled,
        );

        Self {
            config,
            tasks,
            settings,
            generator,
            poller,
        }
    }
}

/// Build the router over existing state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/models", get(list_models))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/delete-selected", post(delete_selected))
        .route("/api/tasks/:id", delete(delete_task))
        .route("/api/tasks/:id/select", post(toggle_selected))
        .nest("/api/settings", settings_api::routes())
        .nest("/api/polling", settings_api::polling_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let storage: SharedStorage = Arc::new(FileStorage::new(config.data_dir.clone()));
    tracing::info!("Persisting state in {}", config.data_dir.display());

    let api: Arc<dyn VeoApi> = Arc::new(VeoClient::new());
    let state = Arc::new(AppState::new(config.clone(), storage, api));

    if !state.settings.get().await.is_configured() {
        tracing::info!("No API endpoint configured; set one via PUT /api/settings");
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.poller.stop();
        })
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping task poller");
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether an API endpoint is configured
    pub configured: bool,
    pub polling: bool,
    pub tasks: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        configured: state.settings.get().await.is_configured(),
        polling: state.poller.is_enabled(),
        tasks: state.tasks.len().await,
    })
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default: &'static str,
    pub models: &'static [&'static str],
}

async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default: DEFAULT_MODEL,
        models: MODELS,
    })
}

/// List all tasks, newest first.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<VeoTask>> {
    Json(state.tasks.list().await)
}

fn submit_error_status(err: &SubmitError) -> StatusCode {
    match err {
        // The front end routes the user to configuration on this one
        SubmitError::NotConfigured => StatusCode::PRECONDITION_FAILED,
        SubmitError::EmptyRequest | SubmitError::InvalidImage { .. } => StatusCode::BAD_REQUEST,
        SubmitError::Busy => StatusCode::CONFLICT,
        SubmitError::Remote(_) | SubmitError::DuplicateId(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Submit a new generation request.
async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<VeoTask>), (StatusCode, String)> {
    match state.generator.submit(req).await {
        Ok(task) => Ok((StatusCode::CREATED, Json(task))),
        Err(e) => Err((submit_error_status(&e), e.to_string())),
    }
}

/// Delete a single task.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.tasks.delete(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Task {} not found", id)))
    }
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub id: String,
    pub selected: bool,
}

/// Toggle a task's selection flag.
async fn toggle_selected(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SelectResponse>, (StatusCode, String)> {
    match state.tasks.toggle_selected(&id).await {
        Some(selected) => Ok(Json(SelectResponse { id, selected })),
        None => Err((StatusCode::NOT_FOUND, format!("Task {} not found", id))),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteSelectedRequest {
    /// Must be true; the caller has asked the user to confirm.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteSelectedResponse {
    pub deleted: usize,
}

/// Delete every selected task.
async fn delete_selected(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteSelectedRequest>,
) -> Result<Json<DeleteSelectedResponse>, (StatusCode, String)> {
    if !req.confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            "Batch delete requires confirm: true".to_string(),
        ));
    }

    let deleted = state.tasks.delete_selected().await;
    Ok(Json(DeleteSelectedResponse { deleted }))
}
