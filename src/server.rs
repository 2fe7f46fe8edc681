use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::orchestrate::{self, RequestContext};
use crate::platform::github::GitHubDispatcher;
use crate::platform::Dispatcher;
use crate::queue::EventQueue;
use crate::status::model::{ProcessKind, TeamRef, Zone};
use crate::status::store::{InMemoryStatusStore, StatusStore};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn StatusStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub event_queue: RwLock<EventQueue>,
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let dispatcher = GitHubDispatcher::new(&config.github)?;

        Ok(Self::with_parts(
            config,
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(dispatcher),
        ))
    }

    /// Assemble a state from explicit collaborators; used by tests to swap
    /// in a mock dispatcher.
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn StatusStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            event_queue: RwLock::new(EventQueue::new()),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/webhooks/github",
            post(crate::webhook::handler::handle_webhook),
        )
        .route("/processes", post(start_process))
        .route("/status", get(list_unfinished))
        .route("/status/:repository_name", get(get_status))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessRequest {
    pub kind: ProcessKind,
    pub repository_name: String,
    pub team_id: String,
    pub team_name: String,
    pub github_team: String,
    pub service_template: Option<String>,
}

async fn start_process(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartProcessRequest>,
) -> impl IntoResponse {
    // Microservices deploy into the zone their template dictates; test
    // suites always run from the public zone.
    let zone = match request.kind {
        ProcessKind::Microservice => {
            let template = request.service_template.as_deref().unwrap_or_default();
            match state.config.zone_for_template(template) {
                Some(zone) => zone,
                None => {
                    return (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({
                            "message": format!("Invalid service template: '{template}'"),
                        })),
                    )
                        .into_response();
                }
            }
        }
        _ => Zone::Public,
    };

    let ctx = RequestContext {
        team: TeamRef {
            team_id: request.team_id,
            name: request.team_name,
        },
        github_team: request.github_team,
        service_template: request.service_template,
        zone,
    };

    let result = orchestrate::start_process(
        &state.config,
        state.store.as_ref(),
        state.dispatcher.as_ref(),
        request.kind,
        &request.repository_name,
        ctx,
    )
    .await;

    match result {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({
                "message": "Provisioning has started",
                "repositoryName": record.repository_name,
                "statusUrl": format!("/status/{}", record.repository_name),
            })),
        )
            .into_response(),
        Err(e @ AppError::AlreadyInProgress(_)) => (
            StatusCode::CONFLICT,
            Json(json!({ "message": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start provisioning process");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal error" })),
            )
                .into_response()
        }
    }
}

/// Poll the full record for one process: overall status plus every step.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(repository_name): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&repository_name).await {
        Ok(Some(record)) => (StatusCode::OK, Json(json!(record))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("No process tracked for {repository_name}") })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read status record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal error" })),
            )
                .into_response()
        }
    }
}

/// Processes that have not finished cleanly, for stuck-process reporting.
async fn list_unfinished(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_unfinished().await {
        Ok(repositories) => {
            (StatusCode::OK, Json(json!({ "repositories": repositories }))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list unfinished processes");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal error" })),
            )
                .into_response()
        }
    }
}
