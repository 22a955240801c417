//! REST surface of the orchestrator.
//!
//! Error responses are always `{"Message": ...}` JSON bodies. Creates
//! answer 201 with the created object, other successful mutations answer
//! 204 No Content, and unknown-name lookups answer 400 Bad Request.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::error::OrchestratorError;
use crate::domain::node::Node;
use crate::domain::registry::Registry;
use crate::domain::service::Service;
use crate::domain::types::ServiceStatus;

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

/// JSON body of every failing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMessage {
    #[serde(rename = "Message")]
    pub message: String,
}

pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(JsonMessage {
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/orchestrator/nodes",
            get(list_nodes).post(create_node).put(update_node),
        )
        .route(
            "/orchestrator/nodes/{name}",
            get(get_node).post(connect_node).delete(delete_node),
        )
        .route(
            "/orchestrator/nodes/{name}/disconnect",
            axum::routing::post(disconnect_node),
        )
        .route(
            "/orchestrator/services",
            get(list_services).post(create_service).put(update_service),
        )
        .route(
            "/orchestrator/services/{name}",
            get(get_service).delete(delete_service),
        )
        .route(
            "/orchestrator/services/{service}/{node}",
            axum::routing::post(start_service).delete(stop_service),
        )
        .route("/orchestrator/statuses", get(list_statuses))
        .route("/orchestrator/statuses/{service}", get(get_status))
        .with_state(state)
}

// ── Nodes ──────────────────────────────────────────────────

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.registry.nodes().await)
}

async fn get_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Node>, ApiError> {
    Ok(Json(state.registry.node(&name).await?))
}

async fn create_node(
    State(state): State<AppState>,
    Json(node): Json<Node>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let created = state.registry.create_node(node).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_node(
    State(state): State<AppState>,
    Json(node): Json<Node>,
) -> Result<StatusCode, ApiError> {
    state.registry.update_node(node).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_node(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn connect_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.connect_node(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn disconnect_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.disconnect_node(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Services ───────────────────────────────────────────────

async fn list_services(State(state): State<AppState>) -> Json<Vec<Service>> {
    Json(state.registry.services().await)
}

async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.registry.service(&name).await?))
}

async fn create_service(
    State(state): State<AppState>,
    Json(service): Json<Service>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let created = state.registry.create_service(service).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_service(
    State(state): State<AppState>,
    Json(service): Json<Service>,
) -> Result<StatusCode, ApiError> {
    state.registry.update_service(service).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_service(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Command dispatch ───────────────────────────────────────

async fn start_service(
    State(state): State<AppState>,
    Path((service, node)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.registry.start_service(&node, &service).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_service(
    State(state): State<AppState>,
    Path((service, node)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.registry.stop_service(&node, &service).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Statuses ───────────────────────────────────────────────

async fn list_statuses(State(state): State<AppState>) -> Json<Vec<ServiceStatus>> {
    Json(state.registry.statuses().await)
}

async fn get_status(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<ServiceStatus>, ApiError> {
    Ok(Json(state.registry.status(&service).await?))
}
