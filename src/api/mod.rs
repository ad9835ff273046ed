mod accounts;
mod copytrading;
mod history;
mod mirror;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

use crate::config::Config;
use crate::db::Database;
use crate::error::CopyError;
use crate::modes::{MirrorDriver, PushDriver};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub manager: Arc<SessionManager>,
    pub push: Arc<PushDriver>,
    pub mirror: Arc<MirrorDriver>,
    pub config: Arc<Config>,
}

pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(tracing::Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        // mirror ingress: the browser interceptor re-posts the exchange's
        // own paths here, so the route mirrors the exchange prefix
        .route(
            "/api/platform/futures/*path",
            post(mirror::mirror_ingress),
        )
        // control surface
        .route("/api/copytrading/status", get(copytrading::status))
        .route(
            "/api/copytrading/websocket/start",
            post(copytrading::start_websocket),
        )
        .route(
            "/api/copytrading/websocket/stop",
            post(copytrading::stop_websocket),
        )
        .route(
            "/api/copytrading/mirror/start",
            post(copytrading::start_mirror),
        )
        .route(
            "/api/copytrading/mirror/stop",
            post(copytrading::stop_mirror),
        )
        // history
        .route("/api/trades", get(history::list_trades))
        .route("/api/logs", get(history::list_logs))
        // account management
        .route(
            "/api/accounts",
            get(accounts::list_accounts).post(accounts::add_account),
        )
        .route("/api/accounts/:id", delete(accounts::delete_account))
        .route("/api/accounts/:id/master", post(accounts::set_master))
        .route("/api/accounts/:id/disable", post(accounts::set_disabled))
        .layer(trace_layer)
        // the interceptor posts from the exchange's origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Uniform JSON error response for the control surface.
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

impl From<CopyError> for ApiError {
    fn from(err: CopyError) -> Self {
        let status = match &err {
            CopyError::MasterNotSet | CopyError::Parse(_) | CopyError::UnknownPath(_) => {
                StatusCode::BAD_REQUEST
            }
            CopyError::InvalidToken => StatusCode::UNAUTHORIZED,
            CopyError::SessionInactive | CopyError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            CopyError::ModeConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// The fronting UI authenticates the operator and forwards the user id.
pub(crate) fn user_id_from(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError::bad_request("missing or invalid X-User-Id header"))
}

pub(crate) fn username_from(headers: &HeaderMap, user_id: i64) -> String {
    headers
        .get("X-Username")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| format!("user_{}", user_id))
}
