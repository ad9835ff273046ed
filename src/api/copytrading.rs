use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::{user_id_from, username_from, ApiError, AppState};
use crate::session::SessionMode;

pub(super) async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "websocket_active": state.push.is_active(user_id).await,
            "mirror_active": state.manager.get(user_id, SessionMode::Mirror).is_ok(),
            "dry_run": state.config.copy.dry_run,
        }
    })))
}

pub(super) async fn start_websocket(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state.push.start(user_id).await?;

    Ok(Json(json!({"success": true})))
}

pub(super) async fn stop_websocket(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state.push.stop(user_id).await?;

    Ok(Json(json!({"success": true})))
}

pub(super) async fn start_mirror(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;
    let username = username_from(&headers, user_id);

    let started = state.mirror.start(user_id, &username).await?;

    Ok(Json(json!({"success": true, "data": started})))
}

pub(super) async fn stop_mirror(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state.mirror.stop(user_id).await?;

    Ok(Json(json!({"success": true})))
}
