use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{user_id_from, ApiError, AppState};
use crate::models::BrowserData;

#[derive(Debug, Deserialize)]
pub(super) struct AddAccountRequest {
    name: String,
    #[serde(default)]
    proxy: String,
    data: BrowserData,
}

#[derive(Debug, Deserialize)]
pub(super) struct DisableRequest {
    disabled: bool,
}

pub(super) async fn list_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    let accounts = state.db.get_accounts(user_id).await?;

    Ok(Json(json!({"success": true, "data": accounts})))
}

pub(super) async fn add_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddAccountRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("account name must not be empty"));
    }
    if req.data.uc_token.is_empty() || req.data.u_id.is_empty() {
        return Err(ApiError::bad_request("browser data is incomplete"));
    }

    let id = state
        .db
        .add_account(user_id, req.name.trim(), &req.data, &req.proxy)
        .await?;

    Ok(Json(json!({"success": true, "data": {"id": id}})))
}

pub(super) async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state.db.delete_account(user_id, account_id).await?;

    Ok(Json(json!({"success": true})))
}

pub(super) async fn set_master(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state.db.set_master_account(user_id, account_id).await?;

    Ok(Json(json!({"success": true})))
}

pub(super) async fn set_disabled(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(account_id): Path<i64>,
    Json(req): Json<DisableRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    state
        .db
        .set_account_disabled(user_id, account_id, req.disabled)
        .await?;

    Ok(Json(json!({"success": true})))
}
