use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{user_id_from, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct PageParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub(super) async fn list_trades(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    let limit = page.limit.clamp(1, 200);
    let trades = state.db.get_trades(user_id, limit, page.offset.max(0)).await?;

    Ok(Json(json!({"success": true, "data": trades})))
}

pub(super) async fn list_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_from(&headers)?;

    let limit = page.limit.clamp(1, 200);
    let logs = state.db.get_logs(user_id, limit, page.offset.max(0)).await?;

    Ok(Json(json!({"success": true, "data": logs})))
}
