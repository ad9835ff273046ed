use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::CopyError;

/// Ingress for the browser interceptor.
///
/// Responds `{"success":true}` as soon as the token validates and performs
/// the replication on a background task under the action deadline - the
/// browser must observe a fast success or the user's own trading stalls.
pub(super) async fn mirror_ingress(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(token) = headers
        .get("X-Mirror-Token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if state.mirror.validate_token(&token).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let full_path = format!("/api/platform/futures/{}", path);

    info!(path = %full_path, bytes = body.len(), "mirror request received");

    let mirror = state.mirror.clone();
    let deadline = Duration::from_secs(state.config.copy.action_timeout_secs);

    tokio::spawn(async move {
        match tokio::time::timeout(deadline, mirror.process_request(&token, &full_path, &body))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(CopyError::UnknownPath(p))) => {
                warn!(path = %p, "unknown mirror path");
            }
            Ok(Err(e)) => {
                error!(path = %full_path, error = %e, "mirror request failed");
            }
            Err(_) => {
                error!(path = %full_path, "mirror request timed out");
            }
        }
    });

    (StatusCode::OK, Json(json!({"success": true}))).into_response()
}
