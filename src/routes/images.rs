use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::cloudinary;
use crate::session::SessionUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DeleteImageQuery {
    pub public_id: Option<String>,
}

/// Deletes an uploaded image from the CDN. Failures to destroy report
/// 400 so the caller knows the asset is still live.
pub async fn delete_image(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteImageQuery>,
) -> Response {
    let Some(public_id) = query.public_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "public_id is required" })),
        )
            .into_response();
    };

    let Some(config) = &state.cloudinary else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "image deletion failed",
                "detail": "image service is not configured",
            })),
        )
            .into_response();
    };

    match cloudinary::destroy(&state.http, config, &public_id).await {
        Ok(true) => Json(json!({ "message": "image deleted" })).into_response(),
        Ok(false) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "image was not deleted" })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(%public_id, "image deletion failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "image deletion failed",
                    "detail": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}
