//! `/api/files` routes.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use upstep_core::format_rfc3339;

use crate::admin::OperatorToken;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::server::AppState;

const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Default, Deserialize)]
pub struct PrefetchRequest {
    #[serde(default, alias = "levels")]
    pub keys: Vec<String>,
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.listings.get_listing(&key).await?;

    let body = json!({
        "success": true,
        "key": listing.key,
        "count": listing.items.len(),
        "stale": listing.freshness.is_stale(),
        "cachedAt": format_rfc3339(listing.cached_at),
        "data": listing.items.as_slice(),
    });
    Ok((
        [(
            CACHE_STATUS_HEADER,
            HeaderValue::from_static(listing.freshness.as_str()),
        )],
        Json(body),
    ))
}

pub async fn prefetch(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PrefetchRequest>,
) -> impl IntoResponse {
    let accepted = state.prefetcher.prefetch(&body.keys);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "accepted": accepted })),
    )
}

pub async fn clear_key(
    token: OperatorToken,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let removed = state.listings.clear(&token, &key);
    Json(json!({ "success": true, "key": key, "removed": removed }))
}

pub async fn clear_all(token: OperatorToken, State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.listings.clear_all(&token);
    Json(json!({ "success": true, "removed": removed }))
}

pub async fn cache_stats(_token: OperatorToken, State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "success": true, "data": state.listings.stats() }))
}
