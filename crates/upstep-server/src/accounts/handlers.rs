//! `/api/coaches` routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use upstep_core::{AccountStatus, AccountView};

use super::password::verify_password;
use super::validation::{
    BulkStatusRequest, CreateAccountRequest, LoginRequest, StatusChangeRequest,
    UpdateAccountRequest,
};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::server::AppState;

const ACCOUNT_NOT_FOUND: &str = "Coach not found";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub async fn create_account(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_account = body.into_new_account()?;
    let account = state.store.create(new_account).await?;

    tracing::info!(user_id = %account.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": account.view() })),
    ))
}

pub async fn list_accounts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let accounts: Vec<AccountView> = state
        .store
        .list()
        .await?
        .iter()
        .map(|a| a.view())
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": accounts.len(),
        "data": accounts,
    })))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .store
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(ACCOUNT_NOT_FOUND))?;
    Ok(Json(json!({ "success": true, "data": account.view() })))
}

pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = body.into_patch()?;
    let outcome = state.coordinator.apply_account_update(&id, patch).await?;
    Ok(Json(json!({
        "success": true,
        "data": outcome.account,
        "statusChanged": outcome.changed,
        "willLogout": outcome.will_logout,
        "levelChanged": outcome.level_changed,
    })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.coordinator.apply_account_deletion(&id).await?;
    Ok(Json(json!({
        "success": true,
        "data": {},
        "loggedOut": outcome.logged_out,
    })))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = body
        .status
        .ok_or_else(|| ApiError::validation("status is required"))?;
    let outcome = state.coordinator.apply_status_change(&id, &status).await?;
    Ok(Json(json!({ "success": true, "data": outcome })))
}

pub async fn change_status_bulk(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BulkStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = body
        .status
        .ok_or_else(|| ApiError::validation("status is required"))?;
    let user_ids = body.user_ids.unwrap_or_default();
    let records = state
        .coordinator
        .apply_bulk_status_change(&user_ids, &status)
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": records.len(),
        "data": records,
    })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = body.credentials()?;

    let account = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let matches = verify_password(password, &account.password_hash).map_err(|e| {
        tracing::error!(user_id = %account.id, error = %e, "stored password hash is unreadable");
        ApiError::internal("password verification failed")
    })?;
    if !matches {
        tracing::debug!(user_id = %account.id, "login rejected: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if account.status != AccountStatus::Active {
        return Err(ApiError::forbidden(
            "Your account is not active. Please contact support.",
        ));
    }

    tracing::info!(user_id = %account.id, "coach logged in");
    Ok(Json(json!({ "success": true, "data": account.view() })))
}
