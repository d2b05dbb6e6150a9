//! Account lifecycle endpoints: registration, verification, self-service.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::{ErrorResponse, UserResponse, error_response, extract_bearer_token};
use crate::api::state::AppState;
use crate::error::AuthError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangeEmailRequest {
    pub new_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; verification email sent", body = UserResponse),
        (status = 400, description = "Malformed email or weak password", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    tag = "account"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    match state
        .credentials()
        .register(&payload.email, &payload.display_name, &payload.password)
        .await
    {
        Ok(account) => (StatusCode::CREATED, Json(UserResponse::from(account))).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified; pending change committed if any", body = UserResponse),
        (status = 404, description = "Unknown or already-consumed token", body = ErrorResponse),
        (status = 409, description = "Pending address was claimed meanwhile", body = ErrorResponse)
    ),
    tag = "account"
)]
pub async fn verify_email(
    state: Extension<Arc<AppState>>,
    Json(payload): Json<VerifyEmailRequest>,
) -> impl IntoResponse {
    match state.verification().verify(&payload.token).await {
        Ok(account) => (StatusCode::OK, Json(UserResponse::from(account))).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password replaced; all sessions revoked"),
        (status = 400, description = "Weak replacement password", body = ErrorResponse),
        (status = 401, description = "Wrong current password or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    let context = match state.policy().authenticate(&token) {
        Ok(context) => context,
        Err(err) => return error_response(&err),
    };
    match state
        .credentials()
        .change_password(
            context.account_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/change-email",
    request_body = ChangeEmailRequest,
    responses(
        (status = 204, description = "Verification email sent to the new address"),
        (status = 400, description = "Malformed address", body = ErrorResponse),
        (status = 401, description = "Wrong password or invalid token", body = ErrorResponse),
        (status = 409, description = "Address owned by another account", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn change_email(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<ChangeEmailRequest>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    let context = match state.policy().authenticate(&token) {
        Ok(context) => context,
        Err(err) => return error_response(&err),
    };
    match state
        .credentials()
        .change_email(context.account_id, &payload.new_email, &payload.password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/delete-account",
    request_body = DeleteAccountRequest,
    responses(
        (status = 204, description = "Account removed"),
        (status = 401, description = "Wrong password or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn delete_account(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<DeleteAccountRequest>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    let context = match state.policy().authenticate(&token) {
        Ok(context) => context,
        Err(err) => return error_response(&err),
    };
    match state
        .credentials()
        .delete_account(context.account_id, &payload.password)
        .await
    {
        Ok(()) => {
            // The refresh cookie is dead weight once the account is gone.
            let mut response_headers = HeaderMap::new();
            match super::session::clear_refresh_cookie(state.config()) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => error!("Failed to build clearing cookie: {err}"),
            }
            (StatusCode::NO_CONTENT, response_headers).into_response()
        }
        Err(err) => error_response(&err),
    }
}
