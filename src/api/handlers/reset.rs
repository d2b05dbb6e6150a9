//! Password reset endpoints.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ErrorResponse, error_response};
use crate::api::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Accepted whether or not the address exists")
    ),
    tag = "reset"
)]
pub async fn forgot_password(
    state: Extension<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    // Deliberately the same answer for known and unknown addresses.
    state.reset().request_reset(&payload.email).await;
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    post,
    path = "/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced; all sessions revoked"),
        (status = 400, description = "Weak password or expired token", body = ErrorResponse),
        (status = 404, description = "Unknown or consumed token", body = ErrorResponse)
    ),
    tag = "reset"
)]
pub async fn reset_password(
    state: Extension<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    match state
        .reset()
        .reset_password(&payload.token, &payload.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
