//! Federated login endpoint.

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

use super::session::{SessionResponse, refresh_cookie};
use super::{ErrorResponse, error_response};
use crate::api::state::AppState;
use crate::error::AuthError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GoogleAuthRequest {
    pub id_token: String,
}

#[utoipa::path(
    post,
    path = "/google-auth",
    request_body = GoogleAuthRequest,
    responses(
        (status = 200, description = "Session opened; account provisioned if new", body = SessionResponse),
        (status = 401, description = "Provider rejected the identity token", body = ErrorResponse),
        (status = 404, description = "Federated login is not configured", body = ErrorResponse),
        (status = 502, description = "Provider unreachable", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn google_auth(
    state: Extension<Arc<AppState>>,
    Json(payload): Json<GoogleAuthRequest>,
) -> impl IntoResponse {
    let Some(federation) = state.federation() else {
        return error_response(&AuthError::NotFound);
    };
    match federation.authenticate(&payload.id_token).await {
        Ok((account, pair)) => {
            let mut response_headers = HeaderMap::new();
            match refresh_cookie(state.config(), &pair.refresh_token) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build refresh cookie: {err}");
                    return error_response(&AuthError::Internal(err.into()));
                }
            }
            let body = SessionResponse {
                access_token: pair.access_token,
                user: account.into(),
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}
