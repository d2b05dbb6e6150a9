//! Session endpoints: login, refresh, logout, and the current profile.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::{ErrorResponse, UserResponse, error_response, extract_bearer_token, extract_client_ip};
use crate::api::state::AppState;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Refresh token cookie. Path-scoped so browsers only attach it to the
/// refresh endpoint, never to ordinary API calls.
const REFRESH_COOKIE_NAME: &str = "jid";
const REFRESH_COOKIE_PATH: &str = "/refresh-token";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened; refresh cookie set", body = SessionResponse),
        (status = 400, description = "Unverified account or malformed input", body = ErrorResponse),
        (status = 401, description = "Unknown email or wrong password", body = ErrorResponse),
        (status = 429, description = "Too many attempts from this address", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let client_ip = extract_client_ip(&headers);
    match state
        .credentials()
        .login(&payload.email, &payload.password, &client_ip)
        .await
    {
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

#[utoipa::path(
    post,
    path = "/refresh-token",
    responses(
        (status = 200, description = "Fresh pair issued; cookie rotated", body = AccessTokenResponse),
        (status = 401, description = "Missing, invalid, expired, or revoked refresh token", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn refresh_token(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(token) = extract_refresh_cookie(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    match state.credentials().refresh_session(&token).await {
        Ok((_, pair)) => {
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
            let body = AccessTokenResponse {
                access_token: pair.access_token,
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "All sessions revoked; cookie cleared"),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    let context = match state.policy().authenticate(&token) {
        Ok(context) => context,
        Err(err) => return error_response(&err),
    };
    if let Err(err) = state.credentials().logout_everywhere(context.account_id).await {
        return error_response(&err);
    }

    // Always clear the cookie, even if it was already gone.
    let mut response_headers = HeaderMap::new();
    match clear_refresh_cookie(state.config()) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build clearing cookie: {err}"),
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The authenticated account", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Authentication);
    };
    match state.policy().authenticated_account(&token).await {
        Ok(account) => (StatusCode::OK, Json(UserResponse::from(account))).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Build the `HttpOnly` refresh cookie.
pub(crate) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.refresh_token_ttl_days() * 24 * 60 * 60;
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_refresh_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age=0"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == REFRESH_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}
