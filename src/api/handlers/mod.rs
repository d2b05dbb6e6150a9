//! Route handlers and the helpers they share.
//!
//! Handlers stay thin: parse the request, call a flow, translate the result.
//! All error translation goes through [`error_response`] so every route leaks
//! exactly the same amount of information for a given failure class.

pub mod account;
pub mod federation;
pub mod health;
pub mod reset;
pub mod session;
pub mod users;

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::directory::Account;
use crate::error::AuthError;

/// Wire shape for an account. Password hashes and token digests never leave
/// the process.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub verified: bool,
    pub roles: Vec<String>,
    pub pending_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            verified: account.verified,
            roles: account.roles.into_iter().collect(),
            pending_email: account.pending_email,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a flow error to its HTTP status and a client-safe body. Internal and
/// external failures are logged here with their source chain; the client only
/// sees the generic message.
pub fn error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::Validation(_) | AuthError::TokenExpired => StatusCode::BAD_REQUEST,
        AuthError::Authentication | AuthError::SessionRevoked => StatusCode::UNAUTHORIZED,
        AuthError::Authorization => StatusCode::FORBIDDEN,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::Conflict => StatusCode::CONFLICT,
        AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AuthError::External(source) => {
            error!("External dependency failed: {source:#}");
            StatusCode::BAD_GATEWAY
        }
        AuthError::Internal(source) => {
            error!("Internal error: {source:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = ErrorResponse {
        error: err.to_string(),
    };
    (status, Json(body)).into_response()
}

/// Pull the token out of an `Authorization: Bearer` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Best-effort client address for rate limit keys: first hop of
/// `x-forwarded-for`, then `x-real-ip`, then a fixed placeholder so a missing
/// header still shares one bucket instead of bypassing the limiter.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "unknown".to_string()
}
