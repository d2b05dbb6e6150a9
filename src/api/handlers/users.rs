//! Administrative account endpoints. Every route requires the ADMIN role.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ErrorResponse, UserResponse, error_response, extract_bearer_token};
use crate::api::state::AppState;
use crate::directory::{Account, ROLE_ADMIN, ROLE_USER};
use crate::error::AuthError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRolesRequest {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

async fn require_admin(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Account, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::Authentication)?;
    state.policy().require_roles(&token, &[ROLE_ADMIN]).await
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Every account, oldest first", body = [UserResponse]),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers, &state).await {
        return error_response(&err);
    }
    match state.directory().list().await {
        Ok(accounts) => {
            let users: Vec<UserResponse> = accounts.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(users)).into_response()
        }
        Err(err) => error_response(&err.into()),
    }
}

#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "The requested account", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn get_user(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers, &state).await {
        return error_response(&err);
    }
    match state.directory().find_by_id(id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(UserResponse::from(account))).into_response(),
        Ok(None) => error_response(&AuthError::NotFound),
        Err(err) => error_response(&err.into()),
    }
}

#[utoipa::path(
    patch,
    path = "/update-roles",
    request_body = UpdateRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = UserResponse),
        (status = 400, description = "Unknown role name or empty set", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_roles(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateRolesRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers, &state).await {
        return error_response(&err);
    }
    let roles = match validate_roles(&payload.roles) {
        Ok(roles) => roles,
        Err(err) => return error_response(&err),
    };
    let result = state
        .directory()
        .update(payload.user_id, &|account| {
            account.roles = roles.clone();
            Ok(())
        })
        .await;
    match result {
        Ok(account) => (StatusCode::OK, Json(UserResponse::from(account))).into_response(),
        Err(err) => error_response(&err.into()),
    }
}

/// Role grants are limited to the known set and must keep at least one role.
fn validate_roles(roles: &[String]) -> Result<BTreeSet<String>, AuthError> {
    if roles.is_empty() {
        return Err(AuthError::validation("Roles must not be empty"));
    }
    let mut validated = BTreeSet::new();
    for role in roles {
        if role != ROLE_USER && role != ROLE_ADMIN {
            return Err(AuthError::validation(format!("Unknown role: {role}")));
        }
        validated.insert(role.clone());
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_validation_accepts_the_known_set() {
        let roles = validate_roles(&["USER".to_string(), "ADMIN".to_string()]).expect("roles");
        assert_eq!(roles.len(), 2);

        // Duplicates collapse.
        let roles = validate_roles(&["USER".to_string(), "USER".to_string()]).expect("roles");
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn role_validation_rejects_unknown_and_empty() {
        assert!(matches!(
            validate_roles(&["ROOT".to_string()]),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(validate_roles(&[]), Err(AuthError::Validation(_))));
    }
}
