//! OpenAPI document for the auth routes.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use super::handlers::{account, federation, health, reset, session, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        account::register,
        account::verify_email,
        account::change_password,
        account::change_email,
        account::delete_account,
        session::login,
        session::refresh_token,
        session::logout,
        session::me,
        reset::forgot_password,
        reset::reset_password,
        federation::google_auth,
        users::list_users,
        users::get_user,
        users::update_roles,
    ),
    components(schemas(
        super::handlers::UserResponse,
        super::handlers::ErrorResponse,
        health::Health,
        account::RegisterRequest,
        account::VerifyEmailRequest,
        account::ChangePasswordRequest,
        account::ChangeEmailRequest,
        account::DeleteAccountRequest,
        session::LoginRequest,
        session::SessionResponse,
        session::AccessTokenResponse,
        reset::ForgotPasswordRequest,
        reset::ResetPasswordRequest,
        federation::GoogleAuthRequest,
        users::UpdateRolesRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "session", description = "Login, refresh, logout"),
        (name = "account", description = "Registration, verification, self-service"),
        (name = "reset", description = "Password reset"),
        (name = "admin", description = "Administrative account management"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_the_route_surface() -> anyhow::Result<()> {
        let doc = openapi();
        let json = serde_json::to_value(doc)?;
        let paths = json
            .get("paths")
            .and_then(|paths| paths.as_object())
            .expect("paths object");

        for route in [
            "/health",
            "/register",
            "/login",
            "/refresh-token",
            "/logout",
            "/me",
            "/forgot-password",
            "/reset-password",
            "/verify-email",
            "/google-auth",
            "/change-password",
            "/change-email",
            "/delete-account",
            "/users",
            "/user/{id}",
            "/update-roles",
        ] {
            assert!(paths.contains_key(route), "missing {route}");
        }
        Ok(())
    }
}
