use utoipa::OpenApi;

use crate::controllers::users::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, TokenResponse,
    TwoFaChallengeRequest, TwoFaConfirmRequest, TwoFaDisableRequest, TwoFaSetupResponse,
    UpdateProfileRequest,
};
use crate::models::user::{SimpleUser, UserResponse};

/// Auto-generated OpenAPI documentation for Warden.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden API",
        version = "0.1.0",
        description = "Session, credential and presence management."
    ),
    paths(
        crate::controllers::users::register,
        crate::controllers::users::login,
        crate::controllers::users::twofa_challenge,
        crate::controllers::users::me,
        crate::controllers::users::update_profile,
        crate::controllers::users::change_password,
        crate::controllers::users::logout,
        crate::controllers::users::delete_account,
        crate::controllers::users::list_users,
        crate::controllers::users::twofa_setup,
        crate::controllers::users::twofa_confirm,
        crate::controllers::users::twofa_disable,
        crate::controllers::users::google_login,
        crate::controllers::users::google_callback,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            TwoFaChallengeRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            TokenResponse,
            TwoFaSetupResponse,
            TwoFaConfirmRequest,
            TwoFaDisableRequest,
            UserResponse,
            SimpleUser,
        )
    ),
    tags(
        (name = "users", description = "Account, session and 2FA endpoints")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add JWT Bearer security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}
